//! Request multiplexer - N concurrent GETs inside one polling loop.
//!
//! The [`RequestMultiplexer`] owns every in-flight request from submission
//! until removal. The host drives it by calling [`poll`] repeatedly:
//! 1. Drain every event each handle's transport has ready, without waiting
//! 2. Hand new body chunks to the handle's callback, in transport order
//! 3. Notify `on_complete` for handles that reached a terminal state
//! 4. Remove finished handles, releasing their resources
//! 5. Open requests that callbacks submitted during the tick
//!
//! # Example
//!
//! ```no_run
//! use feedwire::multiplexer::{FetchRequest, RequestMultiplexer, Timeout};
//! use feedwire::transport::HttpConfig;
//!
//! fn main() -> feedwire::Result<()> {
//!     let mut mux = RequestMultiplexer::with_http(HttpConfig::default())?;
//!
//!     mux.submit(
//!         FetchRequest::get("https://example.com/feed").timeout(Timeout::Unlimited),
//!         |chunk: &[u8]| println!("{} bytes", chunk.len()),
//!     )?;
//!
//!     while !mux.is_empty() {
//!         mux.poll()?;
//!         std::thread::sleep(std::time::Duration::from_millis(10));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! [`poll`]: RequestMultiplexer::poll

mod handle;

use std::collections::BTreeMap;

use crate::error::{FeedwireError, Result, TransportFailure};
use crate::handler::{ChunkHandler, RequestContext, ResponseHandler};
use crate::transport::{HttpConfig, HttpTransport, TransferRequest, Transport};

pub use handle::{
    FetchRequest, HandleId, HandleState, HeaderList, Timeout,
};
use handle::{RequestHandle, Step};

/// Requests registered but not yet opened.
///
/// Also owns id assignment, so ids handed out from inside callbacks and
/// from the host follow one sequence.
pub(crate) struct SubmissionQueue {
    next_id: u64,
    pending: Vec<RequestHandle>,
}

impl SubmissionQueue {
    fn new() -> Self {
        Self {
            next_id: 1,
            pending: Vec::new(),
        }
    }

    /// Register a `Pending` handle and return its id.
    pub(crate) fn enqueue(
        &mut self,
        request: FetchRequest,
        handler: Box<dyn ResponseHandler>,
    ) -> Result<HandleId> {
        if request.url.is_empty() {
            return Err(FeedwireError::EmptyUrl);
        }

        let id = HandleId(self.next_id);
        self.next_id += 1;

        tracing::debug!("Submitting request {}: GET {}", id, request.url);
        self.pending.push(RequestHandle::new(id, request, handler));
        Ok(id)
    }
}

/// Drives any number of non-blocking GETs from a cooperative loop.
///
/// Not `Send`: the multiplexer, its handlers and the host loop live on one
/// thread. `poll` takes `&mut self`, so it cannot be re-entered from a
/// callback; callbacks reach the multiplexer through [`RequestContext`].
pub struct RequestMultiplexer<T: Transport = HttpTransport> {
    /// Transport opening connections.
    transport: T,
    /// Active handles, ordered by id.
    handles: BTreeMap<HandleId, RequestHandle>,
    /// Submissions waiting to be opened.
    queue: SubmissionQueue,
    /// Optional cap on events drained per handle per tick.
    event_limit: Option<usize>,
}

impl RequestMultiplexer<HttpTransport> {
    /// Create a multiplexer over a new [`HttpTransport`].
    pub fn with_http(config: HttpConfig) -> Result<Self> {
        Ok(Self::new(HttpTransport::new(config)?))
    }
}

impl<T: Transport> RequestMultiplexer<T> {
    /// Create a multiplexer over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            handles: BTreeMap::new(),
            queue: SubmissionQueue::new(),
            event_limit: None,
        }
    }

    /// Cap the events drained from each handle in one `poll()`.
    ///
    /// Without a cap, `poll()` delivers everything the transport has ready.
    /// With one, a fast producer cannot starve the other handles of a tick;
    /// its remaining events wait for the next `poll()`.
    pub fn with_event_limit(mut self, limit: usize) -> Self {
        self.event_limit = Some(limit.max(1));
        self
    }

    /// Per-handle event cap, if one is set.
    pub fn event_limit(&self) -> Option<usize> {
        self.event_limit
    }

    /// Submit a GET whose body chunks go to `on_chunk`.
    ///
    /// The transfer starts immediately; this never blocks. Failures are
    /// logged; use [`submit_with`](Self::submit_with) to observe them.
    ///
    /// # Errors
    ///
    /// Returns [`FeedwireError::EmptyUrl`] if the URL is empty.
    pub fn submit<F>(&mut self, request: FetchRequest, on_chunk: F) -> Result<HandleId>
    where
        F: FnMut(&[u8]) + 'static,
    {
        self.submit_with(request, ChunkHandler::new(on_chunk))
    }

    /// Submit a GET with a full [`ResponseHandler`].
    ///
    /// If the transport refuses to start the request, the handle is kept
    /// as `Failed` and the next `poll` reports it through `on_complete`.
    pub fn submit_with<H: ResponseHandler>(
        &mut self,
        request: FetchRequest,
        handler: H,
    ) -> Result<HandleId> {
        let id = self.queue.enqueue(request, Box::new(handler))?;
        self.activate_queued();
        Ok(id)
    }

    /// Advance every request without blocking.
    ///
    /// Every chunk a transport has ready is delivered before this returns,
    /// unless an event limit was set. Finished requests are removed before
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns the first error a handler returned during this tick. The
    /// request that produced it has been aborted; every other request was
    /// still advanced normally.
    pub fn poll(&mut self) -> Result<()> {
        let ids: Vec<HandleId> = self.handles.keys().copied().collect();
        let event_limit = self.event_limit;
        let mut finished = Vec::new();
        let mut fatal = None;

        for id in ids {
            let Some(handle) = self.handles.get_mut(&id) else {
                continue;
            };

            let mut ctx = RequestContext::new(id, &mut self.queue);
            if let Step::Finished(error) = handle.advance(&mut ctx, event_limit) {
                match (error, &handle.error) {
                    (Some(e), _) => {
                        tracing::error!("Request {} aborted by its handler: {}", id, e);
                        if fatal.is_none() {
                            fatal = Some(e);
                        }
                    }
                    (None, Some(failure)) => {
                        tracing::warn!("Request {} failed ({}): {}", id, handle.url, failure);
                    }
                    (None, None) => {}
                }
                finished.push(id);
            }
        }

        for id in finished {
            if let Some(handle) = self.handles.remove(&id) {
                tracing::debug!("Removing request {} ({:?})", id, handle.state);
            }
        }

        self.activate_queued();

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of tracked requests.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if no request is in flight.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Check if a request is still tracked.
    pub fn contains(&self, id: HandleId) -> bool {
        self.handles.contains_key(&id)
    }

    /// Lifecycle state of a tracked request.
    pub fn state(&self, id: HandleId) -> Option<HandleState> {
        self.handles.get(&id).map(|handle| handle.state)
    }

    /// Ids of tracked requests, in submission order.
    pub fn ids(&self) -> Vec<HandleId> {
        self.handles.keys().copied().collect()
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Open every queued submission and add it to the handle set.
    fn activate_queued(&mut self) {
        for mut handle in std::mem::take(&mut self.queue.pending) {
            let request = TransferRequest {
                id: handle.id,
                url: handle.url.clone(),
                timeout: handle.timeout,
                headers: handle.headers.clone(),
            };

            match self.transport.open(&request) {
                Ok(connection) => {
                    handle.connection = Some(connection);
                    handle.state = HandleState::Active;
                }
                Err(e) => {
                    tracing::warn!("Request {} could not be started: {}", handle.id, e);
                    let failure = match e {
                        FeedwireError::Transport(failure) => failure,
                        other => TransportFailure::aborted(other.to_string()),
                    };
                    handle.fail_open(failure);
                }
            }

            self.handles.insert(handle.id, handle);
        }
    }
}

impl<T: Transport> Drop for RequestMultiplexer<T> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            tracing::debug!("Tearing down {} unfinished requests", self.handles.len());
        }
        self.handles.clear();
        self.queue.pending.clear();
    }
}
