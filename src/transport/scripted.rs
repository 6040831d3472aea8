//! In-memory transport fed by the caller.
//!
//! Every URL maps to a [`ScriptedFeed`]; a connection opened for that URL
//! reads the events pushed into the feed, in order. The transport keeps a
//! ledger of what it opened so callers can check that each connection and
//! header list was released exactly once.
//!
//! # Example
//!
//! ```
//! use feedwire::multiplexer::{FetchRequest, RequestMultiplexer};
//! use feedwire::transport::ScriptedTransport;
//!
//! let transport = ScriptedTransport::new();
//! let feed = transport.feed("mem://stream");
//!
//! let mut mux = RequestMultiplexer::new(transport.clone());
//! let id = mux.submit(FetchRequest::get("mem://stream"), |chunk: &[u8]| {
//!     assert_eq!(chunk, b"hello");
//! }).unwrap();
//!
//! feed.push("hello");
//! feed.finish();
//! mux.poll().unwrap();
//!
//! assert!(!mux.contains(id));
//! assert_eq!(transport.release_count(id), 1);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::{Arc, Weak};

use bytes::Bytes;

use super::{Connection, TransferEvent, TransferRequest, Transport};
use crate::error::{FeedwireError, Result, TransportFailure};
use crate::multiplexer::{HandleId, HeaderList, Timeout};

/// Caller-side end of a scripted transfer.
#[derive(Clone, Default)]
pub struct ScriptedFeed {
    events: Rc<RefCell<VecDeque<TransferEvent>>>,
}

impl ScriptedFeed {
    /// Queue a body chunk.
    pub fn push(&self, chunk: impl AsRef<[u8]>) {
        self.events
            .borrow_mut()
            .push_back(TransferEvent::Data(Bytes::copy_from_slice(chunk.as_ref())));
    }

    /// Queue successful completion.
    pub fn finish(&self) {
        self.events
            .borrow_mut()
            .push_back(TransferEvent::Finished(Ok(())));
    }

    /// Queue a transport failure.
    pub fn fail(&self, failure: TransportFailure) {
        self.events
            .borrow_mut()
            .push_back(TransferEvent::Finished(Err(failure)));
    }

    /// Events queued but not yet consumed.
    pub fn pending(&self) -> usize {
        self.events.borrow().len()
    }
}

/// What the transport recorded about one opened connection.
struct OpenRecord {
    url: String,
    timeout: Timeout,
    sent_headers: Vec<String>,
    header_list: Weak<HeaderList>,
    released: Rc<Cell<usize>>,
}

#[derive(Default)]
struct ScriptState {
    feeds: HashMap<String, ScriptedFeed>,
    refused: HashMap<String, TransportFailure>,
    opened: HashMap<HandleId, OpenRecord>,
    open_order: Vec<HandleId>,
}

/// Transport replaying caller-supplied events.
///
/// Cheap to clone; clones share feeds and the ledger.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedTransport {
    /// Create a transport with no feeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed for `url`, created on first use.
    pub fn feed(&self, url: &str) -> ScriptedFeed {
        self.state
            .borrow_mut()
            .feeds
            .entry(url.to_string())
            .or_default()
            .clone()
    }

    /// Make every open of `url` fail with `failure`.
    pub fn refuse(&self, url: &str, failure: TransportFailure) {
        self.state
            .borrow_mut()
            .refused
            .insert(url.to_string(), failure);
    }

    /// Number of connections opened so far.
    pub fn opened_count(&self) -> usize {
        self.state.borrow().opened.len()
    }

    /// Ids in the order their connections were opened.
    pub fn open_order(&self) -> Vec<HandleId> {
        self.state.borrow().open_order.clone()
    }

    /// Number of opened connections not yet released.
    pub fn live_connections(&self) -> usize {
        self.state
            .borrow()
            .opened
            .values()
            .filter(|record| record.released.get() == 0)
            .count()
    }

    /// URL requested by a handle.
    pub fn url_of(&self, id: HandleId) -> Option<String> {
        self.state.borrow().opened.get(&id).map(|r| r.url.clone())
    }

    /// Timeout requested by a handle.
    pub fn timeout_of(&self, id: HandleId) -> Option<Timeout> {
        self.state.borrow().opened.get(&id).map(|r| r.timeout)
    }

    /// Header strings sent by a handle.
    pub fn headers_of(&self, id: HandleId) -> Option<Vec<String>> {
        self.state
            .borrow()
            .opened
            .get(&id)
            .map(|r| r.sent_headers.clone())
    }

    /// How many times the connection of a handle was dropped.
    pub fn release_count(&self, id: HandleId) -> usize {
        self.state
            .borrow()
            .opened
            .get(&id)
            .map_or(0, |r| r.released.get())
    }

    /// Whether the header list of a handle has been freed.
    pub fn headers_released(&self, id: HandleId) -> bool {
        self.state
            .borrow()
            .opened
            .get(&id)
            .is_some_and(|r| r.header_list.upgrade().is_none())
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self, request: &TransferRequest) -> Result<Box<dyn Connection>> {
        if let Some(failure) = self.state.borrow().refused.get(&request.url) {
            return Err(FeedwireError::Transport(failure.clone()));
        }

        let feed = self.feed(&request.url);
        let released = Rc::new(Cell::new(0));

        let mut state = self.state.borrow_mut();
        state.opened.insert(
            request.id,
            OpenRecord {
                url: request.url.clone(),
                timeout: request.timeout,
                sent_headers: request.headers.iter().map(str::to_string).collect(),
                header_list: Arc::downgrade(&request.headers),
                released: released.clone(),
            },
        );
        state.open_order.push(request.id);

        Ok(Box::new(ScriptedConnection { feed, released }))
    }
}

/// Connection reading from a feed.
struct ScriptedConnection {
    feed: ScriptedFeed,
    released: Rc<Cell<usize>>,
}

impl Connection for ScriptedConnection {
    fn next_event(&mut self) -> Option<TransferEvent> {
        self.feed.events.borrow_mut().pop_front()
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.released.set(self.released.get() + 1);
    }
}
