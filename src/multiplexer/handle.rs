//! Request handles and their descriptors.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Completion, FeedwireError, Result, TransportFailure};
use crate::handler::{RequestContext, ResponseHandler};
use crate::transport::{Connection, TransferEvent};

/// Identifier of a submitted request.
///
/// Assigned sequentially per multiplexer, starting from 1, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub(crate) u64);

impl HandleId {
    /// Raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Registered, transport not opened yet.
    Pending,
    /// Transfer in progress.
    Active,
    /// Transfer finished successfully.
    Completed,
    /// Transfer failed.
    Failed,
}

impl HandleState {
    /// Whether the handle will be removed at the end of the current tick.
    pub fn is_terminal(self) -> bool {
        matches!(self, HandleState::Completed | HandleState::Failed)
    }
}

/// Per-request timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Use the transport's default.
    #[default]
    Default,
    /// No time limit (long-lived streams).
    Unlimited,
    /// Limit in whole seconds.
    Seconds(u64),
}

impl Timeout {
    /// Concrete limit, given the transport default.
    pub fn resolve(self, default: Option<Duration>) -> Option<Duration> {
        match self {
            Timeout::Default => default,
            Timeout::Unlimited => None,
            Timeout::Seconds(secs) => Some(Duration::from_secs(secs)),
        }
    }
}

impl From<Option<u64>> for Timeout {
    /// Absent means default, `0` means no limit, anything else is seconds.
    fn from(value: Option<u64>) -> Self {
        match value {
            None => Timeout::Default,
            Some(0) => Timeout::Unlimited,
            Some(secs) => Timeout::Seconds(secs),
        }
    }
}

/// Ordered list of fully formed `Name: value` header strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<String>);

impl HeaderList {
    /// Create an empty header list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a header string.
    pub fn push(&mut self, header: impl Into<String>) {
        self.0.push(header.into());
    }

    /// Header strings in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split every header into a trimmed `(name, value)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`FeedwireError::InvalidHeader`] for a string without `:` or
    /// with an empty name.
    pub fn pairs(&self) -> Result<Vec<(&str, &str)>> {
        self.iter()
            .map(|header| match header.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    Ok((name.trim(), value.trim()))
                }
                _ => Err(FeedwireError::InvalidHeader(header.to_string())),
            })
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for HeaderList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Description of one GET request.
///
/// # Example
///
/// ```
/// use feedwire::multiplexer::{FetchRequest, Timeout};
///
/// let request = FetchRequest::get("https://example.com/stream")
///     .timeout(Timeout::Unlimited)
///     .header("Authorization: Bearer t0ken");
///
/// assert_eq!(request.headers.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub timeout: Timeout,
    pub headers: HeaderList,
}

impl FetchRequest {
    /// GET `url` with the default timeout and no headers.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Timeout::Default,
            headers: HeaderList::new(),
        }
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Append a header string.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header);
        self
    }

    /// Replace all headers.
    pub fn headers(mut self, headers: HeaderList) -> Self {
        self.headers = headers;
        self
    }
}

/// Result of advancing a handle by one step.
pub(crate) enum Step {
    /// Still running; poll again next tick.
    Running,
    /// Reached a terminal state. A fatal handler error rides along.
    Finished(Option<FeedwireError>),
}

/// One tracked request and every resource scoped to it.
///
/// Dropping the handle drops its connection and header list.
pub(crate) struct RequestHandle {
    pub(crate) id: HandleId,
    pub(crate) url: String,
    pub(crate) timeout: Timeout,
    pub(crate) headers: Arc<HeaderList>,
    pub(crate) connection: Option<Box<dyn Connection>>,
    pub(crate) error: Option<TransportFailure>,
    pub(crate) handler: Box<dyn ResponseHandler>,
    pub(crate) state: HandleState,
}

impl RequestHandle {
    pub(crate) fn new(id: HandleId, request: FetchRequest, handler: Box<dyn ResponseHandler>) -> Self {
        Self {
            id,
            url: request.url,
            timeout: request.timeout,
            headers: Arc::new(request.headers),
            connection: None,
            error: None,
            handler,
            state: HandleState::Pending,
        }
    }

    /// Mark the handle failed before it ever ran.
    pub(crate) fn fail_open(&mut self, failure: TransportFailure) {
        self.error = Some(failure);
        self.state = HandleState::Failed;
    }

    /// Advance by one non-blocking step.
    ///
    /// Drains every event the connection has ready, or at most
    /// `event_limit` of them. Chunks go to the handler in transport order.
    /// On a terminal event the handler's `on_complete` runs exactly once.
    pub(crate) fn advance(
        &mut self,
        ctx: &mut RequestContext<'_>,
        event_limit: Option<usize>,
    ) -> Step {
        if self.state == HandleState::Failed {
            return self.finish(None, ctx);
        }

        let Some(connection) = self.connection.as_mut() else {
            return Step::Running;
        };

        let mut processed = 0;
        loop {
            if event_limit.is_some_and(|limit| processed >= limit) {
                return Step::Running;
            }
            processed += 1;

            match connection.next_event() {
                None => return Step::Running,
                Some(TransferEvent::Data(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    tracing::trace!("Handle {} received {} bytes", self.id, chunk.len());
                    if let Err(e) = self.handler.on_chunk(&chunk, ctx) {
                        self.error = Some(TransportFailure::aborted(e.to_string()));
                        self.state = HandleState::Failed;
                        return self.finish(Some(e), ctx);
                    }
                }
                Some(TransferEvent::Finished(Ok(()))) => {
                    self.state = HandleState::Completed;
                    return self.finish(None, ctx);
                }
                Some(TransferEvent::Finished(Err(failure))) => {
                    self.error = Some(failure);
                    self.state = HandleState::Failed;
                    return self.finish(None, ctx);
                }
            }
        }
    }

    fn finish(&mut self, fatal: Option<FeedwireError>, ctx: &mut RequestContext<'_>) -> Step {
        let outcome: Completion = match &self.error {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        };
        self.handler.on_complete(outcome, ctx);
        Step::Finished(fatal)
    }
}
