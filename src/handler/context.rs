//! Request context for response handlers.
//!
//! Handlers run inline with [`RequestMultiplexer::poll`], which holds the
//! multiplexer mutably for the whole tick. The context is how a handler
//! reaches back into it:
//! - `id` - which request the callback belongs to
//! - `submit` - chain a follow-up request
//!
//! # Example
//!
//! ```
//! use feedwire::handler::{RequestContext, ResponseHandler};
//! use feedwire::multiplexer::FetchRequest;
//! use feedwire::{Completion, Result};
//!
//! struct ThenFetch(String);
//!
//! impl ResponseHandler for ThenFetch {
//!     fn on_chunk(&mut self, _chunk: &[u8], _ctx: &mut RequestContext<'_>) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn on_complete(&mut self, outcome: Completion, ctx: &mut RequestContext<'_>) {
//!         if outcome.is_ok() {
//!             let _ = ctx.submit(FetchRequest::get(self.0.clone()), |_chunk: &[u8]| {});
//!         }
//!     }
//! }
//! ```
//!
//! [`RequestMultiplexer::poll`]: crate::multiplexer::RequestMultiplexer::poll

use super::{ChunkHandler, ResponseHandler};
use crate::error::Result;
use crate::multiplexer::{FetchRequest, HandleId, SubmissionQueue};

/// Context passed to response handlers.
///
/// Requests submitted through the context get their id immediately; their
/// connection is opened once the current tick has finished scanning the
/// handle set, and they are first advanced on the following `poll()`.
pub struct RequestContext<'a> {
    /// Request the callback belongs to.
    id: HandleId,
    /// Deferred submissions of the running tick.
    queue: &'a mut SubmissionQueue,
}

impl<'a> RequestContext<'a> {
    pub(crate) fn new(id: HandleId, queue: &'a mut SubmissionQueue) -> Self {
        Self { id, queue }
    }

    /// Get the id of the request this callback belongs to.
    #[inline]
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Submit a follow-up request with a chunk callback.
    ///
    /// # Errors
    ///
    /// Returns [`FeedwireError::EmptyUrl`](crate::FeedwireError::EmptyUrl)
    /// if the URL is empty.
    pub fn submit<F>(&mut self, request: FetchRequest, on_chunk: F) -> Result<HandleId>
    where
        F: FnMut(&[u8]) + 'static,
    {
        self.submit_with(request, ChunkHandler::new(on_chunk))
    }

    /// Submit a follow-up request with a full [`ResponseHandler`].
    pub fn submit_with<H: ResponseHandler>(
        &mut self,
        request: FetchRequest,
        handler: H,
    ) -> Result<HandleId> {
        self.queue.enqueue(request, Box::new(handler))
    }
}
