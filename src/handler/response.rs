//! Per-request response handlers.
//!
//! A [`ResponseHandler`] receives every chunk of one request in transport
//! order, then exactly one terminal notification.

use super::RequestContext;
use crate::error::{Completion, Result};

/// Trait for per-request callbacks.
pub trait ResponseHandler: 'static {
    /// Handle one non-empty chunk of response body.
    ///
    /// Returning an error aborts the request; the error is returned from
    /// the `poll()` that delivered the chunk.
    fn on_chunk(&mut self, chunk: &[u8], ctx: &mut RequestContext<'_>) -> Result<()>;

    /// Called once when the request succeeded or failed.
    fn on_complete(&mut self, outcome: Completion, ctx: &mut RequestContext<'_>) {
        let _ = (outcome, ctx);
    }
}

/// Handler wrapping a plain chunk closure.
///
/// The closure only ever sees data; failures are only logged.
pub struct ChunkHandler<F>
where
    F: FnMut(&[u8]) + 'static,
{
    on_chunk: F,
}

impl<F> ChunkHandler<F>
where
    F: FnMut(&[u8]) + 'static,
{
    /// Create a new chunk handler.
    pub fn new(on_chunk: F) -> Self {
        Self { on_chunk }
    }
}

impl<F> ResponseHandler for ChunkHandler<F>
where
    F: FnMut(&[u8]) + 'static,
{
    fn on_chunk(&mut self, chunk: &[u8], _ctx: &mut RequestContext<'_>) -> Result<()> {
        (self.on_chunk)(chunk);
        Ok(())
    }
}

/// Handler built from a chunk closure and a completion closure.
///
/// # Example
///
/// ```
/// use feedwire::handler::Callbacks;
///
/// let callbacks = Callbacks::new(
///     |chunk: &[u8]| println!("{} bytes", chunk.len()),
///     |outcome: feedwire::Completion| println!("done: {:?}", outcome),
/// );
/// # let _ = callbacks;
/// ```
pub struct Callbacks<C, D>
where
    C: FnMut(&[u8]) + 'static,
    D: FnOnce(Completion) + 'static,
{
    on_chunk: C,
    on_complete: Option<D>,
}

impl<C, D> Callbacks<C, D>
where
    C: FnMut(&[u8]) + 'static,
    D: FnOnce(Completion) + 'static,
{
    /// Create a new callback pair.
    pub fn new(on_chunk: C, on_complete: D) -> Self {
        Self {
            on_chunk,
            on_complete: Some(on_complete),
        }
    }
}

impl<C, D> ResponseHandler for Callbacks<C, D>
where
    C: FnMut(&[u8]) + 'static,
    D: FnOnce(Completion) + 'static,
{
    fn on_chunk(&mut self, chunk: &[u8], _ctx: &mut RequestContext<'_>) -> Result<()> {
        (self.on_chunk)(chunk);
        Ok(())
    }

    fn on_complete(&mut self, outcome: Completion, _ctx: &mut RequestContext<'_>) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(outcome);
        }
    }
}
