//! Transport module - the non-blocking GET primitive.
//!
//! A [`Transport`] opens one [`Connection`] per request. A connection is
//! polled, never awaited: `next_event` returns whatever the transfer has
//! produced so far and `None` when nothing is ready.
//!
//! Provides:
//! - [`HttpTransport`] - reqwest transfers running on a tokio runtime
//! - [`ScriptedTransport`] - in-memory transfers fed by the caller

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Completion, Result};
use crate::multiplexer::{HandleId, HeaderList, Timeout};

mod http;
mod scripted;

pub use http::{HttpConfig, HttpTransport};
pub use scripted::{ScriptedFeed, ScriptedTransport};

/// Everything a transport needs to start one GET.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub id: HandleId,
    pub url: String,
    pub timeout: Timeout,
    pub headers: Arc<HeaderList>,
}

/// Progress reported by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// A piece of response body.
    Data(Bytes),
    /// The transfer is over. No events follow.
    Finished(Completion),
}

/// One in-flight transfer.
///
/// Dropping the connection releases everything it holds, finished or not.
pub trait Connection {
    /// Next ready event, without blocking.
    fn next_event(&mut self) -> Option<TransferEvent>;
}

/// Factory for connections.
pub trait Transport {
    /// Start a transfer without blocking.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be started at all (e.g. malformed
    /// header strings).
    fn open(&mut self, request: &TransferRequest) -> Result<Box<dyn Connection>>;
}
