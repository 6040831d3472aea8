//! Error types for feedwire.

use std::fmt;

use thiserror::Error;

/// Main error type for all feedwire operations.
#[derive(Debug, Error)]
pub enum FeedwireError {
    /// I/O error (config and credential files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error outside of record dispatch.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Form-encoded body could not be decoded (token responses).
    #[error("form decode error: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    /// HTTP client construction error.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A decoded record is not a valid structured value.
    #[error("malformed record: {0}")]
    MalformedRecord(#[source] serde_json::Error),

    /// The decoder tail grew past its bound without seeing a delimiter.
    #[error("record tail of {len} bytes exceeds maximum {max}")]
    TailOverflow { len: usize, max: usize },

    /// `submit` was called with an empty URL.
    #[error("request URL is empty")]
    EmptyUrl,

    /// A header string is not of the form `Name: value`.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Dispatch to a topic that was never declared.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// Operation not allowed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The underlying transfer failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportFailure),
}

impl FeedwireError {
    /// Whether a running session can carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FeedwireError::MalformedRecord(_) | FeedwireError::Transport(_)
        )
    }
}

/// Result type alias using FeedwireError.
pub type Result<T> = std::result::Result<T, FeedwireError>;

/// Category of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection could not be established (DNS, connect, TLS).
    Connect,
    /// Request exceeded its timeout.
    Timeout,
    /// Server answered with a non-2xx status.
    Status(u16),
    /// Connection broke while reading the body.
    Body,
    /// Transfer was abandoned by its handler or its task.
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Connect => f.write_str("connect"),
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::Status(code) => write!(f, "status {}", code),
            FailureKind::Body => f.write_str("body"),
            FailureKind::Aborted => f.write_str("aborted"),
        }
    }
}

/// Error buffer of a failed handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Aborted, message)
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(e: reqwest::Error) -> Self {
        let kind = if let Some(status) = e.status() {
            FailureKind::Status(status.as_u16())
        } else if e.is_timeout() {
            FailureKind::Timeout
        } else if e.is_connect() {
            FailureKind::Connect
        } else if e.is_body() || e.is_decode() {
            FailureKind::Body
        } else {
            FailureKind::Connect
        };
        Self::new(kind, e.to_string())
    }
}

/// Terminal outcome delivered to `on_complete`.
pub type Completion = std::result::Result<(), TransportFailure>;
