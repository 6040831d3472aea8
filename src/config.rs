//! Configuration for feeds, decoders and the HTTP transport.
//!
//! Everything a deployment varies (endpoints, authorization, limits) is a
//! value passed in from outside. Nothing secret is compiled in.
//!
//! # Example
//!
//! ```
//! use feedwire::config::FeedConfig;
//! use feedwire::protocol::DelimiterPolicy;
//!
//! let config: FeedConfig = serde_json::from_str(r#"{
//!     "stream_url": "https://stream.example.com/user.json",
//!     "authorization": "Authorization: Bearer abc",
//!     "decoder": { "delimiter": "crlf" }
//! }"#).unwrap();
//!
//! assert_eq!(config.topic, "stream");
//! assert_eq!(config.decoder.delimiter, DelimiterPolicy::Crlf);
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::codec::JsonCodec;
use crate::error::Result;
use crate::protocol::{DelimiterPolicy, StreamDecoder, DEFAULT_MAX_TAIL_SIZE};

pub use crate::transport::HttpConfig;

/// Default topic sessions dispatch to.
pub const DEFAULT_TOPIC: &str = "stream";

/// Default credential cache file.
pub const DEFAULT_CREDENTIALS_PATH: &str = "cache.json";

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// How records are terminated.
    pub delimiter: DelimiterPolicy,
    /// Bound on bytes retained without a delimiter.
    pub max_tail_size: usize,
}

impl DecoderConfig {
    /// Build a decoder with these settings.
    pub fn build(&self) -> StreamDecoder {
        StreamDecoder::with_policy_and_max_tail(self.delimiter, self.max_tail_size)
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            delimiter: DelimiterPolicy::default(),
            max_tail_size: DEFAULT_MAX_TAIL_SIZE,
        }
    }
}

/// Settings for one streaming feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// URL of the continuous stream.
    pub stream_url: String,
    /// Topic decoded records are dispatched to.
    pub topic: String,
    /// Pre-formatted authorization header, if the feed needs one.
    pub authorization: Option<String>,
    /// Where cached credentials live.
    pub credentials_path: PathBuf,
    /// HTTP transport settings.
    pub http: HttpConfig,
    /// Decoder settings.
    pub decoder: DecoderConfig,
}

impl FeedConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        JsonCodec::decode(&bytes)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            stream_url: String::new(),
            topic: DEFAULT_TOPIC.to_string(),
            authorization: None,
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            http: HttpConfig::default(),
            decoder: DecoderConfig::default(),
        }
    }
}
