//! Protocol module - record framing for streamed responses.
//!
//! This module turns an unbounded, arbitrarily fragmented byte stream into
//! discrete records:
//! - Delimiter policies (`\r\n`, `\n`, or either)
//! - Stream decoder for accumulating partial reads
//! - Record type for the extracted spans

mod delimiter;
mod record;
mod stream_decoder;

pub use delimiter::{DelimiterPolicy, CARRIAGE_RETURN, LINE_FEED};
pub use record::Record;
pub use stream_decoder::{StreamDecoder, DEFAULT_MAX_TAIL_SIZE};
