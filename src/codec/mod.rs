//! Codec module - parsing of record and response bodies.
//!
//! - [`JsonCodec`] - structured values for stream records (`serde_json`)
//! - [`FormCodec`] - form-urlencoded token responses (`serde_urlencoded`)
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects;
//! each body format has exactly one consumer.

mod form;
mod json;

pub use form::FormCodec;
pub use json::JsonCodec;
