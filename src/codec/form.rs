//! Form codec for `application/x-www-form-urlencoded` bodies.
//!
//! Token endpoints answer with bodies like
//! `oauth_token=abc&oauth_token_secret=def&extra=1`.

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Form-urlencoded codec using `serde_urlencoded`.
pub struct FormCodec;

impl FormCodec {
    /// Decode a form-encoded body into `T`. Unknown keys are ignored.
    #[inline]
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_urlencoded::from_bytes(bytes)?)
    }
}
