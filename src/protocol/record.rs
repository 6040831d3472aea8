//! Decoded record type.

use std::ops::Deref;

use bytes::Bytes;

/// One complete record extracted from a stream, terminator stripped.
///
/// Backed by a frozen slice of the decoder's buffer, so cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    bytes: Bytes,
}

impl Record {
    /// Create a record from raw bytes.
    pub fn new(bytes: Bytes) -> Self {
        Self { bytes }
    }

    /// Record bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the record, returning its bytes.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Lossy UTF-8 view, for logging.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl Deref for Record {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsRef<[u8]> for Record {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<&'static [u8]> for Record {
    fn from(bytes: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(bytes))
    }
}
