//! JSON codec for stream records using `serde_json`.
//!
//! Records are parsed into a [`serde_json::Value`] once per dispatch; typed
//! observers convert from that value instead of re-parsing the bytes.
//!
//! # Example
//!
//! ```
//! use feedwire::codec::JsonCodec;
//!
//! let value = JsonCodec::parse(br#"{"id": 7, "text": "hi"}"#).unwrap();
//! assert_eq!(value["id"], 7);
//!
//! assert!(JsonCodec::parse(b"{not json").is_err());
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{FeedwireError, Result};

/// JSON codec for record payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Parse record bytes into a structured value.
    ///
    /// # Errors
    ///
    /// Returns [`FeedwireError::MalformedRecord`] if the bytes are not valid JSON.
    #[inline]
    pub fn parse(bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes).map_err(FeedwireError::MalformedRecord)
    }

    /// Convert an already parsed value into `T`.
    #[inline]
    pub fn convert<T: DeserializeOwned>(value: &Value) -> std::result::Result<T, serde_json::Error> {
        <T as serde::Deserialize>::deserialize(value)
    }

    /// Decode JSON bytes straight into `T` (config and credential files).
    #[inline]
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode a value as pretty JSON.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, PartialEq, Debug)]
    struct Status {
        id: u64,
        text: String,
    }

    #[test]
    fn test_parse_object() {
        let value = JsonCodec::parse(br#"{"id":1,"text":"hello"}"#).unwrap();
        assert_eq!(value["text"], "hello");
    }

    #[test]
    fn test_parse_malformed() {
        let err = JsonCodec::parse(b"{\"id\":").unwrap_err();
        assert!(matches!(err, FeedwireError::MalformedRecord(_)));
    }

    #[test]
    fn test_convert_typed() {
        let value = JsonCodec::parse(br#"{"id":9,"text":"x","extra":true}"#).unwrap();
        let status: Status = JsonCodec::convert(&value).unwrap();
        assert_eq!(
            status,
            Status {
                id: 9,
                text: "x".to_string()
            }
        );

        let friends = JsonCodec::parse(br#"{"friends":[1,2,3]}"#).unwrap();
        assert!(JsonCodec::convert::<Status>(&friends).is_err());
    }
}
