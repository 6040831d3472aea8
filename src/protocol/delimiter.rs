//! Record terminator policies.

use serde::Deserialize;

/// Line terminator byte every policy splits on.
pub const LINE_FEED: u8 = b'\n';

/// Carriage return, optionally preceding [`LINE_FEED`].
pub const CARRIAGE_RETURN: u8 = b'\r';

/// How the bytes before each `\n` are trimmed into a record.
///
/// Every policy splits on `\n` only; a bare `\r` never ends a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelimiterPolicy {
    /// Fixed two-byte `\r\n` trim.
    ///
    /// A segment ending in a bare `\n` loses its last content byte.
    Crlf,
    /// Strip only the `\n`; a preceding `\r` stays in the record.
    Lf,
    /// Strip the `\n` and a `\r` directly before it, if present.
    #[default]
    Auto,
}

impl DelimiterPolicy {
    /// Length of the record inside `segment`, where `segment` ends with `\n`.
    ///
    /// Returns 0 when nothing is left after trimming.
    #[inline]
    pub fn record_len(self, segment: &[u8]) -> usize {
        debug_assert_eq!(segment.last(), Some(&LINE_FEED));
        match self {
            DelimiterPolicy::Crlf => segment.len().saturating_sub(2),
            DelimiterPolicy::Lf => segment.len() - 1,
            DelimiterPolicy::Auto => {
                let without_lf = segment.len() - 1;
                if without_lf > 0 && segment[without_lf - 1] == CARRIAGE_RETURN {
                    without_lf - 1
                } else {
                    without_lf
                }
            }
        }
    }
}
