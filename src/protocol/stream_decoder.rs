//! Incremental record decoder.
//!
//! Uses `bytes::BytesMut` for the retained tail, so records are frozen
//! slices of the receive buffer rather than copies. Bytes arrive in
//! whatever pieces the transport produced; the decoder carries the
//! incomplete tail across calls and only ever acts on a `\n`, which makes
//! a `\r` / `\n` pair split across two chunks come out right.
//!
//! # Example
//!
//! ```
//! use feedwire::protocol::StreamDecoder;
//!
//! let mut decoder = StreamDecoder::new();
//!
//! let records = decoder.feed(b"alpha\r").unwrap();
//! assert!(records.is_empty());
//!
//! let records = decoder.feed(b"\nbeta\r\n").unwrap();
//! assert_eq!(records.len(), 2);
//! assert_eq!(&records[0][..], b"alpha");
//! assert_eq!(&records[1][..], b"beta");
//! ```

use bytes::BytesMut;

use super::delimiter::{DelimiterPolicy, LINE_FEED};
use super::Record;
use crate::error::{FeedwireError, Result};

/// Default bound on the retained tail (1 MiB).
pub const DEFAULT_MAX_TAIL_SIZE: usize = 1024 * 1024;

/// Initial buffer capacity.
const INITIAL_CAPACITY: usize = 16 * 1024;

/// Splits an unbounded byte stream into delimiter-terminated records.
pub struct StreamDecoder {
    /// Bytes received but not yet terminated.
    buffer: BytesMut,
    /// Prefix of `buffer` already scanned and known to hold no `\n`.
    scanned: usize,
    /// How segments are trimmed into records.
    policy: DelimiterPolicy,
    /// Maximum allowed tail length.
    max_tail_size: usize,
}

impl StreamDecoder {
    /// Create a decoder with the default policy and tail bound.
    pub fn new() -> Self {
        Self::with_policy(DelimiterPolicy::default())
    }

    /// Create a decoder with a custom delimiter policy.
    pub fn with_policy(policy: DelimiterPolicy) -> Self {
        Self::with_policy_and_max_tail(policy, DEFAULT_MAX_TAIL_SIZE)
    }

    /// Create a decoder with a custom delimiter policy and tail bound.
    pub fn with_policy_and_max_tail(policy: DelimiterPolicy, max_tail_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY.min(max_tail_size.max(1))),
            scanned: 0,
            policy,
            max_tail_size,
        }
    }

    /// Feed a chunk and extract all records it completes.
    ///
    /// Segments that are empty after trimming are suppressed. Whatever
    /// follows the last `\n` is retained for the next call.
    ///
    /// # Errors
    ///
    /// Returns [`FeedwireError::TailOverflow`] if the retained tail grows
    /// past the configured bound. The tail is discarded in that case, and
    /// so are records the same chunk completed; use
    /// [`feed_into`](Self::feed_into) to keep them.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        self.feed_into(chunk, &mut records)?;
        Ok(records)
    }

    /// Feed a chunk, appending every record it completes to `records`.
    ///
    /// Records are appended before the tail bound is checked, so on
    /// [`FeedwireError::TailOverflow`] `records` still holds everything
    /// that was terminated ahead of the runaway tail.
    pub fn feed_into(&mut self, chunk: &[u8], records: &mut Vec<Record>) -> Result<()> {
        self.buffer.extend_from_slice(chunk);

        while let Some(offset) = self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == LINE_FEED)
        {
            let mut segment = self.buffer.split_to(self.scanned + offset + 1);
            self.scanned = 0;

            let len = self.policy.record_len(&segment);
            if len == 0 {
                continue;
            }

            segment.truncate(len);
            records.push(Record::new(segment.freeze()));
        }
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_tail_size {
            let len = self.buffer.len();
            self.clear();
            return Err(FeedwireError::TailOverflow {
                len,
                max: self.max_tail_size,
            });
        }

        Ok(())
    }

    /// Retained tail bytes.
    pub fn tail(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of retained tail bytes.
    pub fn tail_len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if no tail is retained.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Delimiter policy in use.
    pub fn policy(&self) -> DelimiterPolicy {
        self.policy
    }

    /// Maximum tail length before `feed` fails.
    pub fn max_tail_size(&self) -> usize {
        self.max_tail_size
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crlf() -> StreamDecoder {
        StreamDecoder::with_policy(DelimiterPolicy::Crlf)
    }

    #[test]
    fn test_split_terminator() {
        let mut decoder = crlf();

        let records = decoder.feed(b"alpha\r").unwrap();
        assert!(records.is_empty());
        assert_eq!(decoder.tail(), b"alpha\r");

        let records = decoder.feed(b"\nbeta\r\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][..], b"alpha");
        assert_eq!(&records[1][..], b"beta");
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_empty_lines_suppressed() {
        let mut decoder = crlf();

        let records = decoder.feed(b"\r\n\r\n").unwrap();
        assert!(records.is_empty());
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_keepalive_between_records() {
        let mut decoder = StreamDecoder::new();

        let records = decoder.feed(b"{\"a\":1}\r\n\r\n\r\n{\"b\":2}\r\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][..], b"{\"a\":1}");
        assert_eq!(&records[1][..], b"{\"b\":2}");
    }

    #[test]
    fn test_round_trip_across_chunkings() {
        let input: &[u8] = b"{\"id\":1}\r\n{\"id\":22}\r\nplain text\r\n{\"id\":333}\r\npartial";

        for chunk_size in 1..=input.len() {
            let mut decoder = crlf();
            let mut rebuilt = Vec::new();

            for chunk in input.chunks(chunk_size) {
                for record in decoder.feed(chunk).unwrap() {
                    rebuilt.extend_from_slice(&record);
                    rebuilt.extend_from_slice(b"\r\n");
                }
            }
            rebuilt.extend_from_slice(decoder.tail());

            assert_eq!(rebuilt, input, "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn test_bare_lf_under_crlf_drops_last_byte() {
        let mut decoder = crlf();

        let records = decoder.feed(b"abc\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][..], b"ab");

        // A single content byte is trimmed away entirely.
        let records = decoder.feed(b"x\n").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_bare_lf_under_auto_and_lf() {
        let mut auto = StreamDecoder::new();
        let records = auto.feed(b"abc\nxyz\r\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][..], b"abc");
        assert_eq!(&records[1][..], b"xyz");

        let mut lf = StreamDecoder::with_policy(DelimiterPolicy::Lf);
        let records = lf.feed(b"abc\nxyz\r\n").unwrap();
        assert_eq!(&records[0][..], b"abc");
        assert_eq!(&records[1][..], b"xyz\r");
    }

    #[test]
    fn test_split_terminator_under_auto() {
        let mut decoder = StreamDecoder::new();

        assert!(decoder.feed(b"alpha\r").unwrap().is_empty());
        let records = decoder.feed(b"\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][..], b"alpha");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut decoder = StreamDecoder::new();
        let input = b"one\r\ntwo\r\n";

        let mut all = Vec::new();
        for byte in input {
            all.extend(decoder.feed(&[*byte]).unwrap());
        }

        assert_eq!(all.len(), 2);
        assert_eq!(&all[0][..], b"one");
        assert_eq!(&all[1][..], b"two");
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_tail_bounded() {
        let mut decoder = StreamDecoder::with_policy_and_max_tail(DelimiterPolicy::Crlf, 8);

        // Exactly at the bound is fine.
        assert!(decoder.feed(b"12345678").unwrap().is_empty());
        assert_eq!(decoder.tail_len(), 8);

        let result = decoder.feed(b"9");
        assert!(matches!(
            result,
            Err(FeedwireError::TailOverflow { len: 9, max: 8 })
        ));
        assert!(decoder.is_empty());

        // Decoder is usable again after the tail was discarded.
        let records = decoder.feed(b"ok\r\n").unwrap();
        assert_eq!(&records[0][..], b"ok");
    }

    #[test]
    fn test_records_do_not_count_against_tail_bound() {
        let mut decoder = StreamDecoder::with_policy_and_max_tail(DelimiterPolicy::Crlf, 4);

        let records = decoder.feed(b"aaaaaaaaaaaa\r\nbb").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(decoder.tail(), b"bb");
    }

    #[test]
    fn test_overflow_keeps_records_before_tail() {
        let mut decoder = StreamDecoder::with_policy_and_max_tail(DelimiterPolicy::Crlf, 8);
        let mut records = Vec::new();

        let result = decoder.feed_into(b"{\"a\":1}\r\n0123456789", &mut records);

        assert!(matches!(
            result,
            Err(FeedwireError::TailOverflow { len: 10, max: 8 })
        ));
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][..], b"{\"a\":1}");
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_feed_into_appends() {
        let mut decoder = StreamDecoder::new();
        let mut records = Vec::new();

        decoder.feed_into(b"one\r\ntw", &mut records).unwrap();
        decoder.feed_into(b"o\r\n", &mut records).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(&records[1][..], b"two");
    }
}
