//! `Range` header parsing.
//!
//! Only a single `bytes=<start>-[<end>]` range is served. Anything else,
//! including suffix ranges and multi-range requests, is unsatisfiable.

use audioshelf_common::{Error, Result};

/// Inclusive byte range, always within the file it was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parse a `Range` header value against a file of `size` bytes.
    ///
    /// `end` defaults to the last byte. `end >= size` is rejected, not
    /// clamped.
    pub fn parse(header: &str, size: u64) -> Result<Self> {
        let unsatisfiable = || Error::RangeNotSatisfiable { size };

        let (unit, ranges) = header.trim().split_once('=').ok_or_else(unsatisfiable)?;
        if !unit.trim().eq_ignore_ascii_case("bytes") || ranges.contains(',') {
            return Err(unsatisfiable());
        }

        let (start, end) = ranges.split_once('-').ok_or_else(unsatisfiable)?;
        let start = parse_bound(start).ok_or_else(unsatisfiable)?;
        let end = match end.trim() {
            "" => size.checked_sub(1).ok_or_else(unsatisfiable)?,
            end => parse_bound(end).ok_or_else(unsatisfiable)?,
        };

        if start > end || end >= size {
            return Err(unsatisfiable());
        }
        Ok(Self { start, end })
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` header of a 206 response.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

fn parse_bound(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
