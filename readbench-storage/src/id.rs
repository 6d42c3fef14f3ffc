//! Addressing of objects and byte ranges within them.

use std::fmt;

/// The address of an object in the remote storage service.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectLocator {
    /// The bucket (or container) holding the object.
    pub bucket: String,
    /// The object's key within the bucket.
    pub key: String,
}

impl ObjectLocator {
    /// Creates a locator for `key` within `bucket`.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// A contiguous byte interval `[offset, offset + length)` of an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadRange {
    /// The first byte of the range.
    pub offset: u64,
    /// The number of bytes in the range.
    pub length: u64,
}

impl ReadRange {
    /// Creates a range of `length` bytes starting at `offset`.
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// The exclusive end of the range.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Returns `true` if the range covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Formats the range as the value of an HTTP `Range` header.
    ///
    /// HTTP ranges are inclusive on both ends, so an empty range has no representation.
    pub(crate) fn http_header(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(format!("bytes={}-{}", self.offset, self.end() - 1))
    }
}

impl fmt::Display for ReadRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.offset, self.end())
    }
}
