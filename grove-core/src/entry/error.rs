// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

use crate::entry::Entry;

/// Structural error types for `Entry`.
#[derive(Error, Debug)]
pub enum EntryError {
    /// Sequence numbers start at 1.
    #[error("sequence number can not be zero")]
    SeqNumZero,

    /// Backlink and lipmaa link configuration does not fit the sequence
    /// number.
    #[error("backlink and lipmaa link not valid for this sequence number")]
    InvalidLinks,
}

/// Error types for decoding entry binaries.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Binary ends before the current field does.
    #[error("binary is shorter than the encoded entry requires")]
    Truncated,

    /// Binary is long enough but does not parse as an entry.
    #[error("malformed entry binary: {0}")]
    BadBinary(String),
}

/// A concatenated entry stream broke partway through.
///
/// Carries every entry decoded before the malformed record so callers
/// can decide what to do with the prefix.
#[derive(Error, Debug)]
#[error("entry stream broke after {} complete entries: {source}", .entries.len())]
pub struct StreamError {
    /// Entries decoded before the failure.
    pub entries: Vec<Entry>,

    /// The decode failure that ended the stream.
    #[source]
    pub source: DecodeError,
}
