// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::grove::DEFAULT_CLUMP;

/// Per-call options shared by most engine operations.
#[derive(Clone, Debug)]
pub struct Options {
    /// Log of the author to operate on.
    pub log_id: u64,

    /// Run full validation before returning a fetched entry.
    pub revalidate: bool,

    /// Overwrite existing records when storing foreign entries.
    pub replace: bool,

    /// Clump the operation works in.
    pub clump_id: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_id: 0,
            revalidate: false,
            replace: false,
            clump_id: DEFAULT_CLUMP.to_string(),
        }
    }
}

impl Options {
    /// Default options for another log.
    pub fn log(log_id: u64) -> Self {
        Self {
            log_id,
            ..Self::default()
        }
    }

    /// Default options for another clump.
    pub fn clump(clump_id: impl Into<String>) -> Self {
        Self {
            clump_id: clump_id.into(),
            ..Self::default()
        }
    }
}

/// Position selector for single-entry reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Seq {
    /// A concrete sequence number.
    Num(u64),
    /// Whatever the largest stored sequence number currently is.
    Max,
}

impl From<u64> for Seq {
    fn from(value: u64) -> Self {
        Seq::Num(value)
    }
}
