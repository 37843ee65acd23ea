// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry type and binary codec for append-only logs.
//!
//! An entry is the canonical record of the system: a signed preamble
//! naming the author, position and payload digest, optionally followed by
//! the payload itself. Entries of one `(author, log_id)` pair form a
//! hash-chained, single-writer log.

mod decode;
mod encode;
#[allow(clippy::module_inception)]
mod entry;
mod error;

pub use decode::{decode_entry, decode_stream, EntryStream};
pub use encode::sign_entry;
pub use entry::{Entry, ENTRY_TAG, MIN_ENTRY_SIZE};
pub use error::{DecodeError, EntryError, StreamError};
