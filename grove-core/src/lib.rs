// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core primitives for grove append-only logs.
//!
//! A log is a single-writer, hash-chained sequence of signed entries. This
//! crate holds everything that can be expressed without a store: the entry
//! type and its binary codec, the self-describing BLAKE2b hash container
//! used for all links, the base62 text form of public keys, the lipmaa
//! link arithmetic and the Ed25519 key wrappers.

pub mod base62;
pub mod entry;
pub mod hash;
pub mod identity;
pub mod lipmaa;

pub use base62::Base62Error;
pub use entry::{
    decode_entry, decode_stream, sign_entry, DecodeError, Entry, EntryError, EntryStream,
    StreamError,
};
pub use hash::{HashError, YamfHash, YAMF_HASH_SIZE};
pub use identity::{IdentityError, PrivateKey, PublicKey, Signature};
