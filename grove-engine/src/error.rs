// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

use grove_core::{Base62Error, DecodeError, EntryError, IdentityError, StreamError};
use grove_store::{IdentityStoreError, StoreError};

/// Error kinds surfaced by the engine.
#[derive(Error, Debug)]
pub enum GroveError {
    /// Wrongly shaped arguments.
    #[error("malformed arguments: {0}")]
    BadArgs(String),

    /// Text is not decodable base62.
    #[error(transparent)]
    BadBase62(#[from] Base62Error),

    /// Alias is not in the identity store.
    #[error("no identity under alias {0:?}")]
    NoSuchIdentity(String),

    /// Reference is ambiguous or resolves to nothing.
    #[error("cannot resolve identity reference {0:?}")]
    UnknownIdentity(String),

    /// Binary ends before the encoded entry does.
    #[error("binary is shorter than the encoded entry requires")]
    Truncated,

    /// Entry stream or single binary does not parse.
    #[error("malformed entry binary: {0}")]
    BadBinary(String),

    /// Signature does not cover the preamble under the claimed author.
    #[error("signature does not match author and entry bytes")]
    InvalidSig,

    /// Payload does not hash to the claimed payload hash.
    #[error("payload does not match the claimed payload hash")]
    InvalidPayloadHash,

    /// Backlink disagrees with the stored predecessor.
    #[error("backlink does not match the stored previous entry")]
    InvalidBacklink,

    /// Lipmaa link present when not required, or disagrees with its
    /// stored target.
    #[error("lipmaa link is not valid for this entry")]
    InvalidLipmaa,

    /// Backlink field absent on an entry past the first.
    #[error("backlink required but absent")]
    MissingBacklink,

    /// Lipmaa link field or its stored target is absent.
    #[error("lipmaa link target is not in the store")]
    MissingLipmaa,

    /// A certificate pool member cannot be fetched or decoded.
    #[error("certificate pool member {0} cannot be verified")]
    ChainBroken(u64),

    /// Content refused because an active block matches it.
    #[error("entry is refused by an active block")]
    RefusedBlocked,

    /// Authors with a local identity cannot be blocked.
    #[error("authors with a local identity cannot be blocked")]
    BlockedLocalIdentity,

    /// Clump is not part of this spool.
    #[error("unknown clump {0:?}")]
    UnknownClumpId(String),

    /// Range bounds are not `2 ≤ first ≤ last`.
    #[error("range bounds must satisfy first >= 2 and last >= first")]
    BadRange,

    /// Requested record is not in the store.
    #[error("requested entry is not in the store")]
    Missing,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<IdentityStoreError> for GroveError {
    fn from(err: IdentityStoreError) -> Self {
        match err {
            IdentityStoreError::BadArgs(reason) => GroveError::BadArgs(reason),
            IdentityStoreError::BadBase62(err) => GroveError::BadBase62(err),
            IdentityStoreError::BadName(alias) => {
                GroveError::BadArgs(format!("alias {alias:?} is not usable"))
            }
            IdentityStoreError::NoSuchIdentity(alias) => GroveError::NoSuchIdentity(alias),
            IdentityStoreError::Store(err) => GroveError::Store(err),
        }
    }
}

impl From<DecodeError> for GroveError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Truncated => GroveError::Truncated,
            DecodeError::BadBinary(reason) => GroveError::BadBinary(reason),
        }
    }
}

impl From<StreamError> for GroveError {
    fn from(err: StreamError) -> Self {
        GroveError::BadBinary(err.to_string())
    }
}

impl From<EntryError> for GroveError {
    fn from(err: EntryError) -> Self {
        GroveError::BadBinary(err.to_string())
    }
}

impl From<IdentityError> for GroveError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Base62(err) => GroveError::BadBase62(err),
            other => GroveError::BadArgs(other.to_string()),
        }
    }
}
