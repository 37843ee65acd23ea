// SPDX-License-Identifier: MIT OR Apache-2.0

//! Self-describing BLAKE2b-512 hashes over arbitrary bytes.
//!
//! Every link and payload digest in a log is carried in a 66-byte
//! container: a varu64 tag naming the hash function, a varu64 digest
//! length and the digest itself. Only BLAKE2b-512 (tag `0`, 64 bytes) is
//! defined, so both prefix varints occupy a single byte each.
//!
//! ## Example
//!
//! ```
//! use grove_core::YamfHash;
//!
//! let bytes: &[u8] = b"A very important message.";
//! let hash = YamfHash::new(bytes);
//!
//! assert!(hash.verify(bytes).is_ok());
//! ```

use std::fmt;

use blake2::{Blake2b512, Digest};
use thiserror::Error;

/// Tag identifying BLAKE2b-512 inside the container.
pub const BLAKE2B_TAG: u8 = 0;

/// Length in bytes of a BLAKE2b-512 digest.
pub const DIGEST_SIZE: usize = 64;

/// Encoded length: tag byte, digest length byte, digest.
pub const YAMF_HASH_SIZE: usize = 66;

/// 66-byte self-describing BLAKE2b-512 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct YamfHash([u8; YAMF_HASH_SIZE]);

impl YamfHash {
    /// Hash the provided bytes.
    pub fn new(buf: impl AsRef<[u8]>) -> Self {
        let digest = Blake2b512::digest(buf.as_ref());
        let mut bytes = [0u8; YAMF_HASH_SIZE];
        bytes[0] = BLAKE2B_TAG;
        bytes[1] = DIGEST_SIZE as u8;
        bytes[2..].copy_from_slice(&digest);
        Self(bytes)
    }

    /// Parse a hash from its raw container bytes.
    pub fn from_bytes(bytes: [u8; YAMF_HASH_SIZE]) -> Result<Self, HashError> {
        if bytes[0] != BLAKE2B_TAG {
            return Err(HashError::UnknownHashType(bytes[0]));
        }

        if bytes[1] != DIGEST_SIZE as u8 {
            return Err(HashError::InvalidDigestLength(bytes[1]));
        }

        Ok(Self(bytes))
    }

    /// Raw container bytes.
    pub fn as_bytes(&self) -> &[u8; YAMF_HASH_SIZE] {
        &self.0
    }

    /// Hex string over the full container.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Recompute the digest of `buf` and compare against this hash.
    pub fn verify(&self, buf: impl AsRef<[u8]>) -> Result<(), HashError> {
        if Self::new(buf) == *self {
            Ok(())
        } else {
            Err(HashError::DigestMismatch)
        }
    }
}

impl AsRef<[u8]> for YamfHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for YamfHash {
    type Error = HashError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let value_len = value.len();

        let checked: [u8; YAMF_HASH_SIZE] = value
            .try_into()
            .map_err(|_| HashError::InvalidLength(value_len, YAMF_HASH_SIZE))?;

        Self::from_bytes(checked)
    }
}

impl fmt::Display for YamfHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for YamfHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "YamfHash({})", self.to_hex())
    }
}

/// Error types for `YamfHash`.
#[derive(Error, Debug)]
pub enum HashError {
    /// Container has an invalid length.
    #[error("invalid hash length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    /// Tag byte names an unsupported hash function.
    #[error("unknown hash type tag {0}")]
    UnknownHashType(u8),

    /// Length byte disagrees with BLAKE2b-512.
    #[error("unexpected digest length byte {0}")]
    InvalidDigestLength(u8),

    /// Digest does not match the hashed bytes.
    #[error("digest does not match hashed bytes")]
    DigestMismatch,
}

#[cfg(test)]
mod tests {
    use super::{HashError, YamfHash, DIGEST_SIZE, YAMF_HASH_SIZE};

    #[test]
    fn container_prefix() {
        let hash = YamfHash::new([1, 2, 3]);
        assert_eq!(hash.as_bytes()[0], 0);
        assert_eq!(hash.as_bytes()[1], DIGEST_SIZE as u8);
    }

    #[test]
    fn verification() {
        let hash = YamfHash::new(b"penguin");
        assert!(hash.verify(b"penguin").is_ok());
        assert!(matches!(
            hash.verify(b"walrus"),
            Err(HashError::DigestMismatch)
        ));
    }

    #[test]
    fn bytes_round_trip() {
        let hash = YamfHash::new(b"round trip");
        let again = YamfHash::try_from(hash.as_bytes().as_slice()).unwrap();
        assert_eq!(hash, again);
    }

    #[test]
    fn invalid_container() {
        let result = YamfHash::try_from(vec![254u8, 100, 4, 7].as_slice());
        assert!(matches!(result, Err(HashError::InvalidLength(4, 66))));

        let mut bytes = *YamfHash::new(b"x").as_bytes();
        bytes[0] = 9;
        assert!(matches!(
            YamfHash::from_bytes(bytes),
            Err(HashError::UnknownHashType(9))
        ));

        let mut bytes = *YamfHash::new(b"x").as_bytes();
        bytes[1] = 32;
        assert!(matches!(
            YamfHash::from_bytes(bytes),
            Err(HashError::InvalidDigestLength(32))
        ));
    }

    #[test]
    fn hex_length() {
        let hash = YamfHash::new(b"hex");
        assert_eq!(hash.to_hex().len(), YAMF_HASH_SIZE * 2);
    }
}
