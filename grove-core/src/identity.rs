// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ed25519 key and signature wrappers.

use std::fmt;
use std::hash::{Hash, Hasher};

use ed25519_dalek::{
    Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;
use thiserror::Error;

use crate::base62;
use crate::Base62Error;

/// Private ed25519 key used for signing entries.
#[derive(Clone, Debug)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Generates a new private key from the system CSPRNG.
    pub fn new() -> Self {
        let mut csprng: OsRng = OsRng;
        Self(SigningKey::generate(&mut csprng))
    }

    /// Restores a private key from its 32-byte seed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let checked: [u8; SECRET_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidPrivateKeyLength(bytes.len(), SECRET_KEY_LENGTH))?;

        Ok(Self(SigningKey::from_bytes(&checked)))
    }

    /// Seed bytes of this key.
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// Derives the matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Signs arbitrary bytes.
    pub fn sign(&self, bytes: &[u8]) -> Signature {
        Signature(self.0.sign(bytes))
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Public ed25519 key identifying a log author.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Restores a public key from its 32 raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let checked: [u8; PUBLIC_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidPublicKeyLength(bytes.len(), PUBLIC_KEY_LENGTH))?;

        Ok(Self(VerifyingKey::from_bytes(&checked)?))
    }

    /// Parses the base62 text form.
    pub fn from_base62(text: &str) -> Result<Self, IdentityError> {
        Self::from_bytes(&base62::decode(text)?)
    }

    /// Raw key bytes.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// Base62 text form.
    pub fn to_base62(&self) -> String {
        base62::encode(self.0.as_bytes())
    }

    /// Verifies an ed25519 signature over `bytes`.
    pub fn verify(&self, bytes: &[u8], signature: &Signature) -> bool {
        self.0.verify(bytes, &signature.0).is_ok()
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_bytes().hash(state);
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base62())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base62())
    }
}

/// Ed25519 signature over entry preamble bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// Restores a signature from its 64 raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let checked: [u8; SIGNATURE_LENGTH] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidSignatureLength(bytes.len(), SIGNATURE_LENGTH))?;

        Ok(Self(ed25519_dalek::Signature::from_bytes(&checked)))
    }

    /// Raw signature bytes.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        self.0.to_bytes()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.to_bytes()))
    }
}

/// Error types for key and signature handling.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Private key seed has the wrong length.
    #[error("invalid private key length {0} bytes, expected {1} bytes")]
    InvalidPrivateKeyLength(usize, usize),

    /// Public key has the wrong length.
    #[error("invalid public key length {0} bytes, expected {1} bytes")]
    InvalidPublicKeyLength(usize, usize),

    /// Signature has the wrong length.
    #[error("invalid signature length {0} bytes, expected {1} bytes")]
    InvalidSignatureLength(usize, usize),

    /// Bytes do not form a valid curve point.
    #[error("bytes do not form a valid public key")]
    InvalidPublicKey(#[from] ed25519_dalek::SignatureError),

    /// Key text is not decodable base62.
    #[error(transparent)]
    Base62(#[from] Base62Error),
}
