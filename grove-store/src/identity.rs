// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keypair persistence under caller-chosen aliases.
//!
//! The identity store is global to a spool directory; clumps share it.
//! Only the 32-byte seed is stored, everything else derives from it.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use thiserror::Error;

use grove_core::{base62, Base62Error, PrivateKey, PublicKey};

use crate::error::StoreError;

const IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("identities");

/// File name of the identity database inside the spool directory.
pub const IDENTITY_FILE: &str = "identity.dets";

const SECRET_SIZE: usize = 32;
const BASE62_KEY_SIZE: usize = 43;

/// Where the secret of a new identity comes from.
#[derive(Clone, Debug)]
pub enum KeyMaterial {
    /// Fresh random seed.
    Generate,
    /// Raw 32-byte seed.
    Raw(Vec<u8>),
    /// 43-character base62 seed.
    Base62(String),
}

/// Which key bytes to export for an alias.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    /// 32-byte seed.
    Secret,
    /// 32-byte public key.
    Public,
    /// `secret ‖ public`, the 64-byte form signing primitives accept.
    Signing,
}

/// Error types for identity operations.
#[derive(Error, Debug)]
pub enum IdentityStoreError {
    /// Wrongly shaped arguments.
    #[error("malformed identity arguments: {0}")]
    BadArgs(String),

    /// Key text is not decodable base62.
    #[error(transparent)]
    BadBase62(#[from] Base62Error),

    /// Alias would be unreachable or ambiguous.
    #[error("alias {0:?} is not usable")]
    BadName(String),

    /// No identity under this alias.
    #[error("no identity under alias {0:?}")]
    NoSuchIdentity(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Keypair store shared by every clump of a spool.
pub struct IdentityStore {
    db: Database,
}

impl IdentityStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        let txn = db.begin_write()?;
        {
            txn.open_table(IDENTITIES)?;
        }
        txn.commit()?;

        Ok(Self { db })
    }

    /// Creates (or overwrites) the identity under `alias` and returns
    /// its public key.
    pub fn create(
        &self,
        alias: &str,
        material: KeyMaterial,
    ) -> Result<PublicKey, IdentityStoreError> {
        validate_alias(alias)?;

        let seed: [u8; SECRET_SIZE] = match material {
            KeyMaterial::Generate => PrivateKey::new().to_bytes(),
            KeyMaterial::Raw(bytes) => bytes.try_into().map_err(|bytes: Vec<u8>| {
                IdentityStoreError::BadArgs(format!(
                    "secret key has {} bytes, expected {SECRET_SIZE}",
                    bytes.len()
                ))
            })?,
            KeyMaterial::Base62(text) => {
                let bytes = base62::decode(&text)?;
                bytes.try_into().map_err(|bytes: Vec<u8>| {
                    IdentityStoreError::BadArgs(format!(
                        "base62 secret decodes to {} bytes, expected {SECRET_SIZE}",
                        bytes.len()
                    ))
                })?
            }
        };

        let txn = self.db.begin_write().map_err(StoreError::from)?;
        {
            let mut table = txn.open_table(IDENTITIES).map_err(StoreError::from)?;
            table
                .insert(alias, seed.as_slice())
                .map_err(StoreError::from)?;
        }
        txn.commit().map_err(StoreError::from)?;

        let private_key = PrivateKey::from_bytes(&seed)
            .map_err(|err| IdentityStoreError::BadArgs(err.to_string()))?;
        Ok(private_key.public_key())
    }

    /// Moves an identity to a new alias, keys preserved.
    pub fn rename(&self, old: &str, new: &str) -> Result<PublicKey, IdentityStoreError> {
        validate_alias(new)?;
        let seed = self.seed(old)?;

        if old == new {
            return self.public_key(old);
        }

        let txn = self.db.begin_write().map_err(StoreError::from)?;
        {
            let mut table = txn.open_table(IDENTITIES).map_err(StoreError::from)?;
            table
                .insert(new, seed.as_slice())
                .map_err(StoreError::from)?;
            table.remove(old).map_err(StoreError::from)?;
        }
        txn.commit().map_err(StoreError::from)?;

        self.public_key(new)
    }

    /// Destroys the identity under `alias`, secret included.
    pub fn drop_identity(&self, alias: &str) -> Result<(), IdentityStoreError> {
        let txn = self.db.begin_write().map_err(StoreError::from)?;
        let removed;
        {
            let mut table = txn.open_table(IDENTITIES).map_err(StoreError::from)?;
            removed = table.remove(alias).map_err(StoreError::from)?.is_some();
        }
        txn.commit().map_err(StoreError::from)?;

        if removed {
            Ok(())
        } else {
            Err(IdentityStoreError::NoSuchIdentity(alias.to_string()))
        }
    }

    /// Every `(alias, public key)` pair, sorted by alias.
    pub fn list(&self) -> Result<Vec<(String, PublicKey)>, IdentityStoreError> {
        let txn = self.db.begin_read().map_err(StoreError::from)?;
        let table = txn.open_table(IDENTITIES).map_err(StoreError::from)?;

        let mut out = Vec::new();
        for item in table.iter().map_err(StoreError::from)? {
            let (alias, seed) = item.map_err(StoreError::from)?;
            let public = public_of(seed.value())?;
            out.push((alias.value().to_string(), public));
        }

        Ok(out)
    }

    /// Exports key bytes for an alias.
    pub fn key(&self, alias: &str, kind: KeyKind) -> Result<Vec<u8>, IdentityStoreError> {
        let seed = self.seed(alias)?;
        let private_key = private_of(&seed)?;

        Ok(match kind {
            KeyKind::Secret => seed.to_vec(),
            KeyKind::Public => private_key.public_key().to_bytes().to_vec(),
            KeyKind::Signing => {
                let mut bytes = seed.to_vec();
                bytes.extend_from_slice(&private_key.public_key().to_bytes());
                bytes
            }
        })
    }

    /// Private key under `alias`.
    pub fn private_key(&self, alias: &str) -> Result<PrivateKey, IdentityStoreError> {
        private_of(&self.seed(alias)?)
    }

    /// Public key under `alias`.
    pub fn public_key(&self, alias: &str) -> Result<PublicKey, IdentityStoreError> {
        Ok(self.private_key(alias)?.public_key())
    }

    /// Alias owning `public`, if any.
    pub fn owns(&self, public: &PublicKey) -> Result<Option<String>, IdentityStoreError> {
        for (alias, candidate) in self.list()? {
            if candidate == *public {
                return Ok(Some(alias));
            }
        }
        Ok(None)
    }

    /// Public keys of every stored identity.
    pub fn publics(&self) -> Result<Vec<PublicKey>, IdentityStoreError> {
        Ok(self.list()?.into_iter().map(|(_, public)| public).collect())
    }

    fn seed(&self, alias: &str) -> Result<[u8; SECRET_SIZE], IdentityStoreError> {
        let txn = self.db.begin_read().map_err(StoreError::from)?;
        let table = txn.open_table(IDENTITIES).map_err(StoreError::from)?;

        let guard = table
            .get(alias)
            .map_err(StoreError::from)?
            .ok_or_else(|| IdentityStoreError::NoSuchIdentity(alias.to_string()))?;

        guard.value().try_into().map_err(|_| {
            StoreError::Corrupt(format!("stored seed for {alias:?} has the wrong length")).into()
        })
    }
}

fn private_of(seed: &[u8; SECRET_SIZE]) -> Result<PrivateKey, IdentityStoreError> {
    PrivateKey::from_bytes(seed)
        .map_err(|err| StoreError::Corrupt(err.to_string()).into())
}

fn public_of(seed: &[u8]) -> Result<PublicKey, IdentityStoreError> {
    let checked: [u8; SECRET_SIZE] = seed
        .try_into()
        .map_err(|_| StoreError::Corrupt("stored seed has the wrong length".into()))?;
    Ok(private_of(&checked)?.public_key())
}

/// Aliases resolve last in the reference rules, so shapes claimed by
/// earlier rules can never be aliases: nothing starting with `~`
/// (prefix search) and nothing of exactly 43 characters (base62 key).
fn validate_alias(alias: &str) -> Result<(), IdentityStoreError> {
    if alias.is_empty() || alias.starts_with('~') || alias.len() == BASE62_KEY_SIZE {
        return Err(IdentityStoreError::BadName(alias.to_string()));
    }
    Ok(())
}
