// SPDX-License-Identifier: MIT OR Apache-2.0

//! Block set of one clump.
//!
//! A block names an author, a log id, or a specific `(author, log_id)`
//! pair; content matching any active block may not be stored. Specifiers
//! are independent of one another: removing an author-wide block leaves a
//! narrower `(author, log_id)` block in place.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use grove_core::PublicKey;

use crate::error::StoreError;

const BLOCKS: TableDefinition<&[u8], ()> = TableDefinition::new("blocks");

/// File name of the metadata database inside a clump directory.
pub const METADATA_FILE: &str = "metadata.dets";

const TAG_AUTHOR: u8 = 1;
const TAG_LOG: u8 = 2;
const TAG_AUTHOR_LOG: u8 = 3;

/// One block specifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlockSpec {
    Author(PublicKey),
    Log(u64),
    AuthorLog(PublicKey, u64),
}

impl BlockSpec {
    /// The author this specifier names, if it names one.
    pub fn author(&self) -> Option<PublicKey> {
        match self {
            BlockSpec::Author(author) | BlockSpec::AuthorLog(author, _) => Some(*author),
            BlockSpec::Log(_) => None,
        }
    }

    /// Stable byte form: a tag byte followed by the named fields.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            BlockSpec::Author(author) => {
                let mut bytes = vec![TAG_AUTHOR];
                bytes.extend_from_slice(&author.to_bytes());
                bytes
            }
            BlockSpec::Log(log_id) => {
                let mut bytes = vec![TAG_LOG];
                bytes.extend_from_slice(&log_id.to_be_bytes());
                bytes
            }
            BlockSpec::AuthorLog(author, log_id) => {
                let mut bytes = vec![TAG_AUTHOR_LOG];
                bytes.extend_from_slice(&author.to_bytes());
                bytes.extend_from_slice(&log_id.to_be_bytes());
                bytes
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let corrupt = || StoreError::Corrupt("block specifier bytes are malformed".into());

        let (tag, rest) = bytes.split_first().ok_or_else(corrupt)?;
        match (*tag, rest.len()) {
            (TAG_AUTHOR, 32) => Ok(BlockSpec::Author(
                PublicKey::from_bytes(rest).map_err(|_| corrupt())?,
            )),
            (TAG_LOG, 8) => Ok(BlockSpec::Log(u64::from_be_bytes(
                rest.try_into().map_err(|_| corrupt())?,
            ))),
            (TAG_AUTHOR_LOG, 40) => {
                let author = PublicKey::from_bytes(&rest[..32]).map_err(|_| corrupt())?;
                let log_id =
                    u64::from_be_bytes(rest[32..].try_into().map_err(|_| corrupt())?);
                Ok(BlockSpec::AuthorLog(author, log_id))
            }
            _ => Err(corrupt()),
        }
    }
}

/// Block set store of one clump.
pub struct MetadataStore {
    db: Database,
}

impl MetadataStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        let txn = db.begin_write()?;
        {
            txn.open_table(BLOCKS)?;
        }
        txn.commit()?;

        Ok(Self { db })
    }

    /// Adds a specifier. Returns `false` when it was already present.
    pub fn insert(&self, spec: &BlockSpec) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let fresh;
        {
            let mut table = txn.open_table(BLOCKS)?;
            fresh = table.insert(spec.to_bytes().as_slice(), ())?.is_none();
        }
        txn.commit()?;

        Ok(fresh)
    }

    /// Removes exactly this specifier. Returns `false` when absent.
    pub fn remove(&self, spec: &BlockSpec) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let removed;
        {
            let mut table = txn.open_table(BLOCKS)?;
            removed = table.remove(spec.to_bytes().as_slice())?.is_some();
        }
        txn.commit()?;

        Ok(removed)
    }

    /// Exact membership of one specifier.
    pub fn contains(&self, spec: &BlockSpec) -> Result<bool, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BLOCKS)?;
        Ok(table.get(spec.to_bytes().as_slice())?.is_some())
    }

    /// Whether content of `(author, log_id)` is blocked by any active
    /// specifier.
    pub fn is_blocked(&self, author: &PublicKey, log_id: u64) -> Result<bool, StoreError> {
        Ok(self.contains(&BlockSpec::Author(*author))?
            || self.contains(&BlockSpec::Log(log_id))?
            || self.contains(&BlockSpec::AuthorLog(*author, log_id))?)
    }

    /// Every active specifier, sorted by byte form.
    pub fn list(&self) -> Result<Vec<BlockSpec>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BLOCKS)?;

        let mut out = Vec::new();
        for item in table.iter()? {
            let (key, _) = item?;
            out.push(BlockSpec::from_bytes(key.value())?);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use grove_core::{PrivateKey, PublicKey};

    use super::{BlockSpec, MetadataStore};

    fn author() -> PublicKey {
        PrivateKey::new().public_key()
    }

    fn store() -> (tempfile::TempDir, MetadataStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(tmp.path().join("metadata.dets")).unwrap();
        (tmp, store)
    }

    #[test]
    fn spec_bytes_round_trip() {
        let alice = author();
        for spec in [
            BlockSpec::Author(alice),
            BlockSpec::Log(77),
            BlockSpec::AuthorLog(alice, 3),
        ] {
            assert_eq!(BlockSpec::from_bytes(&spec.to_bytes()).unwrap(), spec);
        }
    }

    #[test]
    fn insert_is_idempotent() {
        let (_tmp, store) = store();
        let spec = BlockSpec::Log(5);

        assert!(store.insert(&spec).unwrap());
        assert!(!store.insert(&spec).unwrap());
        assert_eq!(store.list().unwrap(), vec![spec]);
    }

    #[test]
    fn general_and_specific_are_independent() {
        let (_tmp, store) = store();
        let alice = author();

        store.insert(&BlockSpec::Author(alice)).unwrap();
        store.insert(&BlockSpec::AuthorLog(alice, 2)).unwrap();

        assert!(store.remove(&BlockSpec::Author(alice)).unwrap());
        assert!(store.contains(&BlockSpec::AuthorLog(alice, 2)).unwrap());
        assert!(!store.remove(&BlockSpec::Author(alice)).unwrap());
    }

    #[test]
    fn triple_matching() {
        let (_tmp, store) = store();
        let alice = author();
        let bob = author();

        store.insert(&BlockSpec::Author(alice)).unwrap();
        store.insert(&BlockSpec::Log(3)).unwrap();
        store.insert(&BlockSpec::AuthorLog(bob, 2)).unwrap();

        assert!(store.is_blocked(&alice, 0).unwrap());
        assert!(store.is_blocked(&bob, 3).unwrap());
        assert!(store.is_blocked(&bob, 2).unwrap());
        assert!(!store.is_blocked(&bob, 0).unwrap());
    }
}
