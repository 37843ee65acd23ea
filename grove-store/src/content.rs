// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry and payload persistence for one clump.
//!
//! Records are keyed by `(author, log_id, seq_num)` and hold two
//! independently present halves: the signed entry bytes and the payload
//! bytes. The halves live in two tables of one database so a record can
//! exist with either half missing (a common state under partial
//! replication) while a `put` still lands atomically.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use grove_core::PublicKey;

use crate::error::StoreError;

const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");
const PAYLOADS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("payloads");

/// File name of the content database inside a clump directory.
pub const CONTENT_FILE: &str = "content.dets";

const AUTHOR_SIZE: usize = 32;
const KEY_SIZE: usize = AUTHOR_SIZE + 8 + 8;

/// Position of one record: author, log and sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogKey {
    pub author: PublicKey,
    pub log_id: u64,
    pub seq_num: u64,
}

impl LogKey {
    pub fn new(author: PublicKey, log_id: u64, seq_num: u64) -> Self {
        Self {
            author,
            log_id,
            seq_num,
        }
    }

    /// Fixed-width byte form: raw author key, then log and sequence
    /// number big-endian, so one log's records sort by sequence number.
    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        let mut bytes = [0u8; KEY_SIZE];
        bytes[..AUTHOR_SIZE].copy_from_slice(&self.author.to_bytes());
        bytes[AUTHOR_SIZE..AUTHOR_SIZE + 8].copy_from_slice(&self.log_id.to_be_bytes());
        bytes[AUTHOR_SIZE + 8..].copy_from_slice(&self.seq_num.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() != KEY_SIZE {
            return Err(StoreError::Corrupt(format!(
                "content key has {} bytes, expected {KEY_SIZE}",
                bytes.len()
            )));
        }

        let author = PublicKey::from_bytes(&bytes[..AUTHOR_SIZE])
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let log_id = u64::from_be_bytes(
            bytes[AUTHOR_SIZE..AUTHOR_SIZE + 8]
                .try_into()
                .expect("slice has eight bytes"),
        );
        let seq_num = u64::from_be_bytes(
            bytes[AUTHOR_SIZE + 8..]
                .try_into()
                .expect("slice has eight bytes"),
        );

        Ok(Self {
            author,
            log_id,
            seq_num,
        })
    }
}

/// Both halves of a stored record; either may be absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoredRecord {
    pub entry: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

impl StoredRecord {
    pub fn is_absent(&self) -> bool {
        self.entry.is_none() && self.payload.is_none()
    }
}

/// Which half of a record to probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Part {
    Entry,
    Payload,
}

/// Match pattern over any subset of `(author, log_id)`; the sequence
/// number is always a wildcard.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyPattern {
    pub author: Option<PublicKey>,
    pub log_id: Option<u64>,
}

impl KeyPattern {
    fn matches(&self, key_bytes: &[u8]) -> bool {
        if key_bytes.len() != KEY_SIZE {
            return false;
        }
        if let Some(author) = &self.author {
            if key_bytes[..AUTHOR_SIZE] != author.to_bytes() {
                return false;
            }
        }
        if let Some(log_id) = self.log_id {
            if key_bytes[AUTHOR_SIZE..AUTHOR_SIZE + 8] != log_id.to_be_bytes() {
                return false;
            }
        }
        true
    }

    /// Longest fixed key prefix this pattern pins down.
    fn prefix(&self) -> Vec<u8> {
        let mut prefix = Vec::new();
        if let Some(author) = &self.author {
            prefix.extend_from_slice(&author.to_bytes());
            if let Some(log_id) = self.log_id {
                prefix.extend_from_slice(&log_id.to_be_bytes());
            }
        }
        prefix
    }
}

/// Content store of one clump.
pub struct ContentStore {
    db: Database,
}

impl ContentStore {
    /// Opens (or creates) the database and makes sure both tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        let txn = db.begin_write()?;
        {
            txn.open_table(ENTRIES)?;
            txn.open_table(PAYLOADS)?;
        }
        txn.commit()?;

        Ok(Self { db })
    }

    /// Full record under `key`; both halves `None` when absent.
    pub fn get(&self, key: &LogKey) -> Result<StoredRecord, StoreError> {
        let txn = self.db.begin_read()?;
        let entries = txn.open_table(ENTRIES)?;
        let payloads = txn.open_table(PAYLOADS)?;
        let key_bytes = key.to_bytes();

        Ok(StoredRecord {
            entry: entries
                .get(key_bytes.as_slice())?
                .map(|guard| guard.value().to_vec()),
            payload: payloads
                .get(key_bytes.as_slice())?
                .map(|guard| guard.value().to_vec()),
        })
    }

    /// Inserts or replaces the record under `key`. A `None` half removes
    /// that half. Both halves land in one transaction.
    pub fn put(
        &self,
        key: &LogKey,
        entry: Option<&[u8]>,
        payload: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut entries = txn.open_table(ENTRIES)?;
            let mut payloads = txn.open_table(PAYLOADS)?;
            let key_bytes = key.to_bytes();

            match entry {
                Some(bytes) => {
                    entries.insert(key_bytes.as_slice(), bytes)?;
                }
                None => {
                    entries.remove(key_bytes.as_slice())?;
                }
            }
            match payload {
                Some(bytes) => {
                    payloads.insert(key_bytes.as_slice(), bytes)?;
                }
                None => {
                    payloads.remove(key_bytes.as_slice())?;
                }
            }
        }
        txn.commit()?;

        Ok(())
    }

    /// Removes both halves. Idempotent.
    pub fn delete(&self, key: &LogKey) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut entries = txn.open_table(ENTRIES)?;
            let mut payloads = txn.open_table(PAYLOADS)?;
            let key_bytes = key.to_bytes();
            entries.remove(key_bytes.as_slice())?;
            payloads.remove(key_bytes.as_slice())?;
        }
        txn.commit()?;

        Ok(())
    }

    /// Removes every record matching `pattern` in one transaction.
    /// Returns how many keys were removed.
    pub fn match_delete(&self, pattern: &KeyPattern) -> Result<usize, StoreError> {
        let txn = self.db.begin_write()?;
        let removed;
        {
            let mut entries = txn.open_table(ENTRIES)?;
            let mut payloads = txn.open_table(PAYLOADS)?;

            let mut keys = scan_keys(&entries, pattern)?;
            keys.extend(scan_keys(&payloads, pattern)?);
            let keys: BTreeSet<Vec<u8>> = keys.into_iter().collect();

            removed = keys.len();
            for key_bytes in keys {
                entries.remove(key_bytes.as_slice())?;
                payloads.remove(key_bytes.as_slice())?;
            }
        }
        txn.commit()?;

        Ok(removed)
    }

    /// Keys matching `pattern`, sorted.
    pub fn match_keys(&self, pattern: &KeyPattern) -> Result<Vec<LogKey>, StoreError> {
        let txn = self.db.begin_read()?;
        let entries = txn.open_table(ENTRIES)?;
        let payloads = txn.open_table(PAYLOADS)?;

        let mut keys = scan_keys(&entries, pattern)?;
        keys.extend(scan_keys(&payloads, pattern)?);
        let keys: BTreeSet<Vec<u8>> = keys.into_iter().collect();

        keys.iter()
            .map(|bytes| LogKey::from_bytes(bytes))
            .collect()
    }

    /// Folds every stored record once, in sorted key order.
    pub fn fold<B, F>(&self, init: B, mut f: F) -> Result<B, StoreError>
    where
        F: FnMut(B, LogKey, StoredRecord) -> B,
    {
        let txn = self.db.begin_read()?;
        let entries = txn.open_table(ENTRIES)?;
        let payloads = txn.open_table(PAYLOADS)?;

        let mut records: BTreeMap<Vec<u8>, StoredRecord> = BTreeMap::new();
        for item in entries.iter()? {
            let (key, value) = item?;
            records.entry(key.value().to_vec()).or_default().entry = Some(value.value().to_vec());
        }
        for item in payloads.iter()? {
            let (key, value) = item?;
            records.entry(key.value().to_vec()).or_default().payload =
                Some(value.value().to_vec());
        }

        let mut acc = init;
        for (key_bytes, record) in records {
            acc = f(acc, LogKey::from_bytes(&key_bytes)?, record);
        }

        Ok(acc)
    }

    /// Removes every record.
    pub fn truncate(&self) -> Result<(), StoreError> {
        self.match_delete(&KeyPattern::default())?;
        Ok(())
    }

    /// Cheap membership probe for one half of a record.
    pub fn exists_part(&self, key: &LogKey, part: Part) -> Result<bool, StoreError> {
        let txn = self.db.begin_read()?;
        let key_bytes = key.to_bytes();

        let exists = match part {
            Part::Entry => txn.open_table(ENTRIES)?.get(key_bytes.as_slice())?.is_some(),
            Part::Payload => txn
                .open_table(PAYLOADS)?
                .get(key_bytes.as_slice())?
                .is_some(),
        };

        Ok(exists)
    }

    /// Largest sequence number stored for `(author, log_id)`, 0 if none.
    pub fn max_seq_num(&self, author: &PublicKey, log_id: u64) -> Result<u64, StoreError> {
        Ok(self.seq_nums(author, log_id)?.last().copied().unwrap_or(0))
    }

    /// Every stored sequence number for `(author, log_id)`, ascending.
    pub fn seq_nums(&self, author: &PublicKey, log_id: u64) -> Result<Vec<u64>, StoreError> {
        let pattern = KeyPattern {
            author: Some(*author),
            log_id: Some(log_id),
        };

        Ok(self
            .match_keys(&pattern)?
            .into_iter()
            .map(|key| key.seq_num)
            .collect())
    }

    /// Distinct authors with any stored half, sorted.
    pub fn authors(&self) -> Result<Vec<PublicKey>, StoreError> {
        let keys = self.match_keys(&KeyPattern::default())?;
        let authors: BTreeSet<PublicKey> = keys.into_iter().map(|key| key.author).collect();
        Ok(authors.into_iter().collect())
    }

    /// `(author, log_id, max_seq_num)` for every stored log, sorted.
    pub fn log_summaries(&self) -> Result<Vec<(PublicKey, u64, u64)>, StoreError> {
        let mut summaries: BTreeMap<(PublicKey, u64), u64> = BTreeMap::new();
        for key in self.match_keys(&KeyPattern::default())? {
            let max = summaries.entry((key.author, key.log_id)).or_default();
            *max = (*max).max(key.seq_num);
        }

        Ok(summaries
            .into_iter()
            .map(|((author, log_id), max)| (author, log_id, max))
            .collect())
    }
}

/// Collects the byte keys of `table` matching `pattern`, using a range
/// scan when the pattern pins down a key prefix.
fn scan_keys<T>(table: &T, pattern: &KeyPattern) -> Result<Vec<Vec<u8>>, StoreError>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut keys = Vec::new();
    let prefix = pattern.prefix();

    if prefix.is_empty() {
        for item in table.iter()? {
            let (key, _) = item?;
            if pattern.matches(key.value()) {
                keys.push(key.value().to_vec());
            }
        }
    } else {
        for item in table.range(prefix.as_slice()..)? {
            let (key, _) = item?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            if pattern.matches(key.value()) {
                keys.push(key.value().to_vec());
            }
        }
    }

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use grove_core::{PrivateKey, PublicKey};

    use super::{ContentStore, KeyPattern, LogKey, Part};

    fn author() -> PublicKey {
        PrivateKey::new().public_key()
    }

    fn store() -> (tempfile::TempDir, ContentStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = ContentStore::open(tmp.path().join("content.dets")).unwrap();
        (tmp, store)
    }

    #[test]
    fn put_get_delete() {
        let (_tmp, store) = store();
        let key = LogKey::new(author(), 0, 1);

        assert!(store.get(&key).unwrap().is_absent());

        store.put(&key, Some(b"entry"), Some(b"payload")).unwrap();
        let record = store.get(&key).unwrap();
        assert_eq!(record.entry.as_deref(), Some(b"entry".as_slice()));
        assert_eq!(record.payload.as_deref(), Some(b"payload".as_slice()));

        store.delete(&key).unwrap();
        assert!(store.get(&key).unwrap().is_absent());

        // Idempotent.
        store.delete(&key).unwrap();
    }

    #[test]
    fn partial_records() {
        let (_tmp, store) = store();
        let key = LogKey::new(author(), 0, 1);

        store.put(&key, Some(b"entry"), None).unwrap();
        assert!(store.exists_part(&key, Part::Entry).unwrap());
        assert!(!store.exists_part(&key, Part::Payload).unwrap());

        store.put(&key, Some(b"entry"), Some(b"payload")).unwrap();
        assert!(store.exists_part(&key, Part::Payload).unwrap());
    }

    #[test]
    fn match_delete_by_scope() {
        let (_tmp, store) = store();
        let alice = author();
        let bob = author();

        for (who, log_id, seq) in [
            (alice, 0, 1),
            (alice, 0, 2),
            (alice, 1, 1),
            (bob, 0, 1),
            (bob, 3, 1),
        ] {
            store
                .put(&LogKey::new(who, log_id, seq), Some(b"e"), Some(b"p"))
                .unwrap();
        }

        // By (author, log_id).
        let removed = store
            .match_delete(&KeyPattern {
                author: Some(alice),
                log_id: Some(0),
            })
            .unwrap();
        assert_eq!(removed, 2);

        // By log_id alone.
        let removed = store
            .match_delete(&KeyPattern {
                author: None,
                log_id: Some(3),
            })
            .unwrap();
        assert_eq!(removed, 1);

        // By author alone.
        let removed = store
            .match_delete(&KeyPattern {
                author: Some(bob),
                log_id: None,
            })
            .unwrap();
        assert_eq!(removed, 1);

        assert_eq!(store.match_keys(&KeyPattern::default()).unwrap().len(), 1);
    }

    #[test]
    fn truncate_removes_everything() {
        let (_tmp, store) = store();
        let alice = author();

        for seq in 1..=5 {
            store
                .put(&LogKey::new(alice, 0, seq), Some(b"e"), Some(b"p"))
                .unwrap();
        }

        store.truncate().unwrap();
        assert!(store.match_keys(&KeyPattern::default()).unwrap().is_empty());
    }

    #[test]
    fn seq_nums_and_max() {
        let (_tmp, store) = store();
        let alice = author();

        for seq in [3u64, 1, 7] {
            store
                .put(&LogKey::new(alice, 2, seq), Some(b"e"), None)
                .unwrap();
        }

        assert_eq!(store.seq_nums(&alice, 2).unwrap(), vec![1, 3, 7]);
        assert_eq!(store.max_seq_num(&alice, 2).unwrap(), 7);
        assert_eq!(store.max_seq_num(&alice, 0).unwrap(), 0);
    }

    #[test]
    fn summaries() {
        let (_tmp, store) = store();
        let alice = author();
        let bob = author();

        for (who, log_id, seq) in [(alice, 0, 1), (alice, 0, 2), (bob, 5, 9)] {
            store
                .put(&LogKey::new(who, log_id, seq), Some(b"e"), None)
                .unwrap();
        }

        let summaries = store.log_summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.contains(&(alice, 0, 2)));
        assert!(summaries.contains(&(bob, 5, 9)));
        assert_eq!(store.authors().unwrap().len(), 2);
    }

    #[test]
    fn fold_sees_both_halves() {
        let (_tmp, store) = store();
        let alice = author();

        store
            .put(&LogKey::new(alice, 0, 1), Some(b"e1"), Some(b"p1"))
            .unwrap();
        store
            .put(&LogKey::new(alice, 0, 2), None, Some(b"p2"))
            .unwrap();

        let seen = store
            .fold(Vec::new(), |mut acc, key, record| {
                acc.push((key.seq_num, record.entry.is_some(), record.payload.is_some()));
                acc
            })
            .unwrap();

        assert_eq!(seen, vec![(1, true, true), (2, false, true)]);
    }

    #[test]
    fn survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("content.dets");
        let alice = author();

        {
            let store = ContentStore::open(&path).unwrap();
            store
                .put(&LogKey::new(alice, 0, 1), Some(b"entry"), Some(b"payload"))
                .unwrap();
        }

        let store = ContentStore::open(&path).unwrap();
        let record = store.get(&LogKey::new(alice, 0, 1)).unwrap();
        assert_eq!(record.entry.as_deref(), Some(b"entry".as_slice()));
    }
}
