// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cached change tokens of one clump.
//!
//! The engine derives a short digest over a source table and parks it
//! here; any mutation of the source invalidates the cache and the next
//! read recomputes. The token only answers "did anything change", it is
//! not a binding commitment.

use std::path::Path;

use redb::{Database, TableDefinition};

use crate::error::StoreError;

const STATUS: TableDefinition<&str, &str> = TableDefinition::new("status");

/// File name of the status database inside a clump directory.
pub const STATUS_FILE: &str = "status.dets";

/// Which source table a token covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    /// The clump's content store.
    Content,
    /// The spool-global identity store.
    Identity,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Content => "content",
            StatusKind::Identity => "identity",
        }
    }
}

/// Change-token cache of one clump.
pub struct StatusStore {
    db: Database,
}

impl StatusStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        let txn = db.begin_write()?;
        {
            txn.open_table(STATUS)?;
        }
        txn.commit()?;

        Ok(Self { db })
    }

    /// Cached token, if the source has not been touched since it was set.
    pub fn cached(&self, kind: StatusKind) -> Result<Option<String>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(STATUS)?;
        Ok(table
            .get(kind.as_str())?
            .map(|guard| guard.value().to_string()))
    }

    /// Parks a freshly computed token.
    pub fn set(&self, kind: StatusKind, digest: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(STATUS)?;
            table.insert(kind.as_str(), digest)?;
        }
        txn.commit()?;

        Ok(())
    }

    /// Drops the cached token after a source mutation. Idempotent.
    pub fn invalidate(&self, kind: StatusKind) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(STATUS)?;
            table.remove(kind.as_str())?;
        }
        txn.commit()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{StatusKind, StatusStore};

    #[test]
    fn cache_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let store = StatusStore::open(tmp.path().join("status.dets")).unwrap();

        assert_eq!(store.cached(StatusKind::Content).unwrap(), None);

        store.set(StatusKind::Content, "token").unwrap();
        assert_eq!(
            store.cached(StatusKind::Content).unwrap(),
            Some("token".to_string())
        );
        assert_eq!(store.cached(StatusKind::Identity).unwrap(), None);

        store.invalidate(StatusKind::Content).unwrap();
        assert_eq!(store.cached(StatusKind::Content).unwrap(), None);

        // Idempotent.
        store.invalidate(StatusKind::Content).unwrap();
    }
}
