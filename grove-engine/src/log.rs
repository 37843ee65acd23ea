// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log operations: appending, retrieval, compaction and purging.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use grove_core::{decode_entry, lipmaa, sign_entry, Entry, YamfHash};
use grove_store::{KeyPattern, LogKey};

use crate::grove::Clump;
use crate::validate::validate_entry;
use crate::{Grove, GroveError, Options, Seq};

impl Grove {
    /// Appends `payload` to the log of `alias`, returning the new entry.
    ///
    /// The new entry links back to the stored bytes of its predecessor
    /// and, when the lipmaa position differs, to the stored bytes of the
    /// entry there. Both halves of the record land atomically.
    pub fn append(
        &self,
        payload: &[u8],
        alias: &str,
        opts: &Options,
    ) -> Result<Entry, GroveError> {
        let clump = self.clump_or_create(&opts.clump_id)?;
        let private_key = self.identities.private_key(alias)?;
        let author = private_key.public_key();

        let _guard = clump.write_lock.lock().expect("clump write lock poisoned");

        let prev = clump.content.max_seq_num(&author, opts.log_id)?;
        let seq_num = prev + 1;

        let backlink = if prev == 0 {
            None
        } else {
            Some(self.link_hash(&clump, &LogKey::new(author, opts.log_id, prev))?)
        };

        let lipmaa_link = if lipmaa::is_lipmaa_required(seq_num) {
            let target = LogKey::new(author, opts.log_id, lipmaa::linkseq(seq_num));
            Some(self.link_hash(&clump, &target)?)
        } else {
            None
        };

        let entry = sign_entry(
            &private_key,
            payload,
            opts.log_id,
            seq_num,
            backlink,
            lipmaa_link,
        )?;

        let key = LogKey::new(author, opts.log_id, seq_num);
        clump
            .content
            .put(&key, Some(&entry.signed_bytes()), Some(payload))?;
        self.touch_content(&clump)?;

        debug!(author = %author, log_id = opts.log_id, seq_num, clump = %opts.clump_id, "appended entry");
        Ok(entry)
    }

    /// Single entry of a log, by sequence number or `Seq::Max`.
    pub fn entry(
        &self,
        author: &str,
        seq: impl Into<Seq>,
        opts: &Options,
    ) -> Result<Entry, GroveError> {
        let clump = self.clump(&opts.clump_id)?;
        let author = self.resolve_key(author)?;
        let seq_num = self.resolve_seq(&clump, &author, seq.into(), opts.log_id)?;

        let key = LogKey::new(author, opts.log_id, seq_num);
        let entry = self
            .try_entry(&clump, &key)?
            .ok_or(GroveError::Missing)?;

        if opts.revalidate {
            validate_entry(&clump, &entry)?;
        }

        Ok(entry)
    }

    /// Like [`Grove::entry`] but returns the wire bytes: the signed
    /// entry followed by its payload when one is stored.
    pub fn entry_bytes(
        &self,
        author: &str,
        seq: impl Into<Seq>,
        opts: &Options,
    ) -> Result<Vec<u8>, GroveError> {
        Ok(self.entry(author, seq, opts)?.to_bytes())
    }

    /// Certificate-pool path of a log position, ascending and filtered
    /// to entries actually present.
    pub fn log_at(
        &self,
        author: &str,
        seq: impl Into<Seq>,
        opts: &Options,
    ) -> Result<Vec<Entry>, GroveError> {
        let clump = self.clump(&opts.clump_id)?;
        let author = self.resolve_key(author)?;
        let max = clump.content.max_seq_num(&author, opts.log_id)?;

        let seq_num = match seq.into() {
            Seq::Num(value) => value,
            Seq::Max => max,
        };

        let mut entries = Vec::new();
        for pool_seq in lipmaa::cert_pool(seq_num).into_iter().rev() {
            if pool_seq > max {
                continue;
            }
            let key = LogKey::new(author, opts.log_id, pool_seq);
            if let Some(entry) = self.try_entry(&clump, &key)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    /// Every present entry with sequence number in `[first, last]`.
    ///
    /// `first` must be at least 2: the first entry of a log has no link
    /// into anything earlier, so a "range" starting there is a
    /// `full_log` read.
    pub fn log_range(
        &self,
        author: &str,
        first: u64,
        last: u64,
        opts: &Options,
    ) -> Result<Vec<Entry>, GroveError> {
        if first < 2 || last < first {
            return Err(GroveError::BadRange);
        }

        let clump = self.clump(&opts.clump_id)?;
        let author = self.resolve_key(author)?;

        let mut entries = Vec::new();
        for seq_num in self.stored_seq_nums(&clump, &author, opts.log_id)? {
            if seq_num < first || seq_num > last {
                continue;
            }
            let key = LogKey::new(author, opts.log_id, seq_num);
            if let Some(entry) = self.try_entry(&clump, &key)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    /// Every present entry of a log, ascending by sequence number.
    pub fn full_log(&self, author: &str, opts: &Options) -> Result<Vec<Entry>, GroveError> {
        let clump = self.clump(&opts.clump_id)?;
        let author = self.resolve_key(author)?;

        let mut entries = Vec::new();
        for seq_num in self.stored_seq_nums(&clump, &author, opts.log_id)? {
            let key = LogKey::new(author, opts.log_id, seq_num);
            if let Some(entry) = self.try_entry(&clump, &key)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    /// Largest stored sequence number of a log, 0 when empty.
    pub fn max_seq_num(&self, author: &str, opts: &Options) -> Result<u64, GroveError> {
        let clump = self.clump(&opts.clump_id)?;
        let author = self.resolve_key(author)?;
        Ok(clump.content.max_seq_num(&author, opts.log_id)?)
    }

    /// Every stored sequence number of a log, ascending.
    pub fn seq_nums(&self, author: &str, opts: &Options) -> Result<Vec<u64>, GroveError> {
        let clump = self.clump(&opts.clump_id)?;
        let author = self.resolve_key(author)?;
        clump
            .content
            .seq_nums(&author, opts.log_id)
            .map_err(GroveError::from)
    }

    /// Certificate pool of a log position, descending, filtered to
    /// sequence numbers stored and within the log.
    pub fn certificate_pool(
        &self,
        author: &str,
        seq: impl Into<Seq>,
        opts: &Options,
    ) -> Result<Vec<u64>, GroveError> {
        let clump = self.clump(&opts.clump_id)?;
        let author = self.resolve_key(author)?;
        let max = clump.content.max_seq_num(&author, opts.log_id)?;

        let seq_num = match seq.into() {
            Seq::Num(value) => value,
            Seq::Max => max,
        };

        let stored: BTreeSet<u64> = clump
            .content
            .seq_nums(&author, opts.log_id)?
            .into_iter()
            .collect();

        Ok(lipmaa::cert_pool(seq_num)
            .into_iter()
            .filter(|pool_seq| *pool_seq <= max && stored.contains(pool_seq))
            .collect())
    }

    /// Deletes every entry the tip's certificate pool does not need and
    /// returns the deleted sequence numbers, ascending. Idempotent.
    pub fn compact(&self, author: &str, opts: &Options) -> Result<Vec<u64>, GroveError> {
        let clump = self.clump(&opts.clump_id)?;
        let author = self.resolve_key(author)?;

        let _guard = clump.write_lock.lock().expect("clump write lock poisoned");

        let seq_nums = clump.content.seq_nums(&author, opts.log_id)?;
        let Some(&tip) = seq_nums.last() else {
            return Ok(Vec::new());
        };

        let keep: BTreeSet<u64> = lipmaa::cert_pool(tip).into_iter().collect();

        let mut deleted = Vec::new();
        for seq_num in seq_nums {
            if keep.contains(&seq_num) {
                continue;
            }
            clump
                .content
                .delete(&LogKey::new(author, opts.log_id, seq_num))?;
            deleted.push(seq_num);
        }

        if !deleted.is_empty() {
            self.touch_content(&clump)?;
            info!(author = %author, log_id = opts.log_id, tip, removed = deleted.len(), "compacted log");
        }

        Ok(deleted)
    }

    /// Removes stored content by scope and reports what remains.
    ///
    /// `None` stands for "all": both `None` truncates the clump's
    /// content, otherwise matching records are deleted by author, by
    /// log id, or by the exact pair.
    pub fn purge(
        &self,
        author: Option<&str>,
        log_id: Option<u64>,
        clump_id: &str,
    ) -> Result<Vec<(String, u64, u64)>, GroveError> {
        let clump = self.clump(clump_id)?;

        let author = match author {
            Some(reference) => Some(self.resolve_key(reference)?),
            None => None,
        };

        match (author, log_id) {
            (None, None) => {
                clump.content.truncate()?;
                info!(clump = clump_id, "truncated content");
            }
            (author, log_id) => {
                let removed = clump.content.match_delete(&KeyPattern { author, log_id })?;
                info!(clump = clump_id, removed, "purged content");
            }
        }

        self.touch_content(&clump)?;

        self.stored_info(clump_id)
    }

    /// `(author, log_id, max_seq_num)` of every stored log, sorted.
    pub fn stored_info(&self, clump_id: &str) -> Result<Vec<(String, u64, u64)>, GroveError> {
        let clump = self.clump(clump_id)?;

        let mut info: Vec<(String, u64, u64)> = clump
            .content
            .log_summaries()?
            .into_iter()
            .map(|(author, log_id, max)| (author.to_base62(), log_id, max))
            .collect();
        info.sort();

        Ok(info)
    }

    /// Every stored record key as `(author, log_id, seq_num)`, sorted.
    pub fn all_entries(&self, clump_id: &str) -> Result<Vec<(String, u64, u64)>, GroveError> {
        let clump = self.clump(clump_id)?;

        let mut keys: Vec<(String, u64, u64)> = clump
            .content
            .match_keys(&KeyPattern::default())?
            .into_iter()
            .map(|key| (key.author.to_base62(), key.log_id, key.seq_num))
            .collect();
        keys.sort();

        Ok(keys)
    }

    // ------------------------------------------------------------------
    // Shared retrieval plumbing
    // ------------------------------------------------------------------

    /// Fetches and decodes one record, joining both halves.
    ///
    /// Stored entry bytes that no longer decode are treated as local
    /// corruption: the record is deleted and reported absent. Deleting
    /// is idempotent, so concurrent readers at worst repeat it.
    pub(crate) fn try_entry(
        &self,
        clump: &Arc<Clump>,
        key: &LogKey,
    ) -> Result<Option<Entry>, GroveError> {
        let record = clump.content.get(key)?;

        let Some(entry_bytes) = record.entry else {
            return Ok(None);
        };

        let entry = match decode_entry(&entry_bytes) {
            Ok((entry, _)) => entry,
            Err(err) => {
                warn!(
                    author = %key.author,
                    log_id = key.log_id,
                    seq_num = key.seq_num,
                    error = %err,
                    "stored entry bytes no longer decode, dropping record"
                );
                clump.content.delete(key)?;
                self.touch_content(clump)?;
                return Ok(None);
            }
        };

        Ok(Some(Entry {
            payload: record.payload,
            ..entry
        }))
    }

    fn resolve_seq(
        &self,
        clump: &Arc<Clump>,
        author: &grove_core::PublicKey,
        seq: Seq,
        log_id: u64,
    ) -> Result<u64, GroveError> {
        match seq {
            Seq::Num(value) => Ok(value),
            Seq::Max => {
                let max = clump.content.max_seq_num(author, log_id)?;
                if max == 0 {
                    return Err(GroveError::Missing);
                }
                Ok(max)
            }
        }
    }

    fn stored_seq_nums(
        &self,
        clump: &Arc<Clump>,
        author: &grove_core::PublicKey,
        log_id: u64,
    ) -> Result<Vec<u64>, GroveError> {
        clump
            .content
            .seq_nums(author, log_id)
            .map_err(GroveError::from)
    }

    fn link_hash(&self, clump: &Arc<Clump>, key: &LogKey) -> Result<YamfHash, GroveError> {
        let record = clump.content.get(key)?;
        let bytes = record.entry.ok_or(GroveError::Missing)?;
        Ok(YamfHash::new(&bytes))
    }
}
