// SPDX-License-Identifier: MIT OR Apache-2.0

//! Block surface of a clump.
//!
//! Blocking names an author, a log id, or an exact `(author, log_id)`
//! pair. Blocked content cannot be stored and blocking a specifier
//! purges whatever already matches it. Specifiers are independent:
//! removing an author-wide block leaves a narrower pair block active.

use tracing::info;

use grove_core::PublicKey;
use grove_store::{BlockSpec, KeyPattern};

use crate::{Grove, GroveError};

/// Caller-facing block specifier; author references are resolved like
/// everywhere else (alias, base62, raw, `~prefix`).
#[derive(Clone, Debug)]
pub enum BlockTarget {
    Author(String),
    Log(u64),
    AuthorLog(String, u64),
}

impl Grove {
    /// Adds a block and purges matching content from the clump.
    ///
    /// Authors owned by the identity store cannot be blocked. Idempotent
    /// for a specifier already present. Returns the full block list.
    pub fn block(
        &self,
        target: BlockTarget,
        clump_id: &str,
    ) -> Result<Vec<BlockSpec>, GroveError> {
        let clump = self.clump(clump_id)?;
        let spec = self.resolve_target(target)?;

        if let Some(author) = spec.author() {
            if self.identities.owns(&author)?.is_some() {
                return Err(GroveError::BlockedLocalIdentity);
            }
        }

        if clump.metadata.insert(&spec)? {
            let pattern = block_pattern(&spec);
            let removed = clump.content.match_delete(&pattern)?;
            if removed > 0 {
                self.touch_content(&clump)?;
            }
            info!(clump = clump_id, ?spec, removed, "blocked");
        }

        self.blocks(clump_id)
    }

    /// Removes exactly the given specifier; absent specifiers are a
    /// no-op. Returns the full block list.
    pub fn unblock(
        &self,
        target: BlockTarget,
        clump_id: &str,
    ) -> Result<Vec<BlockSpec>, GroveError> {
        let clump = self.clump(clump_id)?;
        let spec = self.resolve_target(target)?;

        if clump.metadata.remove(&spec)? {
            info!(clump = clump_id, ?spec, "unblocked");
        }

        self.blocks(clump_id)
    }

    /// Whether a specifier is effectively blocked.
    ///
    /// A pair target also matches through its author-wide or log-wide
    /// cover; plain author and log targets check exact membership.
    pub fn is_blocked(&self, target: BlockTarget, clump_id: &str) -> Result<bool, GroveError> {
        let clump = self.clump(clump_id)?;

        match self.resolve_target(target)? {
            BlockSpec::Author(author) => {
                Ok(clump.metadata.contains(&BlockSpec::Author(author))?)
            }
            BlockSpec::Log(log_id) => Ok(clump.metadata.contains(&BlockSpec::Log(log_id))?),
            BlockSpec::AuthorLog(author, log_id) => {
                Ok(clump.metadata.is_blocked(&author, log_id)?)
            }
        }
    }

    /// Every active specifier, sorted.
    pub fn blocks(&self, clump_id: &str) -> Result<Vec<BlockSpec>, GroveError> {
        let clump = self.clump(clump_id)?;
        Ok(clump.metadata.list()?)
    }

    /// Drops every triple matched by an active block, preserving input
    /// order.
    pub fn filter_unblocked(
        &self,
        triples: &[(String, u64, u64)],
        clump_id: &str,
    ) -> Result<Vec<(String, u64, u64)>, GroveError> {
        let clump = self.clump(clump_id)?;

        let mut out = Vec::new();
        for triple in triples {
            let author = PublicKey::from_base62(&triple.0)?;
            if !clump.metadata.is_blocked(&author, triple.1)? {
                out.push(triple.clone());
            }
        }

        Ok(out)
    }

    /// Whether a stored entry at this key would be refused.
    pub(crate) fn refuses(
        &self,
        clump: &crate::grove::Clump,
        author: &PublicKey,
        log_id: u64,
    ) -> Result<bool, GroveError> {
        Ok(clump.metadata.is_blocked(author, log_id)?)
    }

    fn resolve_target(&self, target: BlockTarget) -> Result<BlockSpec, GroveError> {
        Ok(match target {
            BlockTarget::Author(reference) => BlockSpec::Author(self.resolve_key(&reference)?),
            BlockTarget::Log(log_id) => BlockSpec::Log(log_id),
            BlockTarget::AuthorLog(reference, log_id) => {
                BlockSpec::AuthorLog(self.resolve_key(&reference)?, log_id)
            }
        })
    }
}

fn block_pattern(spec: &BlockSpec) -> KeyPattern {
    match spec {
        BlockSpec::Author(author) => KeyPattern {
            author: Some(*author),
            log_id: None,
        },
        BlockSpec::Log(log_id) => KeyPattern {
            author: None,
            log_id: Some(*log_id),
        },
        BlockSpec::AuthorLog(author, log_id) => KeyPattern {
            author: Some(*author),
            log_id: Some(*log_id),
        },
    }
}
