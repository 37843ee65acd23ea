// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry validation against one clump's content store.
//!
//! Checks run in a fixed order and return on the first failure:
//! signature, payload hash, backlink, lipmaa link, then the certificate
//! pool chain. The store is only ever read.
//!
//! One failure is deliberately soft: a backlink whose referent is not in
//! the store is accepted. Under partial replication the direct
//! predecessor is routinely missing, while the lipmaa spine must be
//! present because it is what tip verification walks.

use grove_core::{decode_entry, lipmaa, Entry};
use grove_store::LogKey;

use crate::grove::Clump;
use crate::GroveError;

/// How much of an entry to check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Everything.
    Full,
    /// Link-target re-checks while walking a certificate pool. The
    /// payload hash is skipped: it concerns the target's own payload,
    /// which was verified when the target was stored.
    Chain,
}

/// Fully validates `entry` against the clump, certificate pool chain
/// included.
pub(crate) fn validate_entry(clump: &Clump, entry: &Entry) -> Result<(), GroveError> {
    check_entry(clump, entry, Mode::Full)?;

    let max = clump.content.max_seq_num(&entry.author, entry.log_id)?;
    for seq_num in lipmaa::cert_pool(entry.seq_num) {
        if seq_num > max {
            continue;
        }

        let key = LogKey::new(entry.author, entry.log_id, seq_num);
        let record = clump.content.get(&key)?;
        let bytes = record.entry.ok_or(GroveError::ChainBroken(seq_num))?;
        let (stored, _) =
            decode_entry(&bytes).map_err(|_| GroveError::ChainBroken(seq_num))?;

        check_entry(clump, &stored, Mode::Chain)?;
    }

    Ok(())
}

fn check_entry(clump: &Clump, entry: &Entry, mode: Mode) -> Result<(), GroveError> {
    // 1. Signature over the recomposed preamble.
    if !entry.author.verify(&entry.unsigned_bytes(), &entry.signature) {
        return Err(GroveError::InvalidSig);
    }

    // 2. Payload hash, when the payload half is at hand.
    if mode == Mode::Full {
        if let Some(payload) = &entry.payload {
            if payload.len() as u64 != entry.payload_size
                || entry.payload_hash.verify(payload).is_err()
            {
                return Err(GroveError::InvalidPayloadHash);
            }
        }
    }

    // 3. Backlink. A missing referent is accepted; see the module note.
    match (entry.seq_num, &entry.backlink) {
        (1, None) => {}
        (1, Some(_)) => return Err(GroveError::InvalidBacklink),
        (_, None) => return Err(GroveError::MissingBacklink),
        (seq_num, Some(link)) => {
            let key = LogKey::new(entry.author, entry.log_id, seq_num - 1);
            if let Some(prev_bytes) = clump.content.get(&key)?.entry {
                link.verify(&prev_bytes)
                    .map_err(|_| GroveError::InvalidBacklink)?;
            }
        }
    }

    // 4. Lipmaa link. Unlike the backlink, a required target must be in
    // the store.
    if lipmaa::is_lipmaa_required(entry.seq_num) {
        let link = entry
            .lipmaa_link
            .as_ref()
            .ok_or(GroveError::MissingLipmaa)?;

        let key = LogKey::new(entry.author, entry.log_id, lipmaa::linkseq(entry.seq_num));
        match clump.content.get(&key)?.entry {
            Some(target_bytes) => link
                .verify(&target_bytes)
                .map_err(|_| GroveError::InvalidLipmaa)?,
            None => return Err(GroveError::MissingLipmaa),
        }
    } else if entry.lipmaa_link.is_some() {
        return Err(GroveError::InvalidLipmaa);
    }

    Ok(())
}
