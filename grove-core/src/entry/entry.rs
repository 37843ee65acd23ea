// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::entry::EntryError;
use crate::hash::YamfHash;
use crate::identity::{PublicKey, Signature};
use crate::lipmaa::is_lipmaa_required;

/// Reserved leading byte of every encoded entry.
pub const ENTRY_TAG: u8 = 0x00;

/// Smallest conceivable encoding: tag byte plus author key. Anything
/// shorter is rejected as truncated before field parsing starts.
pub const MIN_ENTRY_SIZE: usize = 33;

/// Entry of an append-only log.
///
/// The payload is carried separately from the signed preamble so it can
/// be transported (or deleted) independently; `payload: None` marks a
/// record whose bytes travelled without their payload half.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Public key that signed this entry.
    pub author: PublicKey,

    /// Log of this author the entry belongs to.
    pub log_id: u64,

    /// Position in the log, starting at 1.
    pub seq_num: u64,

    /// Hash of the entry at `linkseq(seq_num)`. Present exactly when
    /// that position differs from the direct predecessor.
    pub lipmaa_link: Option<YamfHash>,

    /// Hash of the direct predecessor. Absent only for the first entry.
    pub backlink: Option<YamfHash>,

    /// Byte length of the payload.
    pub payload_size: u64,

    /// Hash of the payload.
    pub payload_hash: YamfHash,

    /// Signature over the preamble bytes.
    pub signature: Signature,

    /// Payload bytes, when transported alongside the entry.
    pub payload: Option<Vec<u8>>,
}

impl Entry {
    /// Checks the structural link rules for this sequence number.
    ///
    /// The first entry carries no links; every later entry carries a
    /// backlink and, when `linkseq` does not point at the predecessor, a
    /// lipmaa link.
    pub fn verify_links(&self) -> Result<(), EntryError> {
        if self.seq_num == 0 {
            return Err(EntryError::SeqNumZero);
        }

        let required = is_lipmaa_required(self.seq_num);
        match (
            self.seq_num == 1,
            self.backlink.is_some(),
            self.lipmaa_link.is_some(),
            required,
        ) {
            (true, false, false, _) => Ok(()),
            (false, true, false, false) => Ok(()),
            (false, true, true, true) => Ok(()),
            (_, _, _, _) => Err(EntryError::InvalidLinks),
        }
    }

    /// Preamble bytes, the exact domain of the signature.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        preamble_bytes(
            &self.author,
            self.log_id,
            self.seq_num,
            self.lipmaa_link.as_ref(),
            self.backlink.as_ref(),
            self.payload_size,
            &self.payload_hash,
        )
    }

    /// Preamble plus signature: the stored "entry half" and the hash
    /// target of back- and lipmaa links.
    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut out = self.unsigned_bytes();
        out.extend_from_slice(&self.signature.to_bytes());
        out
    }

    /// Full wire encoding: signed bytes followed by the payload when it
    /// is present.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.signed_bytes();
        if let Some(payload) = &self.payload {
            out.extend_from_slice(payload);
        }
        out
    }

    /// Hash other entries link to this one by.
    pub fn hash(&self) -> YamfHash {
        YamfHash::new(self.signed_bytes())
    }
}

/// Composes the signature domain from loose fields.
///
/// Absent optional links contribute zero bytes.
pub(crate) fn preamble_bytes(
    author: &PublicKey,
    log_id: u64,
    seq_num: u64,
    lipmaa_link: Option<&YamfHash>,
    backlink: Option<&YamfHash>,
    payload_size: u64,
    payload_hash: &YamfHash,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    out.push(ENTRY_TAG);
    out.extend_from_slice(&author.to_bytes());
    push_varu64(&mut out, log_id);
    push_varu64(&mut out, seq_num);
    if let Some(link) = lipmaa_link {
        out.extend_from_slice(link.as_bytes());
    }
    if let Some(link) = backlink {
        out.extend_from_slice(link.as_bytes());
    }
    push_varu64(&mut out, payload_size);
    out.extend_from_slice(payload_hash.as_bytes());
    out
}

pub(crate) fn push_varu64(out: &mut Vec<u8>, value: u64) {
    let length = varu64::encoding_length(value);
    let start = out.len();
    out.resize(start + length, 0);
    varu64::encode(value, &mut out[start..]);
}
