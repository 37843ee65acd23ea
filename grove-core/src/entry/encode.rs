// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::entry::entry::preamble_bytes;
use crate::entry::{Entry, EntryError};
use crate::hash::YamfHash;
use crate::identity::PrivateKey;

/// Builds and signs a new entry over `payload`.
///
/// The caller supplies the link hashes it resolved from its store;
/// their presence is checked against the sequence number before signing.
///
/// ## Example
///
/// ```
/// use grove_core::{sign_entry, PrivateKey};
///
/// let private_key = PrivateKey::new();
/// let entry = sign_entry(&private_key, b"Hello, grove!", 0, 1, None, None).unwrap();
///
/// assert_eq!(entry.seq_num, 1);
/// assert!(entry.author.verify(&entry.unsigned_bytes(), &entry.signature));
/// ```
pub fn sign_entry(
    private_key: &PrivateKey,
    payload: &[u8],
    log_id: u64,
    seq_num: u64,
    backlink: Option<YamfHash>,
    lipmaa_link: Option<YamfHash>,
) -> Result<Entry, EntryError> {
    let author = private_key.public_key();
    let payload_size = payload.len() as u64;
    let payload_hash = YamfHash::new(payload);

    let preamble = preamble_bytes(
        &author,
        log_id,
        seq_num,
        lipmaa_link.as_ref(),
        backlink.as_ref(),
        payload_size,
        &payload_hash,
    );
    let signature = private_key.sign(&preamble);

    let entry = Entry {
        author,
        log_id,
        seq_num,
        lipmaa_link,
        backlink,
        payload_size,
        payload_hash,
        signature,
        payload: Some(payload.to_vec()),
    };
    entry.verify_links()?;

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::sign_entry;
    use crate::entry::EntryError;
    use crate::hash::YamfHash;
    use crate::identity::PrivateKey;

    #[test]
    fn first_entry_has_no_links() {
        let private_key = PrivateKey::new();

        assert!(sign_entry(&private_key, b"one", 0, 1, None, None).is_ok());

        let link = YamfHash::new(b"bogus");
        assert!(matches!(
            sign_entry(&private_key, b"one", 0, 1, Some(link), None),
            Err(EntryError::InvalidLinks)
        ));
    }

    #[test]
    fn later_entries_need_backlinks() {
        let private_key = PrivateKey::new();
        let first = sign_entry(&private_key, b"one", 0, 1, None, None).unwrap();

        // Sequence number 2 links back only.
        assert!(sign_entry(&private_key, b"two", 0, 2, Some(first.hash()), None).is_ok());
        assert!(matches!(
            sign_entry(&private_key, b"two", 0, 2, None, None),
            Err(EntryError::InvalidLinks)
        ));

        // Sequence number 4 also carries the lipmaa link to entry 1.
        let backlink = YamfHash::new(b"three");
        assert!(
            sign_entry(&private_key, b"four", 0, 4, Some(backlink), Some(first.hash())).is_ok()
        );
        assert!(matches!(
            sign_entry(&private_key, b"four", 0, 4, Some(backlink), None),
            Err(EntryError::InvalidLinks)
        ));
    }

    #[test]
    fn signs_over_preamble() {
        let private_key = PrivateKey::new();
        let entry = sign_entry(&private_key, b"payload", 7, 1, None, None).unwrap();

        assert_eq!(entry.log_id, 7);
        assert_eq!(entry.payload_size, 7);
        assert_eq!(entry.payload.as_deref(), Some(b"payload".as_slice()));
        assert!(entry
            .author
            .verify(&entry.unsigned_bytes(), &entry.signature));
    }
}
