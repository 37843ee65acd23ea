// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::entry::{DecodeError, Entry, StreamError, ENTRY_TAG, MIN_ENTRY_SIZE};
use crate::hash::{YamfHash, YAMF_HASH_SIZE};
use crate::identity::{PublicKey, Signature};
use crate::lipmaa::is_lipmaa_required;

const AUTHOR_SIZE: usize = 32;
const SIGNATURE_SIZE: usize = 64;

/// Decodes one entry from the front of `bytes`.
///
/// Returns the entry and the remaining bytes. Presence of the two link
/// fields is decided from the sequence number, never from looking at the
/// bytes. Payload handling follows the transport convention: when the
/// remainder after the signature is empty the payload travelled
/// separately and is marked absent; otherwise at least `payload_size`
/// bytes must follow and are consumed.
///
/// No cryptographic checks happen here.
pub fn decode_entry(bytes: &[u8]) -> Result<(Entry, &[u8]), DecodeError> {
    if bytes.len() < MIN_ENTRY_SIZE {
        return Err(DecodeError::Truncated);
    }

    let (tag, rest) = (bytes[0], &bytes[1..]);
    if tag != ENTRY_TAG {
        return Err(DecodeError::BadBinary(format!(
            "unsupported entry tag {tag:#04x}"
        )));
    }

    let (author_bytes, rest) = take(rest, AUTHOR_SIZE)?;
    let author = PublicKey::from_bytes(author_bytes)
        .map_err(|err| DecodeError::BadBinary(err.to_string()))?;

    let (log_id, rest) = take_varu64(rest)?;
    let (seq_num, rest) = take_varu64(rest)?;
    if seq_num == 0 {
        return Err(DecodeError::BadBinary("sequence number is zero".into()));
    }

    let (lipmaa_link, rest) = if is_lipmaa_required(seq_num) {
        let (hash, rest) = take_hash(rest)?;
        (Some(hash), rest)
    } else {
        (None, rest)
    };

    let (backlink, rest) = if seq_num > 1 {
        let (hash, rest) = take_hash(rest)?;
        (Some(hash), rest)
    } else {
        (None, rest)
    };

    let (payload_size, rest) = take_varu64(rest)?;
    let (payload_hash, rest) = take_hash(rest)?;

    let (signature_bytes, rest) = take(rest, SIGNATURE_SIZE)?;
    let signature = Signature::from_bytes(signature_bytes)
        .map_err(|err| DecodeError::BadBinary(err.to_string()))?;

    let (payload, rest) = if rest.is_empty() {
        (None, rest)
    } else if rest.len() as u64 >= payload_size {
        let (payload, rest) = take(rest, payload_size as usize)?;
        (Some(payload.to_vec()), rest)
    } else {
        return Err(DecodeError::Truncated);
    };

    let entry = Entry {
        author,
        log_id,
        seq_num,
        lipmaa_link,
        backlink,
        payload_size,
        payload_hash,
        signature,
        payload,
    };

    Ok((entry, rest))
}

/// Lazy iterator over a concatenation of encoded entries.
pub struct EntryStream<'a> {
    bytes: &'a [u8],
}

impl<'a> EntryStream<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl Iterator for EntryStream<'_> {
    type Item = Result<Entry, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes.is_empty() {
            return None;
        }

        match decode_entry(self.bytes) {
            Ok((entry, rest)) => {
                self.bytes = rest;
                Some(Ok(entry))
            }
            Err(err) => {
                self.bytes = &[];
                Some(Err(err))
            }
        }
    }
}

/// Decodes a concatenation of entries until the bytes are exhausted.
///
/// Any partial or malformed record ends the stream with an error that
/// carries the entries decoded up to that point.
pub fn decode_stream(bytes: &[u8]) -> Result<Vec<Entry>, StreamError> {
    let mut entries = Vec::new();

    for item in EntryStream::new(bytes) {
        match item {
            Ok(entry) => entries.push(entry),
            Err(source) => return Err(StreamError { entries, source }),
        }
    }

    Ok(entries)
}

fn take(bytes: &[u8], length: usize) -> Result<(&[u8], &[u8]), DecodeError> {
    if bytes.len() < length {
        return Err(DecodeError::Truncated);
    }
    Ok(bytes.split_at(length))
}

fn take_hash(bytes: &[u8]) -> Result<(YamfHash, &[u8]), DecodeError> {
    let (hash_bytes, rest) = take(bytes, YAMF_HASH_SIZE)?;
    let hash =
        YamfHash::try_from(hash_bytes).map_err(|err| DecodeError::BadBinary(err.to_string()))?;
    Ok((hash, rest))
}

fn take_varu64(bytes: &[u8]) -> Result<(u64, &[u8]), DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Truncated);
    }

    varu64::decode(bytes).map_err(|(err, _)| DecodeError::BadBinary(format!("{err:?}")))
}

#[cfg(test)]
mod tests {
    use super::{decode_entry, decode_stream};
    use crate::entry::{sign_entry, DecodeError};
    use crate::hash::YamfHash;
    use crate::identity::PrivateKey;

    #[test]
    fn round_trip_with_payload() {
        let private_key = PrivateKey::new();
        let entry = sign_entry(&private_key, b"Hello, grove!", 0, 1, None, None).unwrap();

        let bytes = entry.to_bytes();
        let (decoded, rest) = decode_entry(&bytes).unwrap();

        assert_eq!(decoded, entry);
        assert!(rest.is_empty());
    }

    #[test]
    fn round_trip_without_payload() {
        let private_key = PrivateKey::new();
        let entry = sign_entry(&private_key, b"detached", 3, 1, None, None).unwrap();

        let signed_bytes = entry.signed_bytes();
        let (decoded, rest) = decode_entry(&signed_bytes).unwrap();

        assert_eq!(decoded.payload, None);
        assert_eq!(decoded.payload_hash, entry.payload_hash);
        assert_eq!(decoded.payload_size, entry.payload_size);
        assert!(rest.is_empty());
    }

    #[test]
    fn encoding_length_law() {
        let private_key = PrivateKey::new();
        let entry = sign_entry(&private_key, b"sized", 0, 1, None, None).unwrap();

        assert_eq!(
            entry.unsigned_bytes().len() + 64 + entry.payload_size as usize,
            entry.to_bytes().len()
        );
    }

    #[test]
    fn author_only_binary_is_truncated() {
        assert!(matches!(
            decode_entry(&[0u8; 32]),
            Err(DecodeError::Truncated)
        ));
    }

    #[test]
    fn partial_payload_is_truncated() {
        let private_key = PrivateKey::new();
        let entry = sign_entry(&private_key, b"some payload", 0, 1, None, None).unwrap();

        let bytes = entry.to_bytes();
        assert!(matches!(
            decode_entry(&bytes[..bytes.len() - 3]),
            Err(DecodeError::Truncated)
        ));
    }

    #[test]
    fn unknown_tag() {
        let private_key = PrivateKey::new();
        let mut bytes = sign_entry(&private_key, b"x", 0, 1, None, None)
            .unwrap()
            .to_bytes();
        bytes[0] = 0x01;

        assert!(matches!(
            decode_entry(&bytes),
            Err(DecodeError::BadBinary(_))
        ));
    }

    #[test]
    fn stream_decoding() {
        let private_key = PrivateKey::new();
        let first = sign_entry(&private_key, b"one", 0, 1, None, None).unwrap();
        let second =
            sign_entry(&private_key, b"two", 0, 2, Some(first.hash()), None).unwrap();

        let mut bytes = first.to_bytes();
        bytes.extend(second.to_bytes());

        let entries = decode_stream(&bytes).unwrap();
        assert_eq!(entries, vec![first.clone(), second.clone()]);

        // A malformed tail surfaces the complete prefix inside the error.
        bytes.extend([0x00, 0x01, 0x02]);
        let err = decode_stream(&bytes).unwrap_err();
        assert_eq!(err.entries, vec![first, second]);
    }

    #[test]
    fn link_fields_round_trip() {
        let private_key = PrivateKey::new();
        let backlink = YamfHash::new(b"three");
        let lipmaa = YamfHash::new(b"one");
        let entry =
            sign_entry(&private_key, b"four", 0, 4, Some(backlink), Some(lipmaa)).unwrap();

        let (decoded, _) = decode_entry(&entry.to_bytes()).unwrap();
        assert_eq!(decoded.backlink, Some(backlink));
        assert_eq!(decoded.lipmaa_link, Some(lipmaa));
    }
}
