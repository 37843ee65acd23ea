// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base62 text form for raw byte strings.
//!
//! Public keys travel through user-facing surfaces as base62 text over the
//! alphabet `0-9A-Za-z`. Encoding treats the input as one big-endian
//! number; each leading zero byte maps to one leading `'0'` so that
//! decoding is an exact inverse. A 32-byte Ed25519 public key encodes to
//! at most 43 characters.

use thiserror::Error;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Encode bytes as base62 text.
pub fn encode(bytes: &[u8]) -> String {
    let zeros = bytes.iter().take_while(|byte| **byte == 0).count();

    // Base-62 digits of the remaining big-endian number, least
    // significant first.
    let mut digits: Vec<u8> = Vec::new();
    for &byte in &bytes[zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 62) as u8;
            carry /= 62;
        }
        while carry > 0 {
            digits.push((carry % 62) as u8);
            carry /= 62;
        }
    }

    let mut out = String::with_capacity(zeros + digits.len());
    for _ in 0..zeros {
        out.push('0');
    }
    for &digit in digits.iter().rev() {
        out.push(ALPHABET[digit as usize] as char);
    }
    out
}

/// Decode base62 text back into bytes.
pub fn decode(text: &str) -> Result<Vec<u8>, Base62Error> {
    let zeros = text.bytes().take_while(|c| *c == b'0').count();

    // Base-256 bytes of the remaining number, least significant first.
    let mut bytes: Vec<u8> = Vec::new();
    for c in text.bytes().skip(zeros) {
        let value = digit_value(c).ok_or(Base62Error::InvalidCharacter(c as char))?;
        let mut carry = value as u32;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 62;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let mut out = vec![0u8; zeros];
    out.extend(bytes.iter().rev());
    Ok(out)
}

fn digit_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'Z' => Some(c - b'A' + 10),
        b'a'..=b'z' => Some(c - b'a' + 36),
        _ => None,
    }
}

/// Error types for the base62 codec.
#[derive(Error, Debug)]
pub enum Base62Error {
    /// Character outside `0-9A-Za-z`.
    #[error("character {0:?} is not in the base62 alphabet")]
    InvalidCharacter(char),
}
