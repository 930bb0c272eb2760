//! Self-describing payload framing
//!
//! Both formats lead with the key id, so a receiver knows which window's key
//! to resolve before touching anything else.
//!
//! ```text
//! Encrypted: ┌──────────────┬────────────┬──────────────────────────┐
//!            │ key id (w)   │ nonce (24) │ ciphertext ‖ tag (n+16)  │
//!            └──────────────┴────────────┴──────────────────────────┘
//!
//! Signed:    ┌──────────────┬────────────┬──────────────────────────┐
//!            │ key id (w)   │ mac (64)   │ payload (n)              │
//!            └──────────────┴────────────┴──────────────────────────┘
//! ```
//!
//! `w` is the fixed width of the configured key id template.

use epochkms_crypto::{MAC_SIZE, NONCE_SIZE};

use crate::{error::KeyError, key_id::KeyId};

/// Borrowed view of an encrypted payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedFrame<'a> {
    /// Key id prefix (not yet validated)
    pub key_id: &'a str,
    /// `XChaCha20` nonce
    pub nonce: &'a [u8; NONCE_SIZE],
    /// Ciphertext with trailing tag
    pub sealed: &'a [u8],
}

/// Borrowed view of a signed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedFrame<'a> {
    /// Key id prefix (not yet validated)
    pub key_id: &'a str,
    /// HMAC-SHA-512 tag
    pub mac: &'a [u8; MAC_SIZE],
    /// The signed payload, unchanged
    pub payload: &'a [u8],
}

/// Frame an encrypted payload.
pub fn encode_encrypted(key_id: &KeyId, nonce: &[u8; NONCE_SIZE], sealed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key_id.as_bytes().len() + NONCE_SIZE + sealed.len());
    out.extend_from_slice(key_id.as_bytes());
    out.extend_from_slice(nonce);
    out.extend_from_slice(sealed);
    out
}

/// Split an encrypted payload into its parts.
///
/// # Errors
///
/// - `InvalidInput`: shorter than `id_width + 24`
/// - `MalformedId`: the id prefix is not UTF-8
pub fn decode_encrypted(data: &[u8], id_width: usize) -> Result<EncryptedFrame<'_>, KeyError> {
    let (key_id, rest) = split_key_id(data, id_width, NONCE_SIZE, "encrypted payload")?;
    let Some((nonce, sealed)) = rest.split_first_chunk::<NONCE_SIZE>() else {
        unreachable!("length checked against id width plus nonce size");
    };

    Ok(EncryptedFrame { key_id, nonce, sealed })
}

/// Frame a signed payload.
pub fn encode_signed(key_id: &KeyId, mac: &[u8; MAC_SIZE], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key_id.as_bytes().len() + MAC_SIZE + payload.len());
    out.extend_from_slice(key_id.as_bytes());
    out.extend_from_slice(mac);
    out.extend_from_slice(payload);
    out
}

/// Split a signed payload into its parts.
///
/// # Errors
///
/// - `InvalidInput`: shorter than `id_width + 64`
/// - `MalformedId`: the id prefix is not UTF-8
pub fn decode_signed(data: &[u8], id_width: usize) -> Result<SignedFrame<'_>, KeyError> {
    let (key_id, rest) = split_key_id(data, id_width, MAC_SIZE, "signed payload")?;
    let Some((mac, payload)) = rest.split_first_chunk::<MAC_SIZE>() else {
        unreachable!("length checked against id width plus mac size");
    };

    Ok(SignedFrame { key_id, mac, payload })
}

fn split_key_id<'a>(
    data: &'a [u8],
    id_width: usize,
    fixed_after: usize,
    what: &str,
) -> Result<(&'a str, &'a [u8]), KeyError> {
    let minimum = id_width + fixed_after;
    if data.len() < minimum {
        return Err(KeyError::InvalidInput {
            reason: format!("{what} is {} bytes, need at least {minimum}", data.len()),
        });
    }

    let (id, rest) = data.split_at(id_width);
    let id = std::str::from_utf8(id)
        .map_err(|_| KeyError::MalformedId { id: String::from_utf8_lossy(id).into_owned() })?;

    Ok((id, rest))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::key_id::KeyIdScheme;

    fn key_id() -> KeyId {
        let scheme =
            KeyIdScheme::new(Duration::from_secs(3600), Duration::from_secs(7200), "%Y%m%d_%H%M")
                .unwrap();
        scheme.current(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn encrypted_layout() {
        let framed = encode_encrypted(&key_id(), &[7; NONCE_SIZE], b"sealed");

        assert_eq!(&framed[..13], b"20250101_0000");
        assert_eq!(&framed[13..37], &[7; NONCE_SIZE]);
        assert_eq!(&framed[37..], b"sealed");

        let frame = decode_encrypted(&framed, 13).unwrap();
        assert_eq!(frame.key_id, "20250101_0000");
        assert_eq!(frame.nonce, &[7; NONCE_SIZE]);
        assert_eq!(frame.sealed, b"sealed");
    }

    #[test]
    fn signed_layout() {
        let framed = encode_signed(&key_id(), &[9; MAC_SIZE], b"payload");

        let frame = decode_signed(&framed, 13).unwrap();
        assert_eq!(frame.key_id, "20250101_0000");
        assert_eq!(frame.mac, &[9; MAC_SIZE]);
        assert_eq!(frame.payload, b"payload");
    }

    #[test]
    fn minimum_lengths_are_inclusive() {
        assert!(decode_encrypted(&[b'0'; 13 + NONCE_SIZE], 13).is_ok());
        assert!(matches!(
            decode_encrypted(&[b'0'; 13 + NONCE_SIZE - 1], 13),
            Err(KeyError::InvalidInput { .. })
        ));

        let signed = decode_signed(&[b'0'; 13 + MAC_SIZE], 13).unwrap();
        assert!(signed.payload.is_empty());
        assert!(matches!(decode_signed(&[], 13), Err(KeyError::InvalidInput { .. })));
    }

    #[test]
    fn non_utf8_id_is_malformed() {
        let mut data = vec![0xFF; 13];
        data.extend_from_slice(&[0; MAC_SIZE]);

        assert!(matches!(decode_signed(&data, 13), Err(KeyError::MalformedId { .. })));
    }
}
