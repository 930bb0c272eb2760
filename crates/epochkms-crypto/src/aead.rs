//! Authenticated encryption using `XChaCha20-Poly1305`
//!
//! All functions are pure: the nonce is supplied by the caller. Production
//! callers draw it from a CSPRNG; tests pin it.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};

use crate::{error::CryptoError, material::KeyMaterial};

/// `XChaCha20` nonce size (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under the AEAD half of `key`.
///
/// Returns ciphertext with the 16-byte tag appended. The nonce is not
/// included; framing is the caller's concern.
///
/// # Security
///
/// - Reusing a nonce under the same key breaks confidentiality of both
///   messages. Callers MUST use fresh random nonces in production.
///
/// # Errors
///
/// - `SealFailed`: plaintext exceeds the cipher's length limit
pub fn seal(
    key: &KeyMaterial,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.encryption_key().into());

    cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::SealFailed { reason: e.to_string() })
}

/// Decrypt `ciphertext` (with trailing tag) under the AEAD half of `key`.
///
/// # Errors
///
/// - `AuthenticationFailed`: tag mismatch, wrong key, or input shorter than
///   a tag
pub fn open(
    key: &KeyMaterial,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }

    let cipher = XChaCha20Poly1305::new(key.encryption_key().into());

    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}
