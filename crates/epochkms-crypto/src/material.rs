//! Key material for one rotation window
//!
//! # Security Properties
//!
//! - Disjoint sub-keys: the encryption and signing halves never overlap
//! - Immutability: bytes are fixed at construction
//! - Hygiene: bytes are overwritten on drop and never printed

use std::fmt;

use zeroize::Zeroize;

use crate::error::CryptoError;

/// Total size of one key material block.
pub const KEY_MATERIAL_SIZE: usize = 96;

/// Size of the AEAD sub-key (bytes `[0, 32)`).
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// Size of the HMAC-SHA-512 sub-key (bytes `[32, 96)`).
pub const SIGNING_KEY_SIZE: usize = 64;

/// 96 bytes of symmetric key material.
///
/// Generated once per rotation window and shared by every process that
/// resolves the same key id.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    bytes: [u8; KEY_MATERIAL_SIZE],
}

impl KeyMaterial {
    /// Wrap a fully generated block.
    pub fn from_bytes(bytes: [u8; KEY_MATERIAL_SIZE]) -> Self {
        Self { bytes }
    }

    /// Copy a block out of a byte slice, e.g. one read back from storage.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: slice is not exactly [`KEY_MATERIAL_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let Ok(block) = <[u8; KEY_MATERIAL_SIZE]>::try_from(bytes) else {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_MATERIAL_SIZE,
                actual: bytes.len(),
            });
        };
        Ok(Self { bytes: block })
    }

    /// Raw bytes, for persisting to a key store.
    pub fn as_bytes(&self) -> &[u8; KEY_MATERIAL_SIZE] {
        &self.bytes
    }

    /// AEAD sub-key.
    pub fn encryption_key(&self) -> &[u8; ENCRYPTION_KEY_SIZE] {
        let Some(key) = self.bytes.first_chunk::<ENCRYPTION_KEY_SIZE>() else {
            unreachable!("96-byte block always holds a 32-byte prefix");
        };
        key
    }

    /// HMAC sub-key.
    pub fn signing_key(&self) -> &[u8; SIGNING_KEY_SIZE] {
        let Some(key) = self.bytes.last_chunk::<SIGNING_KEY_SIZE>() else {
            unreachable!("96-byte block always holds a 64-byte suffix");
        };
        key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial").field("bytes", &"<redacted>").finish()
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_block() -> [u8; KEY_MATERIAL_SIZE] {
        let mut block = [0u8; KEY_MATERIAL_SIZE];
        for (i, byte) in block.iter_mut().enumerate() {
            *byte = i as u8;
        }
        block
    }

    #[test]
    fn sub_keys_are_disjoint_halves() {
        let material = KeyMaterial::from_bytes(counting_block());

        assert_eq!(material.encryption_key()[0], 0);
        assert_eq!(material.encryption_key()[31], 31);
        assert_eq!(material.signing_key()[0], 32);
        assert_eq!(material.signing_key()[63], 95);
    }

    #[test]
    fn from_slice_accepts_exact_length() {
        let block = counting_block();
        let material = KeyMaterial::from_slice(&block).unwrap();
        assert_eq!(material.as_bytes(), &block);
    }

    #[test]
    fn from_slice_rejects_short_input() {
        let result = KeyMaterial::from_slice(&[0u8; 95]);
        assert_eq!(result, Err(CryptoError::InvalidKeyLength { expected: 96, actual: 95 }));
    }

    #[test]
    fn from_slice_rejects_long_input() {
        let result = KeyMaterial::from_slice(&[0u8; 97]);
        assert!(matches!(result, Err(CryptoError::InvalidKeyLength { actual: 97, .. })));
    }

    #[test]
    fn debug_output_is_redacted() {
        let material = KeyMaterial::from_bytes([0xAB; KEY_MATERIAL_SIZE]);
        let printed = format!("{material:?}");

        assert!(printed.contains("redacted"));
        assert!(!printed.contains("171"), "raw byte values must not leak");
        assert!(!printed.to_lowercase().contains("ab, "));
    }
}
