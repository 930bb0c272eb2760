//! Message authentication using HMAC-SHA-512

use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::{error::CryptoError, material::KeyMaterial};

type HmacSha512 = Hmac<Sha512>;

/// HMAC-SHA-512 tag size (64 bytes)
pub const MAC_SIZE: usize = 64;

/// Compute the tag of `payload` under the signing half of `key`.
pub fn sign(key: &KeyMaterial, payload: &[u8]) -> [u8; MAC_SIZE] {
    let mut mac = keyed(key);
    mac.update(payload);

    let mut tag = [0u8; MAC_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}

/// Verify `tag` over `payload` in constant time.
///
/// # Errors
///
/// - `AuthenticationFailed`: tag mismatch or wrong tag length
pub fn verify(key: &KeyMaterial, payload: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
    let mut mac = keyed(key);
    mac.update(payload);
    mac.verify_slice(tag).map_err(|_| CryptoError::AuthenticationFailed)
}

fn keyed(key: &KeyMaterial) -> HmacSha512 {
    let Ok(mac) = HmacSha512::new_from_slice(key.signing_key()) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac
}
