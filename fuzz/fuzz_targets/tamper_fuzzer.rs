//! Fuzz target for tamper evidence
//!
//! Protects a payload, applies arbitrary bit flips, and checks that any
//! change to the bytes is rejected while an unchanged payload still opens.
//!
//! # Invariants
//!
//! - Modified ciphertext never decrypts
//! - Modified signed payloads never verify
//! - Unmodified payloads round-trip

#![no_main]

use arbitrary::Arbitrary;
use epochkms_core::{Kms, KmsConfig, MemoryStore};
use epochkms_harness::SimEnv;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    payload: Vec<u8>,
    flips: Vec<(u16, u8)>,
}

fn flip(data: &[u8], flips: &[(u16, u8)]) -> Vec<u8> {
    let mut out = data.to_vec();
    if out.is_empty() {
        return out;
    }
    for &(position, bit) in flips {
        let at = usize::from(position) % out.len();
        out[at] ^= 1 << (bit % 8);
    }
    out
}

fuzz_target!(|input: Input| {
    let Ok(kms) = Kms::new(MemoryStore::new(), SimEnv::with_seed(1), &KmsConfig::default()) else {
        return;
    };
    let (Ok(sealed), Ok(signed)) = (kms.encrypt(&input.payload), kms.sign(&input.payload)) else {
        return;
    };

    let tampered = flip(&sealed, &input.flips);
    match kms.decrypt(&tampered) {
        Ok(plaintext) => {
            assert_eq!(tampered, sealed, "modified ciphertext decrypted");
            assert_eq!(plaintext, input.payload);
        },
        Err(_) => assert_ne!(tampered, sealed, "unmodified ciphertext rejected"),
    }

    let tampered = flip(&signed, &input.flips);
    match kms.verify(&tampered) {
        Ok(payload) => {
            assert_eq!(tampered, signed, "modified payload verified");
            assert_eq!(payload, input.payload);
        },
        Err(_) => assert_ne!(tampered, signed, "unmodified payload rejected"),
    }
});
