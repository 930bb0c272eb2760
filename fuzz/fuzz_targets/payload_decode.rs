//! Fuzz target for decrypt and verify of untrusted payloads
//!
//! Feeds arbitrary bytes (and their lossy text form) to every decoding entry
//! point of an instance that already holds the current key, so inputs that
//! carry a valid id reach the authentication step.
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - Errors are input rejections, never store or randomness failures
//! - Nothing is returned for input that was not produced by this key

#![no_main]

use epochkms_core::{KeyError, Kms, KmsConfig, MemoryStore};
use epochkms_harness::SimEnv;
use libfuzzer_sys::fuzz_target;

fn is_input_rejection(err: &KeyError) -> bool {
    err.is_key_id_rejection()
        || matches!(
            err,
            KeyError::InvalidInput { .. } | KeyError::AuthenticationFailure | KeyError::Decode { .. }
        )
}

fuzz_target!(|data: &[u8]| {
    let Ok(kms) = Kms::new(MemoryStore::new(), SimEnv::with_seed(0), &KmsConfig::default()) else {
        return;
    };
    let id = kms.current_key_id();
    if kms.sign(b"warm").is_err() {
        return;
    }

    // Prefix the current id so the fuzzer explores the authenticated region
    let mut framed = id.as_bytes().to_vec();
    framed.extend_from_slice(data);

    for input in [data, framed.as_slice()] {
        for result in [kms.decrypt(input), kms.verify(input)] {
            if let Err(e) = result {
                assert!(is_input_rejection(&e), "unexpected error: {e:?}");
            }
        }

        let text = String::from_utf8_lossy(input);
        for result in [kms.decrypt_text(&text), kms.verify_text(&text)] {
            if let Err(e) = result {
                assert!(is_input_rejection(&e), "unexpected error: {e:?}");
            }
        }
    }
});
