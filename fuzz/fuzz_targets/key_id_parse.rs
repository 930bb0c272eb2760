//! Fuzz target for key id parsing
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary id strings
//! - Accepted ids are canonical: exactly the configured width, and equal to
//!   the input
//! - Validation never accepts an id that parsing rejects

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use epochkms_core::{Environment, KeyIdScheme};
use epochkms_harness::SimEnv;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    id: String,
    template: Template,
    rotation_minutes: u16,
}

#[derive(Debug, Arbitrary)]
enum Template {
    Default,
    Compact,
    DateOnly,
    Iso,
}

impl Template {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "%Y%m%d_%H%M",
            Self::Compact => "%Y%m%d%H%M%S",
            Self::DateOnly => "%Y-%m-%d",
            Self::Iso => "%Y-%m-%dT%H:%M",
        }
    }
}

fuzz_target!(|input: Input| {
    let rotation = Duration::from_secs(u64::from(input.rotation_minutes.max(5)) * 60);
    let Ok(scheme) = KeyIdScheme::new(rotation, rotation * 3, input.template.as_str()) else {
        return;
    };

    let parsed = scheme.parse(&input.id);
    if let Ok((id, _)) = &parsed {
        assert_eq!(id.as_str(), input.id);
        assert_eq!(id.as_str().len(), scheme.width());
    }

    let now = SimEnv::with_seed(0).now();
    if scheme.validate(&input.id, now).is_ok() {
        assert!(parsed.is_ok());
    }
});
