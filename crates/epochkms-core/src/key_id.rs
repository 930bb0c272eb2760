//! Key ids derived from wall-clock time
//!
//! A key id names one rotation window. It is the window's start instant
//! rendered through a fixed-width `strftime` template, so ids sort in time
//! order and every wire payload can carry its id in a fixed-size prefix.
//!
//! # Window Alignment
//!
//! Windows are aligned to `0001-01-01T00:00:00Z` at whole-second
//! granularity:
//!
//! ```text
//! start(t) = t - ((t - 0001-01-01T00:00:00Z) mod rotation_period)
//! ```
//!
//! Every process with the same rotation period therefore agrees on window
//! boundaries without coordination.

use std::{borrow::Borrow, fmt, fmt::Write as _, time::Duration};

use chrono::{
    DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc,
    format::{Item, StrftimeItems},
};

use crate::{
    config::MIN_ROTATION_PERIOD,
    error::{ConfigError, KeyError},
};

/// Seconds from `0001-01-01T00:00:00Z` to the Unix epoch.
const YEAR_ONE_TO_UNIX_EPOCH_SECS: i64 = 62_135_596_800;

/// Identifier of one rotation window, e.g. `20250101_0000`.
///
/// Only produced by a [`KeyIdScheme`], so every value is in canonical form
/// for the scheme that made it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(String);

impl KeyId {
    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as raw bytes, for wire prefixes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets the cache look up ids sliced straight from untrusted payloads.
impl Borrow<str> for KeyId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Rotation period, maximum age and id template, validated together.
///
/// # Invariants
///
/// - `rotation_period >= 5 minutes`
/// - `max_age > rotation_period`
/// - Every id rendered by this scheme is exactly `width()` bytes long
/// - `current(t)` is monotonic in `t`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIdScheme {
    rotation_secs: i64,
    max_age: TimeDelta,
    format: String,
    width: usize,
}

impl KeyIdScheme {
    /// Validate a rotation period, maximum age and template.
    ///
    /// Sub-second parts of `rotation_period` are ignored.
    ///
    /// # Errors
    ///
    /// - `RotationPeriodTooShort`: period below five minutes
    /// - `MaxAgeNotAfterRotation`: `max_age <= rotation_period`
    /// - `InvalidKeyIdFormat`: template has an unknown specifier, renders
    ///   different widths across years 1000-9999, renders a path separator,
    ///   cannot be parsed back, or cannot tell window starts apart
    pub fn new(
        rotation_period: Duration,
        max_age: Duration,
        format: &str,
    ) -> Result<Self, ConfigError> {
        if rotation_period.as_secs() < MIN_ROTATION_PERIOD.as_secs() {
            return Err(ConfigError::RotationPeriodTooShort {
                seconds: rotation_period.as_secs(),
                minimum: MIN_ROTATION_PERIOD.as_secs(),
            });
        }
        if max_age <= rotation_period {
            return Err(ConfigError::MaxAgeNotAfterRotation {
                max_age: max_age.as_secs(),
                rotation: rotation_period.as_secs(),
            });
        }

        let invalid = |reason: &str| ConfigError::InvalidKeyIdFormat {
            format: format.to_owned(),
            reason: reason.to_owned(),
        };

        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(invalid("unknown or incomplete specifier"));
        }

        let mut scheme = Self {
            rotation_secs: i64::try_from(rotation_period.as_secs()).unwrap_or(i64::MAX),
            max_age: TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX),
            format: format.to_owned(),
            width: 0,
        };

        let mut width = None;
        for sample in width_samples() {
            let rendered = scheme.render(sample);

            if rendered.is_empty() {
                return Err(invalid("renders an empty id"));
            }
            if rendered.contains(['/', '\\']) {
                return Err(invalid("renders a path separator"));
            }
            match width {
                None => width = Some(rendered.len()),
                Some(w) if w != rendered.len() => {
                    return Err(invalid("rendered width varies across years 1000-9999"));
                },
                Some(_) => {},
            }
            match scheme.parse_instant(&rendered) {
                Some(parsed) if scheme.render(parsed) == rendered => {},
                _ => return Err(invalid("rendered ids do not parse back")),
            }

            // Distinct windows must render distinct ids naming their start.
            let start = scheme.window_start(sample);
            if scheme.parse_instant(&scheme.render(start)) != Some(start) {
                return Err(invalid("template is coarser than the rotation period"));
            }
        }

        scheme.width = width.unwrap_or(0);
        Ok(scheme)
    }

    /// Fixed length in bytes of every id this scheme renders.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The `strftime` template.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Length of one window.
    pub fn rotation_period(&self) -> Duration {
        Duration::from_secs(self.rotation_secs.unsigned_abs())
    }

    /// Start of the window containing `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let since_year_one = now.timestamp() + YEAR_ONE_TO_UNIX_EPOCH_SECS;
        let start = since_year_one - since_year_one.rem_euclid(self.rotation_secs);

        DateTime::from_timestamp(start - YEAR_ONE_TO_UNIX_EPOCH_SECS, 0)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Id of the window containing `now`.
    pub fn current(&self, now: DateTime<Utc>) -> KeyId {
        KeyId(self.render(self.window_start(now)))
    }

    /// Parse an id into its canonical form and the instant it names.
    ///
    /// # Errors
    ///
    /// - `MalformedId`: wrong width, unparseable, or not canonical (parses,
    ///   but renders back differently)
    pub fn parse(&self, id: &str) -> Result<(KeyId, DateTime<Utc>), KeyError> {
        let malformed = || KeyError::MalformedId { id: id.to_owned() };

        if id.len() != self.width {
            return Err(malformed());
        }

        let instant = self.parse_instant(id).ok_or_else(malformed)?;
        if self.render(instant) != id {
            return Err(malformed());
        }

        Ok((KeyId(id.to_owned()), instant))
    }

    /// Parse an id and check it is neither from the future nor expired.
    ///
    /// # Errors
    ///
    /// - `MalformedId`: see [`KeyIdScheme::parse`]
    /// - `FutureId`: the named instant is after `now`
    /// - `Expired`: the named instant plus `max_age` is before `now`
    pub fn validate(&self, id: &str, now: DateTime<Utc>) -> Result<KeyId, KeyError> {
        let (key_id, issued) = self.parse(id)?;

        if issued > now {
            return Err(KeyError::FutureId { id: key_id.0 });
        }

        // An unrepresentable deadline lies past any `now`.
        match issued.checked_add_signed(self.max_age) {
            Some(deadline) if deadline < now => Err(KeyError::Expired { id: key_id.0 }),
            _ => Ok(key_id),
        }
    }

    /// Returns true if `id` would be rejected as expired at `now`.
    ///
    /// Ids that do not parse count as expired.
    pub fn is_expired(&self, id: &KeyId, now: DateTime<Utc>) -> bool {
        matches!(
            self.validate(id.as_str(), now),
            Err(KeyError::Expired { .. } | KeyError::MalformedId { .. })
        )
    }

    fn render(&self, at: DateTime<Utc>) -> String {
        let mut out = String::with_capacity(self.width);
        let Ok(()) = write!(out, "{}", at.format(&self.format)) else {
            unreachable!("template was checked for invalid specifiers at construction");
        };
        out
    }

    fn parse_instant(&self, id: &str) -> Option<DateTime<Utc>> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(id, &self.format) {
            return Some(naive.and_utc());
        }

        // Date-only templates name midnight.
        NaiveDate::parse_from_str(id, &self.format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

fn width_samples() -> impl Iterator<Item = DateTime<Utc>> {
    [
        (1000, 1, 1, 0, 0, 0),
        (1999, 12, 31, 23, 59, 59),
        (2025, 1, 1, 0, 0, 0),
        (2025, 6, 15, 12, 34, 56),
        (9999, 12, 31, 23, 59, 59),
    ]
    .into_iter()
    .filter_map(|(y, mo, d, h, mi, s)| {
        NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|date| date.and_hms_opt(h, mi, s))
            .map(|naive| naive.and_utc())
    })
}
