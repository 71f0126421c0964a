//! Habit entry domain model.
//!
//! # Responsibility
//! - Define the canonical record for one recorded habit occurrence.
//! - Own the JSON wire shape persisted under the entries storage key.
//!
//! # Invariants
//! - `id` is generated once and never reused for another entry.
//! - `habit` is never the empty string.
//! - Entries are immutable after creation apart from the store-assigned
//!   `seq`; only clear-all removes them.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one habit entry.
///
/// Used for list identity only, never for ordering.
pub type EntryId = Uuid;

/// Validation errors for habit entry invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValidationError {
    /// `id` must not be the nil UUID.
    NilId,
    /// `habit` must not be the empty string.
    EmptyHabit,
    /// `date` string could not be parsed as RFC 3339.
    InvalidDate(String),
}

impl Display for EntryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "id must not be nil"),
            Self::EmptyHabit => write!(f, "habit must not be empty"),
            Self::InvalidDate(value) => write!(f, "date `{value}` is not a valid timestamp"),
        }
    }
}

impl Error for EntryValidationError {}

/// One user-recorded habit occurrence.
///
/// Serialized as `{id, habit, date, seq}` with `date` in Unix epoch
/// milliseconds. Deserialization runs [`HabitEntry::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HabitEntryWire")]
pub struct HabitEntry {
    /// Stable list identity.
    pub id: EntryId,
    /// User-supplied label.
    pub habit: String,
    /// Creation time, Unix epoch milliseconds. Primary sort key.
    pub date: i64,
    /// Store-assigned insertion counter. Secondary sort key.
    pub seq: u64,
}

impl HabitEntry {
    /// Creates a new entry with a generated stable ID.
    ///
    /// # Errors
    /// - Returns [`EntryValidationError::EmptyHabit`] for `""`.
    pub fn new(
        habit: impl Into<String>,
        date: i64,
        seq: u64,
    ) -> Result<Self, EntryValidationError> {
        Self::with_id(Uuid::new_v4(), habit, date, seq)
    }

    /// Creates an entry with a caller-provided ID.
    ///
    /// Used by decode paths where identity already exists.
    pub fn with_id(
        id: EntryId,
        habit: impl Into<String>,
        date: i64,
        seq: u64,
    ) -> Result<Self, EntryValidationError> {
        let entry = Self {
            id,
            habit: habit.into(),
            date,
            seq,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Checks entry invariants.
    pub fn validate(&self) -> Result<(), EntryValidationError> {
        if self.id.is_nil() {
            return Err(EntryValidationError::NilId);
        }
        if self.habit.is_empty() {
            return Err(EntryValidationError::EmptyHabit);
        }
        Ok(())
    }

    /// Returns the creation time as a UTC datetime.
    ///
    /// `None` when `date` is outside chrono's representable range.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.date).single()
    }

    /// Total order used by the store: `date` ascending, then `seq`.
    pub fn display_order(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Sorts entries into display order.
///
/// Stable, so entries with equal `(date, seq)` keep their relative order.
pub fn sort_entries(entries: &mut [HabitEntry]) {
    entries.sort_by(HabitEntry::display_order);
}

/// Returns whether entries are already in display order.
pub fn is_sorted(entries: &[HabitEntry]) -> bool {
    entries
        .windows(2)
        .all(|pair| pair[0].display_order(&pair[1]) != Ordering::Greater)
}

#[derive(Deserialize)]
struct HabitEntryWire {
    id: EntryId,
    habit: String,
    date: WireDate,
    #[serde(default)]
    seq: u64,
}

/// Integers below this magnitude are epoch seconds, at or above it epoch
/// milliseconds. `1e11` ms is 1973-03-03 while `1e11` s is year 5138, so the
/// two ranges do not overlap for real timestamps.
const EPOCH_SECONDS_LIMIT: u64 = 100_000_000_000;

/// Accepted `date` encodings.
///
/// - Integer: epoch milliseconds, or epoch seconds below [`EPOCH_SECONDS_LIMIT`].
/// - Non-integer number: epoch seconds with a fractional part.
/// - String: RFC 3339 / ISO-8601.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireDate {
    Integer(i64),
    Fractional(f64),
    Text(String),
}

impl WireDate {
    fn into_epoch_ms(self) -> Result<i64, EntryValidationError> {
        let millis = match self {
            Self::Integer(value) if value.unsigned_abs() < EPOCH_SECONDS_LIMIT => value
                .checked_mul(1_000)
                .ok_or_else(|| EntryValidationError::InvalidDate(value.to_string()))?,
            Self::Integer(value) => value,
            Self::Fractional(seconds) => fractional_seconds_to_ms(seconds)
                .ok_or_else(|| EntryValidationError::InvalidDate(seconds.to_string()))?,
            Self::Text(value) => DateTime::parse_from_rfc3339(value.trim())
                .map(|parsed| parsed.with_timezone(&Utc).timestamp_millis())
                .map_err(|_| EntryValidationError::InvalidDate(value))?,
        };

        match Utc.timestamp_millis_opt(millis).single() {
            Some(_) => Ok(millis),
            None => Err(EntryValidationError::InvalidDate(millis.to_string())),
        }
    }
}

/// Converts epoch seconds to rounded milliseconds.
///
/// `None` for non-finite values and anything outside the `i64` range.
fn fractional_seconds_to_ms(seconds: f64) -> Option<i64> {
    let millis = (seconds * 1_000.0).round();
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if !millis.is_finite() || millis < i64::MIN as f64 || millis >= i64::MAX as f64 {
        return None;
    }
    Some(millis as i64)
}

impl TryFrom<HabitEntryWire> for HabitEntry {
    type Error = EntryValidationError;

    fn try_from(wire: HabitEntryWire) -> Result<Self, Self::Error> {
        let date = wire.date.into_epoch_ms()?;
        Self::with_id(wire.id, wire.habit, date, wire.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::{is_sorted, sort_entries, HabitEntry};
    use uuid::Uuid;

    fn entry(habit: &str, date: i64, seq: u64) -> HabitEntry {
        HabitEntry::new(habit, date, seq).expect("valid entry")
    }

    #[test]
    fn sort_uses_seq_to_break_date_ties() {
        let mut entries = vec![entry("b", 10, 2), entry("a", 10, 1), entry("c", 5, 3)];
        sort_entries(&mut entries);

        let labels: Vec<&str> = entries.iter().map(|e| e.habit.as_str()).collect();
        assert_eq!(labels, vec!["c", "a", "b"]);
        assert!(is_sorted(&entries));
    }

    #[test]
    fn sort_is_stable_for_identical_keys() {
        let first = HabitEntry::with_id(Uuid::new_v4(), "first", 7, 0).unwrap();
        let second = HabitEntry::with_id(Uuid::new_v4(), "second", 7, 0).unwrap();
        let mut entries = vec![first.clone(), second.clone()];
        sort_entries(&mut entries);
        assert_eq!(entries, vec![first, second]);
    }

    #[test]
    fn fractional_seconds_round_to_millis_and_reject_out_of_range() {
        assert_eq!(
            super::fractional_seconds_to_ms(1_700_000_000.5),
            Some(1_700_000_000_500)
        );
        assert_eq!(super::fractional_seconds_to_ms(0.0004), Some(0));
        assert_eq!(super::fractional_seconds_to_ms(1e300), None);
        assert_eq!(super::fractional_seconds_to_ms(f64::NAN), None);
    }

    #[test]
    fn created_at_maps_epoch_millis() {
        let e = entry("walk", 1_700_000_000_000, 0);
        let created = e.created_at().expect("in range");
        assert_eq!(created.timestamp_millis(), 1_700_000_000_000);
    }
}
