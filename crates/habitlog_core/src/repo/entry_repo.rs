//! Habit entry repository contracts and key-value implementation.
//!
//! # Responsibility
//! - Encode/decode the full entry sequence as one JSON array blob.
//! - Keep storage-key and wire details inside the persistence boundary.
//!
//! # Invariants
//! - The whole sequence lives under one key; there is no per-entry key.
//! - Decoded entries have passed `HabitEntry::validate()`.
//! - A missing key is reported as `StoredEntries::Absent`, not as an error.

use crate::kv::{KeyValueStore, KvError};
use crate::model::entry::HabitEntry;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fixed storage key for the persisted entry sequence.
pub const ENTRIES_STORAGE_KEY: &str = "habits.v1";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entry persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying key-value store failed.
    Storage(KvError),
    /// Stored blob is not a valid entry array.
    Corrupt(serde_json::Error),
    /// In-memory sequence could not be encoded.
    Encode(serde_json::Error),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::Corrupt(err) => write!(f, "stored entries are corrupt: {err}"),
            Self::Encode(err) => write!(f, "failed to encode entries: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Corrupt(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<KvError> for RepoError {
    fn from(value: KvError) -> Self {
        Self::Storage(value)
    }
}

/// Result of reading the stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredEntries {
    /// Nothing stored under the key yet.
    Absent,
    /// Decoded entries in blob order (not yet sorted).
    Present(Vec<HabitEntry>),
}

/// Repository interface for whole-sequence persistence.
pub trait EntryRepository {
    fn load_entries(&self) -> RepoResult<StoredEntries>;
    fn save_entries(&self, entries: &[HabitEntry]) -> RepoResult<()>;
}

/// Entry repository over any [`KeyValueStore`].
pub struct KvEntryRepository<S: KeyValueStore> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> KvEntryRepository<S> {
    /// Binds the repository to [`ENTRIES_STORAGE_KEY`].
    pub fn new(store: S) -> Self {
        Self::with_key(store, ENTRIES_STORAGE_KEY)
    }

    /// Binds the repository to a custom key.
    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

impl<S: KeyValueStore> EntryRepository for KvEntryRepository<S> {
    fn load_entries(&self) -> RepoResult<StoredEntries> {
        let Some(blob) = self.store.get(self.key.as_str())? else {
            return Ok(StoredEntries::Absent);
        };
        decode_entries(blob.as_str()).map(StoredEntries::Present)
    }

    fn save_entries(&self, entries: &[HabitEntry]) -> RepoResult<()> {
        let blob = encode_entries(entries)?;
        self.store.set(self.key.as_str(), blob.as_str())?;
        Ok(())
    }
}

/// Encodes the full sequence as a JSON array.
pub fn encode_entries(entries: &[HabitEntry]) -> RepoResult<String> {
    serde_json::to_string(entries).map_err(RepoError::Encode)
}

/// Decodes a JSON array blob, validating every element.
pub fn decode_entries(blob: &str) -> RepoResult<Vec<HabitEntry>> {
    serde_json::from_str::<Vec<HabitEntry>>(blob).map_err(RepoError::Corrupt)
}
