//! Core domain logic for HabitLog.
//! This crate is the single source of truth for entry ordering and persistence.

pub mod db;
pub mod kv;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use kv::{KeyValueStore, KvError, KvResult, MemoryKvStore, SqliteKvStore};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entry::{EntryId, EntryValidationError, HabitEntry};
pub use repo::entry_repo::{
    EntryRepository, KvEntryRepository, RepoError, RepoResult, StoredEntries,
    ENTRIES_STORAGE_KEY,
};
pub use service::clock::{Clock, ManualClock, SystemClock};
pub use service::entry_store::{
    AddOutcome, AddRejection, EntryStore, LoadOutcome, SaveOutcome, Snapshot, StoreOptions,
    SubscriptionId,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
