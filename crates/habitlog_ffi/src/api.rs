//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the entry store's load/add/clear/snapshot operations to Dart via FRB.
//! - Own the single process-wide store instance.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Persistence failures are reported in response envelopes, never thrown.

use habitlog_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AddOutcome, AddRejection, EntryStore, HabitEntry, KeyValueStore, KvEntryRepository,
    LoadOutcome, MemoryKvStore, SaveOutcome, Snapshot, SqliteKvStore,
};
use log::warn;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};

const HABIT_DB_FILE_NAME: &str = "habitlog.sqlite3";
const HABIT_DB_PATH_ENV: &str = "HABITLOG_DB_PATH";

type DeviceStore = EntryStore<KvEntryRepository<Box<dyn KeyValueStore + Send>>>;

static HABIT_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static HABIT_STORE: OnceLock<Mutex<DeviceStore>> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One row of the habit list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitItem {
    /// Stable entry ID in string form, for list identity.
    pub id: String,
    /// User-supplied label.
    pub habit: String,
    /// Creation time in Unix epoch milliseconds.
    pub date_epoch_ms: i64,
}

/// Ordered snapshot envelope for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitListResponse {
    /// Entries sorted ascending by creation time.
    pub items: Vec<HabitItem>,
    /// Store revision; changes whenever the list changes.
    pub revision: u64,
    /// Human-readable diagnostics message.
    pub message: String,
}

/// Result envelope for mutating calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitActionResponse {
    /// Whether the intent was applied in memory.
    pub ok: bool,
    /// Created entry ID for `habit_add`.
    pub entry_id: Option<String>,
    /// Whether the change reached local storage.
    pub persisted: bool,
    /// Human-readable diagnostics message.
    pub message: String,
}

/// Loads persisted habits into the store.
///
/// Intended to run once at UI start. Missing or unreadable data leaves the
/// current list as-is; the message says which path was taken.
#[flutter_rust_bridge::frb(sync)]
pub fn habits_load() -> HabitListResponse {
    let mut store = lock_store();
    let message = match store.load() {
        LoadOutcome::Loaded { count } => format!("Loaded {count} habit(s)."),
        LoadOutcome::Absent => "No saved habits.".to_string(),
        LoadOutcome::Corrupt { reason } => format!("Saved habits unreadable: {reason}"),
        LoadOutcome::Unavailable { reason } => format!("Storage unavailable: {reason}"),
    };
    to_list_response(&store.snapshot(), message)
}

/// Returns the current ordered list without touching storage.
#[flutter_rust_bridge::frb(sync)]
pub fn habits_snapshot() -> HabitListResponse {
    let store = lock_store();
    let snapshot = store.snapshot();
    let message = format!("{} habit(s).", snapshot.len());
    to_list_response(&snapshot, message)
}

/// Records a habit stamped with the current time.
///
/// Empty text is ignored (`ok = false`). Text is passed through untrimmed.
#[flutter_rust_bridge::frb(sync)]
pub fn habit_add(text: String) -> HabitActionResponse {
    match lock_store().add(text) {
        AddOutcome::Added { id, save } => {
            to_action_response(Some(id.to_string()), &save, "Habit added.")
        }
        AddOutcome::Rejected(AddRejection::Empty) => {
            HabitActionResponse::rejected("Habit text is empty.")
        }
        AddOutcome::Rejected(AddRejection::Blank) => {
            HabitActionResponse::rejected("Habit text is blank.")
        }
    }
}

/// Removes all habits and persists the empty list.
#[flutter_rust_bridge::frb(sync)]
pub fn habits_clear_all() -> HabitActionResponse {
    let save = lock_store().clear_all();
    to_action_response(None, &save, "All habits cleared.")
}

impl HabitActionResponse {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            entry_id: None,
            persisted: false,
            message: message.into(),
        }
    }
}

fn to_action_response(
    entry_id: Option<String>,
    save: &SaveOutcome,
    message: &str,
) -> HabitActionResponse {
    let (persisted, message) = match save {
        SaveOutcome::Saved => (true, message.to_string()),
        SaveOutcome::Failed { reason } => (false, format!("{message} Not saved: {reason}")),
    };
    HabitActionResponse {
        ok: true,
        entry_id,
        persisted,
        message,
    }
}

fn to_list_response(snapshot: &Snapshot, message: String) -> HabitListResponse {
    HabitListResponse {
        items: snapshot.entries.iter().map(to_habit_item).collect(),
        revision: snapshot.revision,
        message,
    }
}

fn to_habit_item(entry: &HabitEntry) -> HabitItem {
    HabitItem {
        id: entry.id.to_string(),
        habit: entry.habit.clone(),
        date_epoch_ms: entry.date,
    }
}

fn lock_store() -> MutexGuard<'static, DeviceStore> {
    HABIT_STORE
        .get_or_init(|| Mutex::new(EntryStore::new(KvEntryRepository::new(open_device_kv()))))
        .lock()
        // A panicking listener must not brick every later call.
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn open_device_kv() -> Box<dyn KeyValueStore + Send> {
    let db_path = resolve_habit_db_path();
    match SqliteKvStore::open(&db_path) {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!(
                "event=kv_open module=ffi status=fallback backend=memory error={}",
                err
            );
            Box::new(MemoryKvStore::new())
        }
    }
}

fn resolve_habit_db_path() -> PathBuf {
    HABIT_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(HABIT_DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(HABIT_DB_FILE_NAME)
        })
        .clone()
}
