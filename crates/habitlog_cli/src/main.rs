//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `habitlog_core` linkage without Flutter/FFI runtime setup.
//! - Print the persisted habit list from a device database file.
//!
//! Usage: `habitlog_cli [db_path]`

use habitlog_core::{EntryStore, KvEntryRepository, LoadOutcome, SqliteKvStore};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("habitlog_core ping={}", habitlog_core::ping());
    println!("habitlog_core version={}", habitlog_core::core_version());

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    let kv = match SqliteKvStore::open(&db_path) {
        Ok(kv) => kv,
        Err(err) => {
            eprintln!("failed to open `{db_path}`: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut store = EntryStore::new(KvEntryRepository::new(kv));
    match store.load() {
        LoadOutcome::Loaded { count } => println!("habits loaded={count}"),
        LoadOutcome::Absent => println!("habits loaded=0 (no saved data)"),
        LoadOutcome::Corrupt { reason } => println!("habits unreadable: {reason}"),
        LoadOutcome::Unavailable { reason } => println!("storage unavailable: {reason}"),
    }

    for entry in store.entries() {
        let when = entry
            .created_at()
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| entry.date.to_string());
        println!("{when}\t{}", entry.habit);
    }

    ExitCode::SUCCESS
}
