//! Habit domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep one JSON wire shape for persisted entries.
//!
//! # Invariants
//! - Every entry is identified by a stable `EntryId`.
//! - Entries are removed only in bulk via clear-all.

pub mod entry;
