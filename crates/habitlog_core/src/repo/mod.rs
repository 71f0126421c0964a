//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate storage key and JSON wire details from the store service.
//!
//! # Invariants
//! - Repository reads validate every decoded entry.
//! - Repository APIs distinguish "absent" from "corrupt" stored data.

pub mod entry_repo;
