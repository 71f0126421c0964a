//! Core use-case services.
//!
//! # Responsibility
//! - Own the in-memory entry sequence and orchestrate repository calls.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod clock;
pub mod entry_store;
