//! Flutter bridge crate for HabitLog.

pub mod api;
