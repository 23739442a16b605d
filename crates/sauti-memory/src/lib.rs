//! # sauti-memory
//!
//! Persistent memory for Sauti (SQLite-backed): user profiles and facts,
//! bounded per-user history, and pending reminders.

pub mod store;

pub use store::Store;
