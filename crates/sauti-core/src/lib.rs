//! # sauti-core
//!
//! Core types, traits, configuration, and error handling for the Sauti agent.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod records;
pub mod traits;
pub mod turn;

pub use config::shellexpand;
