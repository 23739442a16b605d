//! # sauti-channels
//!
//! Messaging platform integrations for Sauti.

pub mod console;
pub mod telegram;
pub mod utils;

pub use utils::split_message;
