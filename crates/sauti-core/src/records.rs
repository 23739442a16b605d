//! Persisted record shapes shared by stores and the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default conversational style for a new profile.
pub const DEFAULT_STYLE: &str = "friendly";

/// Long-term knowledge about one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    /// Facts, unique per user. Order is not significant.
    pub facts: Vec<String>,
    pub style: String,
    /// Reply with synthesized audio in addition to text.
    pub voice_mode: bool,
}

impl UserProfile {
    /// A fresh profile with empty defaults.
    pub fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            facts: Vec::new(),
            style: DEFAULT_STYLE.to_string(),
            voice_mode: false,
        }
    }
}

/// Status of a stored reminder. Delivered reminders are deleted, not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
}

/// A scheduled reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub owner_id: String,
    /// Transport name (e.g. "telegram").
    pub channel: String,
    /// Platform-specific destination within the transport (e.g. chat id).
    pub channel_id: String,
    pub due_at: DateTime<Utc>,
    pub text: String,
    pub status: ReminderStatus,
}

/// Fields needed to create a reminder.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub owner_id: String,
    pub channel: String,
    pub channel_id: String,
    pub due_at: DateTime<Utc>,
    pub text: String,
}

/// Latest known price for a ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub currency: String,
}
