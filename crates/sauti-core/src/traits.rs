use crate::{
    context::{Completion, Context},
    error::SautiError,
    message::{IncomingMessage, OutgoingMessage},
    records::{NewReminder, Quote, Reminder, UserProfile},
    turn::Turn,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Language-model provider trait.
///
/// A provider takes the full history plus per-call instructions and returns
/// reply text with optional citations.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Whether this provider requires an API key to function.
    fn requires_api_key(&self) -> bool;

    /// Send a conversation context to the provider and get a reply.
    async fn complete(&self, context: &Context) -> Result<Completion, SautiError>;

    /// Check if the provider is available and ready.
    async fn is_available(&self) -> bool;
}

/// Messaging channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>, SautiError>;

    /// Send one delivery unit back through this channel.
    async fn send(&self, message: OutgoingMessage) -> Result<(), SautiError>;

    /// Send a typing indicator to show the bot is processing.
    async fn send_typing(&self, _target: &str) -> Result<(), SautiError> {
        Ok(())
    }

    /// Send a synthesized voice note (MP3 bytes).
    async fn send_audio(&self, _target: &str, _audio: &[u8]) -> Result<(), SautiError> {
        Ok(())
    }

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), SautiError>;
}

/// Per-user long-term facts and preferences.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load a profile, creating it with defaults on first access.
    async fn get_profile(&self, user_id: &str) -> Result<UserProfile, SautiError>;

    /// Add a fact with set semantics. Returns `true` if the fact was new.
    async fn add_fact(&self, user_id: &str, fact: &str) -> Result<bool, SautiError>;

    async fn set_style(&self, user_id: &str, style: &str) -> Result<(), SautiError>;

    async fn set_voice_mode(&self, user_id: &str, enabled: bool) -> Result<(), SautiError>;
}

/// Per-user bounded conversation history.
///
/// `append_turn` is the only way to add history; it evicts the oldest turns
/// once the configured capacity is exceeded.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All retained turns for a user, oldest first.
    async fn load_history(&self, user_id: &str) -> Result<Vec<Turn>, SautiError>;

    /// Append one turn and trim to capacity.
    async fn append_turn(&self, user_id: &str, turn: &Turn) -> Result<(), SautiError>;

    /// Drop a user's history. Returns the number of turns removed.
    async fn clear_history(&self, user_id: &str) -> Result<u64, SautiError>;
}

/// Pending reminders shared by the tool dispatcher and the scheduler.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Insert a reminder. Returns its id.
    async fn create_reminder(&self, reminder: &NewReminder) -> Result<String, SautiError>;

    /// Reminders with `due_at <= now`, oldest first.
    async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, SautiError>;

    /// Remove a reminder. Returns `true` if a row was deleted.
    async fn delete_reminder(&self, id: &str) -> Result<bool, SautiError>;

    /// Pending reminders owned by one user, soonest first.
    async fn reminders_for(&self, owner_id: &str) -> Result<Vec<Reminder>, SautiError>;
}

/// Capability to hand a due reminder to whatever transport reaches its owner.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), SautiError>;
}

/// Web, image and video search.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Image URLs for a query; `animated` restricts results to GIFs.
    async fn images(&self, query: &str, animated: bool) -> Result<Vec<String>, SautiError>;

    /// Video URLs for a query, restricted to YouTube.
    async fn videos(&self, query: &str) -> Result<Vec<String>, SautiError>;

    /// Plain result links for a query.
    async fn links(&self, query: &str, limit: usize) -> Result<Vec<String>, SautiError>;
}

/// Market-data lookup.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Latest close for a symbol, or `None` when the source has no data.
    async fn latest_close(&self, symbol: &str) -> Result<Option<Quote>, SautiError>;
}

/// Text-to-speech rendering.
#[async_trait]
pub trait Speech: Send + Sync {
    /// Render already-cleaned text to audio bytes.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SautiError>;
}

/// Document and web page text extraction.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetch a page and return a capped, source-tagged text block.
    async fn extract_url(&self, url: &str) -> Result<String, SautiError>;

    /// Decode file bytes of a declared MIME type into a tagged text block.
    async fn extract_document(&self, data: &[u8], mime_type: &str) -> Result<String, SautiError>;
}
