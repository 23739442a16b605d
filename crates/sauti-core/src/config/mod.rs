mod channels;
mod defaults;
mod providers;

#[cfg(test)]
mod tests;

pub use channels::*;
pub use providers::*;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SautiError;
use defaults::*;

/// Top-level Sauti configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sauti: SautiConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// General agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SautiConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Persona instructions prepended to every system prompt.
    #[serde(default = "default_persona")]
    pub persona: String,
    /// Place the agent considers "here" when answering.
    #[serde(default = "default_location")]
    pub location: String,
    /// IANA timezone name used for the clock and for reminder parsing.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for SautiConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            persona: default_persona(),
            location: default_location(),
            timezone: default_timezone(),
        }
    }
}

impl SautiConfig {
    /// Parse the configured timezone.
    pub fn tz(&self) -> Result<Tz, SautiError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| SautiError::Config(format!("invalid timezone '{}': {e}", self.timezone)))
    }
}

/// Memory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Turns retained per user; older turns are evicted on append.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            history_capacity: default_history_capacity(),
        }
    }
}

/// Scheduler configuration -- user-scheduled reminders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Inline tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-call bound for search, market data and page fetches.
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
    /// Number of top search results a random pick is drawn from.
    #[serde(default = "default_media_pool")]
    pub media_pool: usize,
    /// Bare tickers that live on the local exchange.
    #[serde(default = "default_local_tickers")]
    pub local_tickers: Vec<String>,
    #[serde(default = "default_exchange_suffix")]
    pub local_exchange_suffix: String,
    /// Cap on extracted page or document text.
    #[serde(default = "default_extract_max_chars")]
    pub extract_max_chars: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            media_pool: default_media_pool(),
            local_tickers: default_local_tickers(),
            local_exchange_suffix: default_exchange_suffix(),
            extract_max_chars: default_extract_max_chars(),
        }
    }
}

/// Text-to-speech replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub enabled: bool,
    /// OpenAI API key for speech synthesis.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_tts_model")]
    pub model: String,
    #[serde(default = "default_tts_voice")]
    pub voice: String,
    #[serde(default = "default_voice_max_chars")]
    pub max_chars: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            model: default_tts_model(),
            voice: default_tts_voice(),
            max_chars: default_voice_max_chars(),
        }
    }
}

/// Outbound message chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_chunk_chars")]
    pub max_chunk_chars: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_chunk_chars(),
        }
    }
}

impl Config {
    /// Fill empty secrets from the environment.
    ///
    /// `lookup` is normally `std::env::var(..).ok()`; tests pass a map.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let gemini = self.provider.gemini.get_or_insert_with(GeminiConfig::default);
        if gemini.api_key.is_empty() {
            if let Some(key) = lookup("GEMINI_API_KEY") {
                gemini.api_key = key;
            }
        }
        if self.voice.api_key.is_empty() {
            if let Some(key) = lookup("OPENAI_API_KEY") {
                self.voice.api_key = key;
            }
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            let tg = self.channel.telegram.get_or_insert_with(TelegramConfig::default);
            if tg.bot_token.is_empty() {
                tg.bot_token = token;
                tg.enabled = true;
            }
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, SautiError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SautiError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str::<Config>(&content)
            .map_err(|e| SautiError::Config(format!("failed to parse config: {}", e)))?
    } else {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    config.apply_env_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    config.sauti.tz()?;
    Ok(config)
}
