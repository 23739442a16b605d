use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub default: String,
    #[serde(default)]
    pub gemini: Option<GeminiConfig>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default: default_provider(),
            gemini: Some(GeminiConfig::default()),
        }
    }
}

/// Google Gemini provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    /// Upper bound on one generation call.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    /// Attach the Google Search tool so replies can cite sources.
    #[serde(default = "default_true")]
    pub grounding: bool,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
            timeout_secs: default_generation_timeout(),
            grounding: true,
        }
    }
}
