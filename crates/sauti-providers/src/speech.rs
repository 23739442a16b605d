//! OpenAI text-to-speech.

use async_trait::async_trait;
use sauti_core::{error::SautiError, traits::Speech};
use std::time::Duration;

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Renders text to MP3 via the OpenAI speech endpoint.
pub struct OpenAiSpeech {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
    timeout: Duration,
}

impl OpenAiSpeech {
    pub fn new(api_key: String, model: String, voice: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            voice,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}

#[async_trait]
impl Speech for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SautiError> {
        let body = serde_json::json!({
            "model": self.model,
            "voice": self.voice,
            "input": text,
            "response_format": "mp3",
        });

        let resp = self
            .client
            .post(OPENAI_SPEECH_URL)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| SautiError::Tool(format!("tts request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SautiError::Tool(format!("tts API error {status}: {body}")));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SautiError::Tool(format!("tts response read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}
