//! Outbound Bot API calls: text, chat actions, audio, and command registration.

use super::{TelegramChannel, TELEGRAM_MAX_CHARS};
use crate::utils::split_message;
use sauti_core::error::SautiError;
use tracing::{debug, info, warn};

impl TelegramChannel {
    /// Send a text message to a specific chat.
    pub(super) async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SautiError> {
        for chunk in split_message(text, TELEGRAM_MAX_CHARS) {
            let url = format!("{}/sendMessage", self.base_url);
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
                "parse_mode": "Markdown",
            });

            let resp = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| SautiError::Channel(format!("telegram send failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let error_text = resp.text().await.unwrap_or_default();
                if error_text.contains("can't parse entities") {
                    debug!("Markdown parse failed, retrying as plain text");
                    let plain_body = serde_json::json!({
                        "chat_id": chat_id,
                        "text": chunk,
                    });
                    self.client
                        .post(&url)
                        .json(&plain_body)
                        .send()
                        .await
                        .map_err(|e| {
                            SautiError::Channel(format!("telegram send (plain) failed: {e}"))
                        })?;
                } else {
                    return Err(SautiError::Channel(format!(
                        "telegram send got {status}: {error_text}"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Send MP3 bytes as an audio message.
    pub(super) async fn send_audio_bytes(
        &self,
        chat_id: i64,
        audio: &[u8],
    ) -> Result<(), SautiError> {
        let url = format!("{}/sendAudio", self.base_url);

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("reply.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| SautiError::Channel(format!("mime error: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("audio", part);

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SautiError::Channel(format!("telegram sendAudio failed: {e}")))?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            warn!("telegram sendAudio error: {error_text}");
        }

        Ok(())
    }

    /// Register bot commands with Telegram so users see an autocomplete menu.
    /// Best-effort: logs failures but does not propagate errors.
    pub(super) async fn register_commands(&self) {
        let commands = serde_json::json!({
            "commands": [
                { "command": "help", "description": "Show available commands" },
                { "command": "facts", "description": "List what I remember about you" },
                { "command": "style", "description": "Show or set how I talk to you" },
                { "command": "voice", "description": "Turn voice replies on or off" },
                { "command": "reminders", "description": "List your pending reminders" },
                { "command": "research", "description": "Write a research report on a topic" },
                { "command": "forget", "description": "Clear our conversation history" },
            ]
        });

        let url = format!("{}/setMyCommands", self.base_url);
        match self.client.post(&url).json(&commands).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("registered Telegram bot commands");
            }
            Ok(resp) => {
                let body = resp.text().await.unwrap_or_default();
                warn!("failed to register Telegram bot commands: {body}");
            }
            Err(e) => {
                warn!("failed to register Telegram bot commands: {e}");
            }
        }
    }

    /// Send a chat action (e.g. "typing") to a chat.
    pub(super) async fn send_chat_action(
        &self,
        chat_id: i64,
        action: &str,
    ) -> Result<(), SautiError> {
        let url = format!("{}/sendChatAction", self.base_url);
        let body = serde_json::json!({
            "chat_id": chat_id,
            "action": action,
        });

        self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SautiError::Channel(format!("telegram sendChatAction failed: {e}")))?;

        Ok(())
    }
}
