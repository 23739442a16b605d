//! Long-polling update loop and Channel trait implementation.

use super::types::{TgFile, TgMessage, TgResponse, TgUpdate, TgUser};
use super::{parse_chat_id, TelegramChannel};
use async_trait::async_trait;
use sauti_core::{
    error::SautiError,
    message::{Attachment, IncomingMessage, OutgoingMessage},
    traits::Channel,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What a Telegram message carries, before any file is downloaded.
#[derive(Debug, PartialEq)]
pub(crate) enum Payload {
    Text(String),
    File {
        file_id: String,
        mime_type: String,
        filename: Option<String>,
        text: String,
    },
}

/// Classify a message. Returns `None` for updates the agent ignores
/// (stickers, locations, service messages).
pub(crate) fn classify(msg: &TgMessage) -> Option<Payload> {
    if let Some(ref t) = msg.text {
        return Some(Payload::Text(t.clone()));
    }
    let caption = msg.caption.clone();
    if let Some(ref photos) = msg.photo {
        // Telegram sends multiple sizes; the last is the largest.
        let largest = photos.last()?;
        return Some(Payload::File {
            file_id: largest.file_id.clone(),
            mime_type: "image/jpeg".to_string(),
            filename: None,
            text: caption.unwrap_or_else(|| "[Photo]".to_string()),
        });
    }
    if let Some(ref doc) = msg.document {
        return Some(Payload::File {
            file_id: doc.file_id.clone(),
            mime_type: doc
                .mime_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            filename: doc.file_name.clone(),
            text: caption.unwrap_or_else(|| "[Document]".to_string()),
        });
    }
    if let Some(ref voice) = msg.voice {
        return Some(Payload::File {
            file_id: voice.file_id.clone(),
            mime_type: voice
                .mime_type
                .clone()
                .unwrap_or_else(|| "audio/ogg".to_string()),
            filename: None,
            text: "[Voice message]".to_string(),
        });
    }
    None
}

pub(crate) fn display_name(user: &TgUser) -> String {
    if let Some(ref un) = user.username {
        format!("@{un}")
    } else if let Some(ref ln) = user.last_name {
        format!("{} {ln}", user.first_name)
    } else {
        user.first_name.clone()
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<mpsc::Receiver<IncomingMessage>, SautiError> {
        self.register_commands().await;

        let (tx, rx) = mpsc::channel(64);
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let bot_token = self.config.bot_token.clone();
        let allowed_users = self.config.allowed_users.clone();
        let last_update_id = self.last_update_id.clone();

        info!("Telegram channel starting long polling...");

        tokio::spawn(async move {
            let mut backoff_secs: u64 = 1;

            loop {
                let last = last_update_id.lock().await;
                let offset = last.map(|id| id + 1);
                drop(last);

                let mut url = format!("{base_url}/getUpdates?timeout=30");
                if let Some(off) = offset {
                    url.push_str(&format!("&offset={off}"));
                }

                let resp = match client
                    .get(&url)
                    .timeout(std::time::Duration::from_secs(35))
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        error!("telegram poll error (retry in {backoff_secs}s): {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                        backoff_secs = (backoff_secs * 2).min(60);
                        continue;
                    }
                };

                let body: TgResponse<Vec<TgUpdate>> = match resp.json().await {
                    Ok(b) => b,
                    Err(e) => {
                        error!("telegram parse error (retry in {backoff_secs}s): {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                        backoff_secs = (backoff_secs * 2).min(60);
                        continue;
                    }
                };

                if !body.ok {
                    error!(
                        "telegram API error (retry in {backoff_secs}s): {}",
                        body.description.unwrap_or_default()
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                    backoff_secs = (backoff_secs * 2).min(60);
                    continue;
                }

                // Successful poll -- reset backoff.
                backoff_secs = 1;

                let updates = body.result.unwrap_or_default();

                if let Some(last_update) = updates.last() {
                    *last_update_id.lock().await = Some(last_update.update_id);
                }

                for update in updates {
                    let Some(msg) = update.message else {
                        continue;
                    };

                    let Some(ref user) = msg.from else {
                        continue;
                    };

                    if !allowed_users.is_empty() && !allowed_users.contains(&user.id) {
                        warn!("ignoring message from unauthorized user {}", user.id);
                        continue;
                    }

                    // Person-to-person only.
                    if matches!(msg.chat.chat_type.as_str(), "group" | "supergroup") {
                        debug!("telegram: ignoring group message from chat {}", msg.chat.id);
                        continue;
                    }

                    let (text, attachment) = match classify(&msg) {
                        None => continue,
                        Some(Payload::Text(t)) => (t, None),
                        Some(Payload::File {
                            file_id,
                            mime_type,
                            filename,
                            text,
                        }) => {
                            match download_telegram_file(&client, &base_url, &bot_token, &file_id)
                                .await
                            {
                                Ok(data) => {
                                    info!("downloaded {mime_type} ({} bytes)", data.len());
                                    (
                                        text,
                                        Some(Attachment {
                                            mime_type,
                                            data,
                                            filename,
                                        }),
                                    )
                                }
                                Err(e) => {
                                    warn!("telegram file download failed: {e}");
                                    continue;
                                }
                            }
                        }
                    };

                    let incoming = IncomingMessage {
                        id: Uuid::new_v4(),
                        channel: "telegram".to_string(),
                        sender_id: user.id.to_string(),
                        sender_name: Some(display_name(user)),
                        text,
                        timestamp: chrono::Utc::now(),
                        attachment,
                        reply_target: Some(msg.chat.id.to_string()),
                    };

                    if tx.send(incoming).await.is_err() {
                        info!("telegram channel receiver dropped, stopping poll");
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), SautiError> {
        let chat_id_str = message
            .reply_target
            .as_deref()
            .ok_or_else(|| SautiError::Channel("no reply_target on outgoing message".into()))?;

        self.send_text(parse_chat_id(chat_id_str)?, &message.text)
            .await
    }

    async fn send_typing(&self, target: &str) -> Result<(), SautiError> {
        self.send_chat_action(parse_chat_id(target)?, "typing").await
    }

    async fn send_audio(&self, target: &str, audio: &[u8]) -> Result<(), SautiError> {
        self.send_audio_bytes(parse_chat_id(target)?, audio).await
    }

    async fn stop(&self) -> Result<(), SautiError> {
        info!("Telegram channel stopped");
        Ok(())
    }
}

/// Download a file from Telegram servers by file_id.
async fn download_telegram_file(
    client: &reqwest::Client,
    base_url: &str,
    bot_token: &str,
    file_id: &str,
) -> Result<Vec<u8>, SautiError> {
    // Step 1: getFile to obtain file_path.
    let url = format!("{base_url}/getFile?file_id={file_id}");
    let resp: TgResponse<TgFile> = client
        .get(&url)
        .send()
        .await
        .map_err(|e| SautiError::Channel(format!("telegram getFile failed: {e}")))?
        .json()
        .await
        .map_err(|e| SautiError::Channel(format!("telegram getFile parse failed: {e}")))?;

    let file_path = resp
        .result
        .and_then(|f| f.file_path)
        .ok_or_else(|| SautiError::Channel("telegram getFile returned no file_path".into()))?;

    // Step 2: Download the actual file bytes.
    let download_url = format!("https://api.telegram.org/file/bot{bot_token}/{file_path}");
    let bytes = client
        .get(&download_url)
        .send()
        .await
        .map_err(|e| SautiError::Channel(format!("telegram file download failed: {e}")))?
        .bytes()
        .await
        .map_err(|e| SautiError::Channel(format!("telegram file read failed: {e}")))?;

    Ok(bytes.to_vec())
}
