//! Local stdin/stdout channel.
//!
//! Each input line becomes one message from a single local user. Replies
//! and reminders are printed to stdout.

use async_trait::async_trait;
use sauti_core::{
    config::ConsoleConfig,
    error::SautiError,
    message::{IncomingMessage, OutgoingMessage},
    traits::Channel,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::info;
use uuid::Uuid;

/// Reply target used for everything the console prints.
pub const CONSOLE_TARGET: &str = "console";

/// Console channel reading lines from stdin.
pub struct ConsoleChannel {
    user_id: String,
    stdout: Mutex<tokio::io::Stdout>,
}

impl ConsoleChannel {
    pub fn new(config: &ConsoleConfig) -> Self {
        Self {
            user_id: config
                .user_id
                .clone()
                .unwrap_or_else(|| "console".to_string()),
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }

    fn incoming(&self, text: String) -> IncomingMessage {
        IncomingMessage {
            id: Uuid::new_v4(),
            channel: "console".to_string(),
            sender_id: self.user_id.clone(),
            sender_name: None,
            text,
            timestamp: chrono::Utc::now(),
            attachment: None,
            reply_target: Some(CONSOLE_TARGET.to_string()),
        }
    }
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn start(&self) -> Result<mpsc::Receiver<IncomingMessage>, SautiError> {
        let (tx, rx) = mpsc::channel(16);
        let template = self.incoming(String::new());

        info!("Console channel reading from stdin");

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let msg = IncomingMessage {
                    id: Uuid::new_v4(),
                    text: line,
                    timestamp: chrono::Utc::now(),
                    ..template.clone()
                };
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
            info!("console input closed");
        });

        Ok(rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), SautiError> {
        let mut out = self.stdout.lock().await;
        out.write_all(format!("{}\n", message.text).as_bytes())
            .await?;
        out.flush().await?;
        Ok(())
    }

    async fn send_audio(&self, _target: &str, audio: &[u8]) -> Result<(), SautiError> {
        let mut out = self.stdout.lock().await;
        out.write_all(format!("[voice note: {} bytes]\n", audio.len()).as_bytes())
            .await?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), SautiError> {
        info!("Console channel stopped");
        Ok(())
    }
}
