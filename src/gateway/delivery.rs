//! Outbound delivery: chunked text, then an optional voice note.

use super::Gateway;
use regex::Regex;
use sauti_channels::split_message;
use sauti_core::{
    error::with_timeout,
    message::{IncomingMessage, OutgoingMessage},
};
use std::sync::LazyLock;
use tracing::{error, warn};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[.*?\]").expect("valid regex"));
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"http\S+").expect("valid regex"));

const VOICE_SUFFIX: &str = "... check the text for more.";

/// Text to read aloud: no tags, links or emphasis markers, capped at `max_chars`.
pub fn voice_script(text: &str, max_chars: usize) -> String {
    let without_tags = TAG_RE.replace_all(text, "");
    let without_links = LINK_RE.replace_all(&without_tags, "");
    let clean: String = without_links
        .chars()
        .filter(|c| *c != '*' && *c != '_')
        .collect();
    let clean = clean.trim();

    if clean.chars().count() > max_chars {
        let head: String = clean.chars().take(max_chars).collect();
        format!("{head}{VOICE_SUFFIX}")
    } else {
        clean.to_string()
    }
}

impl Gateway {
    /// Send the reply in chunks, then a voice note when the user asked for one.
    pub(super) async fn deliver(&self, incoming: &IncomingMessage, text: &str, voice: bool) {
        let Some(channel) = self.channels.get(&incoming.channel) else {
            error!("no channel named {} to reply through", incoming.channel);
            return;
        };

        for chunk in split_message(text, self.settings.max_chunk_chars) {
            let msg = OutgoingMessage {
                text: chunk.to_string(),
                reply_target: incoming.reply_target.clone(),
            };
            if let Err(e) = channel.send(msg).await {
                error!("[{}] failed to send reply: {e}", incoming.channel);
                return;
            }
        }

        if !voice {
            return;
        }
        let (Some(speech), Some(target)) = (&self.speech, &incoming.reply_target) else {
            return;
        };

        let script = voice_script(text, self.settings.voice_max_chars);
        if script.is_empty() {
            return;
        }
        match with_timeout(
            self.settings.tools.timeout_secs,
            "speech synthesis",
            speech.synthesize(&script),
        )
        .await
        {
            Ok(audio) => {
                if let Err(e) = channel.send_audio(target, &audio).await {
                    warn!("[{}] failed to send voice note: {e}", incoming.channel);
                }
            }
            Err(e) => warn!("[{}] speech synthesis failed: {e}", incoming.channel),
        }
    }

    /// Send a plain text message back to the sender.
    pub(super) async fn send_text(&self, incoming: &IncomingMessage, text: &str) {
        self.deliver(incoming, text, false).await;
    }
}
