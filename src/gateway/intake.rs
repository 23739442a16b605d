//! Build the user turn: message text, the text of a linked page or video, and any attachment.

use super::Gateway;
use regex::Regex;
use sauti_core::{
    error::with_timeout,
    message::{Attachment, IncomingMessage},
    turn::{Part, Role, Turn},
};
use sauti_providers::extract::{youtube_video_id, DOCX_MIME};
use std::sync::LazyLock;
use tracing::warn;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'\]\)]+"#).expect("valid regex"));

/// How an attachment reaches the model.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum AttachmentRoute {
    /// Passed through as raw media.
    Media,
    /// Decoded into a text block first.
    Document,
    Unsupported,
}

pub(super) fn route_attachment(attachment: &Attachment) -> AttachmentRoute {
    let mime = attachment.mime_type.as_str();
    if attachment.is_image() || mime == "application/pdf" || mime.starts_with("audio/") {
        AttachmentRoute::Media
    } else if mime.starts_with("text/") || mime == "application/json" || mime == DOCX_MIME {
        AttachmentRoute::Document
    } else {
        AttachmentRoute::Unsupported
    }
}

/// First link in the text, with trailing sentence punctuation removed.
pub(super) fn first_url(text: &str) -> Option<&str> {
    URL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', '!', '?', ';', ':']))
}

/// Inline note standing in for a link that could not be read.
pub(super) fn fetch_error_note(url: &str, error: &impl std::fmt::Display) -> String {
    if youtube_video_id(url).is_some() {
        format!("[Error reading YouTube video: {error} (The video might not have captions)]")
    } else {
        format!("[Error reading website: {error}]")
    }
}

impl Gateway {
    pub(super) async fn build_user_turn(&self, incoming: &IncomingMessage) -> Turn {
        let mut parts = Vec::new();
        let text = incoming.text.trim();
        if !text.is_empty() {
            parts.push(Part::text(text));
        }

        if let Some(url) = first_url(text) {
            let fetched = with_timeout(
                self.settings.tools.timeout_secs,
                "page fetch",
                self.extractor.extract_url(url),
            )
            .await;
            match fetched {
                Ok(block) => parts.push(Part::text(block)),
                Err(e) => {
                    warn!("[{}] failed to read {url}: {e}", incoming.channel);
                    parts.push(Part::text(fetch_error_note(url, &e)));
                }
            }
        }

        if let Some(attachment) = &incoming.attachment {
            match route_attachment(attachment) {
                AttachmentRoute::Media => parts.push(Part::media(
                    attachment.mime_type.clone(),
                    attachment.data.clone(),
                )),
                AttachmentRoute::Document => {
                    match self
                        .extractor
                        .extract_document(&attachment.data, &attachment.mime_type)
                        .await
                    {
                        Ok(block) => parts.push(Part::text(block)),
                        Err(e) => {
                            warn!("[{}] failed to read attachment: {e}", incoming.channel);
                            parts.push(Part::text(format!("[Error reading file: {e}]")));
                        }
                    }
                }
                AttachmentRoute::Unsupported => parts.push(Part::text(format!(
                    "[Unsupported file type: {}]",
                    attachment.mime_type
                ))),
            }
        }

        Turn::new(Role::User, parts).unwrap_or_else(|_| Turn::user_text(text))
    }
}
