//! Web page, YouTube and document text extraction.
//!
//! Output blocks are tagged with their source so the model can tell pasted
//! material apart from the user's own words.

mod docx;
mod youtube;

pub use docx::DOCX_MIME;
pub use youtube::youtube_video_id;

use async_trait::async_trait;
use sauti_core::{error::SautiError, traits::Extractor};
use scraper::{Html, Node};
use std::time::Duration;
use tracing::debug;

use crate::BROWSER_UA;

/// Fetches pages over HTTP and decodes text documents.
pub struct WebExtractor {
    client: reqwest::Client,
    timeout: Duration,
    max_chars: usize,
}

impl WebExtractor {
    pub fn new(timeout_secs: u64, max_chars: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
            max_chars,
        }
    }
}

/// Visible text of an HTML document, skipping script, style and noscript
/// subtrees, one trimmed non-empty line per text run.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines: Vec<String> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript" | "head"))
        });
        if skipped {
            continue;
        }
        for line in text.lines() {
            for phrase in line.split("  ") {
                let phrase = phrase.trim();
                if !phrase.is_empty() {
                    lines.push(phrase.to_string());
                }
            }
        }
    }
    lines.join("\n")
}

/// Cap text at `max` characters on a char boundary.
pub fn cap_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

fn tag_website(url: &str, text: &str, max: usize) -> String {
    let (body, truncated) = cap_chars(text, max);
    let ellipsis = if truncated { "..." } else { "" };
    format!("--- WEBSITE CONTENT START ({url}) ---\n{body}{ellipsis}\n--- WEBSITE CONTENT END ---")
}

fn tag_document(mime_type: &str, text: &str, max: usize) -> String {
    let (body, truncated) = cap_chars(text, max);
    let ellipsis = if truncated { "..." } else { "" };
    format!("--- START OF DOCUMENT ({mime_type}) ---\n{body}{ellipsis}\n--- END OF DOCUMENT ---")
}

fn tag_word(text: &str, max: usize) -> String {
    let (body, truncated) = cap_chars(text, max);
    let ellipsis = if truncated { "..." } else { "" };
    format!("--- START OF WORD DOC CONTENT ---\n{body}{ellipsis}\n--- END OF WORD DOC CONTENT ---")
}

impl WebExtractor {
    /// GET a URL and return its body and whether it is HTML.
    async fn fetch(&self, url: &str) -> Result<(String, bool), SautiError> {
        debug!("extract: fetching {url}");
        let resp = self
            .client
            .get(url)
            .header("User-Agent", BROWSER_UA)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SautiError::Timeout(format!("fetching {url} after {}s", self.timeout.as_secs()))
                } else {
                    SautiError::Tool(format!("fetching {url} failed: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            return Err(SautiError::Tool(format!("{url} returned {}", resp.status())));
        }

        let is_html = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);
        let body = resp
            .text()
            .await
            .map_err(|e| SautiError::Tool(format!("reading {url} failed: {e}")))?;

        Ok((body, is_html))
    }

    async fn youtube_transcript(&self, url: &str, video_id: &str) -> Result<String, SautiError> {
        let watch = format!("https://www.youtube.com/watch?v={video_id}");
        let (page, _) = self.fetch(&watch).await?;
        let captions = youtube::caption_url(&page)
            .ok_or_else(|| SautiError::Tool("no caption tracks".into()))?;
        let (xml, _) = self.fetch(&captions).await?;
        let text = youtube::transcript_text(&xml)?;
        if text.is_empty() {
            return Err(SautiError::Tool("empty transcript".into()));
        }
        Ok(youtube::tag_transcript(url, &text))
    }
}

#[async_trait]
impl Extractor for WebExtractor {
    async fn extract_url(&self, url: &str) -> Result<String, SautiError> {
        if let Some(video_id) = youtube_video_id(url) {
            return self.youtube_transcript(url, &video_id).await;
        }
        let (body, is_html) = self.fetch(url).await?;
        let text = if is_html { html_to_text(&body) } else { body };
        Ok(tag_website(url, &text, self.max_chars))
    }

    async fn extract_document(&self, data: &[u8], mime_type: &str) -> Result<String, SautiError> {
        if mime_type.starts_with("text/") || mime_type == "application/json" {
            let text = String::from_utf8_lossy(data);
            let text = if mime_type == "text/html" {
                html_to_text(&text)
            } else {
                text.into_owned()
            };
            return Ok(tag_document(mime_type, &text, self.max_chars));
        }
        if mime_type == DOCX_MIME {
            let text = docx::docx_to_text(data)?;
            return Ok(tag_word(&text, self.max_chars));
        }
        Err(SautiError::Tool(format!(
            "unsupported document type {mime_type}"
        )))
    }
}
