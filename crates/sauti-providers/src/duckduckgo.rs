//! DuckDuckGo search: images, videos, and plain web links.
//!
//! No API key is required. Image and video search need a per-query `vqd`
//! token scraped from the landing page; web links come from the HTML endpoint.

use async_trait::async_trait;
use regex::Regex;
use sauti_core::{error::SautiError, traits::SearchBackend};
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::BROWSER_UA;

const DDG_BASE_URL: &str = "https://duckduckgo.com";
const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";

static VQD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"vqd=["']?([\d-]+)["']?"#).expect("valid regex"));

/// DuckDuckGo-backed search.
pub struct DuckDuckGo {
    client: reqwest::Client,
    timeout: Duration,
    /// Maximum results returned per image/video query.
    max_results: usize,
}

impl DuckDuckGo {
    pub fn new(timeout_secs: u64, max_results: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
            max_results: max_results.max(1),
        }
    }

    fn map_err(&self, what: &str, e: reqwest::Error) -> SautiError {
        if e.is_timeout() {
            SautiError::Timeout(format!("duckduckgo {what} after {}s", self.timeout.as_secs()))
        } else {
            SautiError::Tool(format!("duckduckgo {what} failed: {e}"))
        }
    }

    async fn get_text(&self, url: &str, what: &str) -> Result<String, SautiError> {
        let resp = self
            .client
            .get(url)
            .header("User-Agent", BROWSER_UA)
            .header("Referer", "https://duckduckgo.com/")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_err(what, e))?;

        if !resp.status().is_success() {
            return Err(SautiError::Tool(format!(
                "duckduckgo {what} returned {}",
                resp.status()
            )));
        }
        resp.text().await.map_err(|e| self.map_err(what, e))
    }

    /// Fetch the anti-bot token for a query.
    async fn vqd(&self, query: &str) -> Result<String, SautiError> {
        let url = format!("{DDG_BASE_URL}/?q={}", urlencoding::encode(query));
        let body = self.get_text(&url, "token").await?;
        extract_vqd(&body).ok_or_else(|| SautiError::Tool("duckduckgo: no vqd token".into()))
    }
}

#[derive(Deserialize)]
struct ImageResults {
    #[serde(default)]
    results: Vec<ImageResult>,
}

#[derive(Deserialize)]
struct ImageResult {
    image: Option<String>,
}

#[derive(Deserialize)]
struct VideoResults {
    #[serde(default)]
    results: Vec<VideoResult>,
}

#[derive(Deserialize)]
struct VideoResult {
    content: Option<String>,
}

fn extract_vqd(body: &str) -> Option<String> {
    VQD_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn is_youtube(url: &str) -> bool {
    url.contains("youtube.com/") || url.contains("youtu.be/")
}

/// Result links from the HTML endpoint. DDG wraps targets in a redirect
/// (`//duckduckgo.com/l/?uddg=<encoded>`), which is unwrapped here.
fn parse_result_links(html: &str, limit: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(link_selector) = Selector::parse("a.result__a") else {
        return Vec::new();
    };

    let mut links: Vec<String> = Vec::new();
    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let target = unwrap_redirect(href);
        if target.starts_with("http") && !links.contains(&target) {
            links.push(target);
        }
        if links.len() >= limit {
            break;
        }
    }
    links
}

fn unwrap_redirect(href: &str) -> String {
    if let Some(idx) = href.find("uddg=") {
        let encoded = &href[idx + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    href.to_string()
}

#[async_trait]
impl SearchBackend for DuckDuckGo {
    async fn images(&self, query: &str, animated: bool) -> Result<Vec<String>, SautiError> {
        let vqd = self.vqd(query).await?;
        let filter = if animated { ",,,type:gif,," } else { "" };
        let url = format!(
            "{DDG_BASE_URL}/i.js?l=wt-wt&o=json&p=1&q={}&vqd={}&f={}",
            urlencoding::encode(query),
            vqd,
            urlencoding::encode(filter)
        );
        debug!("duckduckgo: image search '{query}' (animated={animated})");

        let body = self.get_text(&url, "image search").await?;
        let parsed: ImageResults = serde_json::from_str(&body)?;
        let urls: Vec<String> = parsed
            .results
            .into_iter()
            .filter_map(|r| r.image)
            .filter(|u| u.starts_with("http"))
            .take(self.max_results)
            .collect();
        info!("duckduckgo: {} image result(s) for '{query}'", urls.len());
        Ok(urls)
    }

    async fn videos(&self, query: &str) -> Result<Vec<String>, SautiError> {
        let vqd = self.vqd(query).await?;
        let url = format!(
            "{DDG_BASE_URL}/v.js?l=wt-wt&o=json&p=1&q={}&vqd={}",
            urlencoding::encode(query),
            vqd
        );
        debug!("duckduckgo: video search '{query}'");

        let body = self.get_text(&url, "video search").await?;
        let parsed: VideoResults = serde_json::from_str(&body)?;
        Ok(parsed
            .results
            .into_iter()
            .filter_map(|r| r.content)
            .filter(|u| is_youtube(u))
            .take(self.max_results)
            .collect())
    }

    async fn links(&self, query: &str, limit: usize) -> Result<Vec<String>, SautiError> {
        let url = format!("{DDG_HTML_URL}?q={}", urlencoding::encode(query));
        debug!("duckduckgo: web search '{query}' limit={limit}");
        let html = self.get_text(&url, "web search").await?;
        Ok(parse_result_links(&html, limit))
    }
}
