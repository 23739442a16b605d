//! # sauti-providers
//!
//! Concrete adapters behind the `sauti-core` traits: the Gemini language
//! model, DuckDuckGo search, Yahoo Finance quotes, page/document extraction,
//! and OpenAI text-to-speech.

pub mod duckduckgo;
pub mod extract;
pub mod gemini;
pub mod speech;
pub mod yahoo;

/// Desktop browser user agent; several upstreams reject default client strings.
pub(crate) const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
