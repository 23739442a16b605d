//! `/research <topic>`: search, read the top pages, write one report.

use super::fallback::RESEARCH_NO_SOURCES;
use super::Gateway;
use sauti_core::{context::Context, error::with_timeout, turn::Turn};
use tracing::{info, warn};

const RESEARCH_SOURCES: usize = 3;

const REPORT_PROMPT: &str = "You are an expert research analyst. Read the raw data below, \
collected from several websites, and write a well-structured report.\n\n\
Format:\n\
- **Title**\n\
- **Executive Summary**\n\
- **Key Findings** (bulleted facts)\n\
- **Analysis**\n\
- **Conclusion & Recommendation**\n\
- **Sources** (the URLs used)\n\n\
Tone: professional, insightful and clear.";

impl Gateway {
    pub(super) async fn research(&self, topic: &str) -> String {
        let timeout = self.settings.tools.timeout_secs;
        let links = match with_timeout(
            timeout,
            "research search",
            self.search.links(topic, RESEARCH_SOURCES),
        )
        .await
        {
            Ok(links) => links,
            Err(e) => {
                warn!("research search failed for '{topic}': {e}");
                return format!("Research failed: {e}");
            }
        };
        if links.is_empty() {
            return RESEARCH_NO_SOURCES.to_string();
        }
        info!("researching '{topic}' from {} sources", links.len());

        let mut raw = format!("RESEARCH TOPIC: {topic}\n");
        for url in &links {
            match with_timeout(timeout, "page fetch", self.extractor.extract_url(url)).await {
                Ok(block) => raw.push_str(&block),
                Err(e) => {
                    warn!("research could not read {url}: {e}");
                    raw.push_str(&format!("[Error reading website: {e}]"));
                }
            }
            raw.push('\n');
        }

        let context = Context {
            system_prompt: REPORT_PROMPT.to_string(),
            history: vec![Turn::user_text(raw)],
            grounding: false,
        };
        match with_timeout(
            self.settings.generation_timeout_secs,
            "research report",
            self.provider.complete(&context),
        )
        .await
        {
            Ok(completion) => completion.text,
            Err(e) => {
                warn!("research report failed for '{topic}': {e}");
                format!("Research failed: {e}")
            }
        }
    }
}
