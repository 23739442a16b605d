use serde::{Deserialize, Serialize};

use crate::turn::Turn;

/// Conversation context passed to a language-model provider.
///
/// The system prompt is rebuilt on every call and never stored; `history`
/// already ends with the turn being answered.
#[derive(Debug, Clone)]
pub struct Context {
    /// Per-call instructions (persona, profile, place/time, directive grammar).
    pub system_prompt: String,
    /// Conversation history, oldest first.
    pub history: Vec<Turn>,
    /// Ask the provider to ground the answer with web search.
    pub grounding: bool,
}

impl Context {
    /// Context for a single-shot question with no history.
    pub fn new(message: &str) -> Self {
        Self {
            system_prompt: String::new(),
            history: vec![Turn::user_text(message)],
            grounding: false,
        }
    }
}

/// A citation returned alongside a grounded reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
}

/// Metadata about how a reply was generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyMetadata {
    pub provider_used: String,
    pub tokens_used: Option<u64>,
    pub processing_time_ms: u64,
    pub model: Option<String>,
}

/// A language-model reply.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub sources: Vec<Source>,
    pub metadata: ReplyMetadata,
}

impl Completion {
    /// Render a sources footer, deduplicated by URL. Empty when there are no sources.
    pub fn sources_footer(&self) -> String {
        let mut seen = std::collections::HashSet::new();
        let lines: Vec<String> = self
            .sources
            .iter()
            .filter(|s| seen.insert(s.url.as_str()))
            .take(5)
            .map(|s| {
                if s.title.is_empty() {
                    format!("- {}", s.url)
                } else {
                    format!("- {} ({})", s.title, s.url)
                }
            })
            .collect();
        if lines.is_empty() {
            String::new()
        } else {
            format!("Sources:\n{}", lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::Role;

    #[test]
    fn test_context_new_has_single_user_turn() {
        let ctx = Context::new("hello");
        assert_eq!(ctx.history.len(), 1);
        assert_eq!(ctx.history[0].role(), Role::User);
        assert_eq!(ctx.history[0].text(), "hello");
        assert!(!ctx.grounding);
    }

    #[test]
    fn test_sources_footer_dedups() {
        let completion = Completion {
            text: "answer".into(),
            sources: vec![
                Source {
                    url: "https://a.example".into(),
                    title: "A".into(),
                },
                Source {
                    url: "https://a.example".into(),
                    title: "A again".into(),
                },
                Source {
                    url: "https://b.example".into(),
                    title: String::new(),
                },
            ],
            metadata: ReplyMetadata::default(),
        };
        let footer = completion.sources_footer();
        assert_eq!(
            footer,
            "Sources:\n- A (https://a.example)\n- https://b.example"
        );
    }

    #[test]
    fn test_sources_footer_empty() {
        assert!(Completion::default().sources_footer().is_empty());
    }
}
