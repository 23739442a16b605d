//! Inline tool directives and the fact sentinel embedded in model replies.
//!
//! Grammar: `[KIND: arg]`, or `[REMIND: time | task]`. KIND is matched
//! case-insensitively. Only the first well-formed directive of each kind is
//! extracted and its span removed; later duplicates and malformed spans stay
//! in the text untouched.


use regex::Regex;
use std::sync::LazyLock;

/// Marker the model appends when the user shared a new personal fact.
pub const FACT_SENTINEL: &str = "[NEW_FACT]";

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(REMIND|GIF|IMG|VIDEO|STOCK)\s*:([^\]]*)\]").expect("valid regex")
});

static SENTINEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[\s*NEW_FACT\s*\]").expect("valid regex"));

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Directive kinds, in the order their substitutions are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DirectiveKind {
    Remind,
    Gif,
    Img,
    Video,
    Stock,
}

impl DirectiveKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "REMIND" => Some(Self::Remind),
            "GIF" => Some(Self::Gif),
            "IMG" => Some(Self::Img),
            "VIDEO" => Some(Self::Video),
            "STOCK" => Some(Self::Stock),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remind => "REMIND",
            Self::Gif => "GIF",
            Self::Img => "IMG",
            Self::Video => "VIDEO",
            Self::Stock => "STOCK",
        }
    }
}

/// A parsed tool request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Remind { when: String, task: String },
    Gif { query: String },
    Img { query: String },
    Video { query: String },
    Stock { symbol: String },
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Self::Remind { .. } => DirectiveKind::Remind,
            Self::Gif { .. } => DirectiveKind::Gif,
            Self::Img { .. } => DirectiveKind::Img,
            Self::Video { .. } => DirectiveKind::Video,
            Self::Stock { .. } => DirectiveKind::Stock,
        }
    }

    /// Build a directive from its kind and raw argument text.
    /// Returns `None` when the argument does not fit the kind's arity.
    fn build(kind: DirectiveKind, arg: &str) -> Option<Self> {
        let arg = arg.trim();
        if arg.is_empty() {
            return None;
        }
        match kind {
            DirectiveKind::Remind => {
                let (when, task) = arg.split_once('|')?;
                let (when, task) = (when.trim(), task.trim());
                if when.is_empty() || task.is_empty() {
                    return None;
                }
                Some(Self::Remind {
                    when: when.to_string(),
                    task: task.to_string(),
                })
            }
            DirectiveKind::Gif => Some(Self::Gif {
                query: arg.to_string(),
            }),
            DirectiveKind::Img => Some(Self::Img {
                query: arg.to_string(),
            }),
            DirectiveKind::Video => Some(Self::Video {
                query: arg.to_string(),
            }),
            DirectiveKind::Stock => Some(Self::Stock {
                symbol: arg.to_string(),
            }),
        }
    }
}

/// Result of parsing a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Reply text with extracted directive spans removed.
    pub text: String,
    /// At most one directive per kind, ordered by kind.
    pub directives: Vec<Directive>,
}

/// Extract directives from a reply. Pure; never fails.
pub fn parse_directives(text: &str) -> ParsedReply {
    let mut directives: Vec<Directive> = Vec::new();
    let mut cleaned = String::with_capacity(text.len());
    let mut last = 0;

    for caps in DIRECTIVE_RE.captures_iter(text) {
        let (Some(whole), Some(tag), Some(arg)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(kind) = DirectiveKind::from_tag(tag.as_str()) else {
            continue;
        };
        if directives.iter().any(|d| d.kind() == kind) {
            continue;
        }
        let Some(directive) = Directive::build(kind, arg.as_str()) else {
            continue;
        };

        cleaned.push_str(&text[last..whole.start()]);
        last = whole.end();
        // Avoid a double space where a mid-sentence span was cut out.
        if cleaned.ends_with(' ') && text[last..].starts_with(' ') {
            last += 1;
        }
        directives.push(directive);
    }
    cleaned.push_str(&text[last..]);

    directives.sort_by_key(Directive::kind);
    ParsedReply {
        text: tidy(&cleaned),
        directives,
    }
}

/// Whether the reply flags a new fact.
pub fn has_fact_sentinel(text: &str) -> bool {
    SENTINEL_RE.is_match(text)
}

/// Remove every fact sentinel from the text.
pub fn strip_fact_sentinel(text: &str) -> String {
    tidy(&SENTINEL_RE.replace_all(text, ""))
}

/// Trim trailing spaces left behind by removed spans and collapse blank runs.
fn tidy(text: &str) -> String {
    let joined = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN_RE.replace_all(&joined, "\n\n").trim().to_string()
}
