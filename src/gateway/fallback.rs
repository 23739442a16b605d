//! User-facing fallback text. Every failure the pipeline recovers from is
//! rendered here so the wording stays in one place.

use crate::directives::Directive;
use crate::tools::{stock, Substitution, ToolFailure};

/// Reply when the model call fails or times out.
pub const GENERATION_FALLBACK: &str =
    "I'm having trouble thinking right now. Please try again later.";

/// Reply when the model answered with nothing but tags or markers.
pub const EMPTY_REPLY: &str = "👍";

/// Research found no links to read.
pub const RESEARCH_NO_SOURCES: &str = "I couldn't find any sources for that topic.";

/// Render one tool outcome as a line appended after the reply text.
pub fn render(directive: &Directive, outcome: &Result<Substitution, ToolFailure>) -> String {
    match outcome {
        Ok(Substitution::ReminderSet { when, task }) => {
            format!("⏰ Reminder set ({when}): {task}")
        }
        Ok(Substitution::Media { url }) | Ok(Substitution::Video { url }) => url.clone(),
        Ok(Substitution::Quote(quote)) => stock::format_quote(quote),
        Err(failure) => placeholder(directive, failure),
    }
}

fn placeholder(directive: &Directive, failure: &ToolFailure) -> String {
    match (directive, failure) {
        (Directive::Remind { when, .. }, ToolFailure::Unparseable) => {
            format!("⚠️ I couldn't understand the time \"{when}\", so I didn't set a reminder.")
        }
        (Directive::Remind { when, .. }, ToolFailure::Past) => {
            format!("⚠️ \"{when}\" has already passed, so I didn't set a reminder.")
        }
        (Directive::Remind { .. }, _) => {
            "⚠️ I couldn't save that reminder. Please try again.".to_string()
        }
        (Directive::Gif { .. }, _) => "(I couldn't find a GIF for that one 😅)".to_string(),
        (Directive::Img { .. }, _) => "(I couldn't find a picture for that one 😅)".to_string(),
        (Directive::Video { .. }, _) => "(I couldn't find a video for that one 😅)".to_string(),
        (Directive::Stock { symbol }, _) => format!(
            "(I couldn't get a price for {} right now)",
            symbol.replace(['[', ']'], "").trim().to_uppercase()
        ),
    }
}

/// Join cleaned reply text and substitution lines, one per line.
pub fn compose(text: &str, lines: &[String]) -> String {
    let mut out = text.trim().to_string();
    for line in lines {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

/// Attach a sources footer after a blank line.
pub fn with_footer(body: &str, footer: &str) -> String {
    if footer.is_empty() {
        body.to_string()
    } else {
        format!("{body}\n\n{footer}")
    }
}
