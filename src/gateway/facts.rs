//! Second-pass fact extraction, triggered by the fact sentinel.

use crate::directives::strip_fact_sentinel;
use sauti_core::{
    context::Context,
    error::{with_timeout, SautiError},
    traits::Provider,
    turn::Turn,
};

const EXTRACTION_PROMPT: &str = "The user just told you something about themselves. \
Write the single new personal fact from their message as one short third-person phrase \
about the user, for example: user's dog is named Rex. \
Reply with the fact only. If there is no personal fact, reply NONE.";

/// Ask the model for the bare fact in one user turn. Only that turn is sent.
pub async fn extract_fact(
    provider: &dyn Provider,
    user_turn: &Turn,
    timeout_secs: u64,
) -> Result<Option<String>, SautiError> {
    let context = Context {
        system_prompt: EXTRACTION_PROMPT.to_string(),
        history: vec![user_turn.clone()],
        grounding: false,
    };
    let completion = with_timeout(timeout_secs, "fact extraction", provider.complete(&context)).await?;
    Ok(clean_fact(&completion.text))
}

/// Normalize the extraction reply. `None` when there is no usable fact.
pub fn clean_fact(raw: &str) -> Option<String> {
    let stripped = strip_fact_sentinel(raw);
    let line = stripped.lines().find(|l| !l.trim().is_empty())?;
    let line = line.trim().trim_start_matches(['-', '*', '•']).trim();
    let line = line
        .strip_prefix("Fact:")
        .or_else(|| line.strip_prefix("fact:"))
        .unwrap_or(line)
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`'))
        .trim_end_matches('.')
        .trim();

    if line.is_empty() || line.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(line.to_string())
    }
}
