//! Information command handlers: /help, /facts.

use sauti_core::traits::ProfileStore;

pub(super) fn handle_help(agent_name: &str) -> String {
    format!(
        "*{agent_name}*\n\n\
         Just talk to me. I can find GIFs, pictures and videos, check stock prices, \
         set reminders and read links or files you send.\n\n\
         /facts - What I remember about you\n\
         /style <name> - How I talk to you (e.g. friendly, formal, sarcastic)\n\
         /voice on|off - Voice replies\n\
         /reminders - Your pending reminders\n\
         /research <topic> - A short research report\n\
         /forget - Clear our conversation history\n\
         /help - This message"
    )
}

pub(super) async fn handle_facts(profiles: &dyn ProfileStore, sender_id: &str) -> String {
    match profiles.get_profile(sender_id).await {
        Ok(profile) if profile.facts.is_empty() => {
            "I don't know anything about you yet.".to_string()
        }
        Ok(profile) => {
            let mut out = "Here's what I remember about you:\n".to_string();
            for fact in &profile.facts {
                out.push_str(&format!("\n- {}", escape_md(fact)));
            }
            out
        }
        Err(e) => format!("Error: {e}"),
    }
}

/// Escape Telegram Markdown control characters in user-sourced text.
pub(super) fn escape_md(text: &str) -> String {
    text.replace('*', "\\*")
        .replace('_', "\\_")
        .replace('`', "\\`")
}
