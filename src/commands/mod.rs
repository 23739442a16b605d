//! Built-in chat commands. Instant responses, no model call except `/research`.

mod settings;
mod status;
mod tasks;


use chrono_tz::Tz;
use sauti_core::traits::{HistoryStore, ProfileStore, ReminderStore};

/// Grouped context for command execution.
pub struct CommandContext<'a> {
    pub profiles: &'a dyn ProfileStore,
    pub history: &'a dyn HistoryStore,
    pub reminders: &'a dyn ReminderStore,
    pub sender_id: &'a str,
    pub text: &'a str,
    pub agent_name: &'a str,
    pub tz: Tz,
}

/// Known bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Facts,
    Style,
    Voice,
    Forget,
    Reminders,
    Research,
}

impl Command {
    /// Parse a command from message text. Returns `None` for unknown `/` prefixes
    /// (which should pass through to the model).
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        // Strip @botname suffix (e.g. "/help@sauti_bot" → "/help").
        let cmd = first.split('@').next().unwrap_or(first);
        match cmd {
            "/help" | "/start" => Some(Self::Help),
            "/facts" => Some(Self::Facts),
            "/style" => Some(Self::Style),
            "/voice" => Some(Self::Voice),
            "/forget" => Some(Self::Forget),
            "/reminders" => Some(Self::Reminders),
            "/research" => Some(Self::Research),
            _ => None,
        }
    }
}

/// Everything after the command word, trimmed.
pub fn argument(text: &str) -> &str {
    let trimmed = text.trim_start();
    match trimmed.find(char::is_whitespace) {
        Some(idx) => trimmed[idx..].trim(),
        None => "",
    }
}

/// Handle a command and return the response text.
pub async fn handle(cmd: Command, ctx: &CommandContext<'_>) -> String {
    match cmd {
        Command::Help => status::handle_help(ctx.agent_name),
        Command::Facts => status::handle_facts(ctx.profiles, ctx.sender_id).await,
        Command::Style => settings::handle_style(ctx.profiles, ctx.sender_id, ctx.text).await,
        Command::Voice => settings::handle_voice(ctx.profiles, ctx.sender_id, ctx.text).await,
        Command::Forget => tasks::handle_forget(ctx.history, ctx.sender_id).await,
        Command::Reminders => tasks::handle_reminders(ctx.reminders, ctx.sender_id, ctx.tz).await,
        // Research with a topic is run by the gateway; reaching here means no topic.
        Command::Research => "Usage: /research <topic>".to_string(),
    }
}
