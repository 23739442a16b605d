//! Reminder and history command handlers: /reminders, /forget.

use super::status::escape_md;
use chrono_tz::Tz;
use sauti_core::traits::{HistoryStore, ReminderStore};

pub(super) async fn handle_reminders(reminders: &dyn ReminderStore, sender_id: &str, tz: Tz) -> String {
    match reminders.reminders_for(sender_id).await {
        Ok(pending) if pending.is_empty() => "No pending reminders.".to_string(),
        Ok(pending) => {
            let mut out = "Pending reminders:\n".to_string();
            for r in &pending {
                let due = r.due_at.with_timezone(&tz).format("%a %d %b %H:%M");
                out.push_str(&format!("\n- {due}: {}", escape_md(&r.text)));
            }
            out
        }
        Err(e) => format!("Error: {e}"),
    }
}

pub(super) async fn handle_forget(history: &dyn HistoryStore, sender_id: &str) -> String {
    match history.clear_history(sender_id).await {
        Ok(0) => "There was nothing to forget.".to_string(),
        Ok(n) => format!("Done. I cleared {n} messages from our conversation."),
        Err(e) => format!("Error: {e}"),
    }
}
