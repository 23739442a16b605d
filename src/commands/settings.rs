//! Preference command handlers: /style, /voice.

use super::argument;
use sauti_core::traits::ProfileStore;

const MAX_STYLE_CHARS: usize = 40;

pub(super) async fn handle_style(profiles: &dyn ProfileStore, sender_id: &str, text: &str) -> String {
    let style = argument(text);
    if style.is_empty() {
        return match profiles.get_profile(sender_id).await {
            Ok(profile) => format!(
                "Current style: {}\nChange it with /style <name>.",
                profile.style
            ),
            Err(e) => format!("Error: {e}"),
        };
    }
    if style.chars().count() > MAX_STYLE_CHARS {
        return format!("Keep the style under {MAX_STYLE_CHARS} characters.");
    }

    let style = style.to_lowercase();
    match profiles.set_style(sender_id, &style).await {
        Ok(()) => format!("Got it, I'll keep things {style} from now on."),
        Err(e) => format!("Error: {e}"),
    }
}

pub(super) async fn handle_voice(profiles: &dyn ProfileStore, sender_id: &str, text: &str) -> String {
    let enabled = match argument(text).to_lowercase().as_str() {
        "on" | "yes" | "true" => true,
        "off" | "no" | "false" => false,
        "" => {
            return match profiles.get_profile(sender_id).await {
                Ok(p) => format!(
                    "Voice replies are {}. Use /voice on or /voice off.",
                    if p.voice_mode { "on" } else { "off" }
                ),
                Err(e) => format!("Error: {e}"),
            };
        }
        _ => return "Use /voice on or /voice off.".to_string(),
    };

    match profiles.set_voice_mode(sender_id, enabled).await {
        Ok(()) if enabled => "Voice replies on. I'll send a voice note with my answers.".to_string(),
        Ok(()) => "Voice replies off.".to_string(),
        Err(e) => format!("Error: {e}"),
    }
}
