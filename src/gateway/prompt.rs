//! Per-turn system instructions. Rebuilt for every call, never stored.

use super::Settings;
use crate::directives::FACT_SENTINEL;
use chrono::{DateTime, Utc};
use sauti_core::records::UserProfile;

/// Assemble persona, profile, place and time, and the directive grammar.
pub fn build_system_prompt(settings: &Settings, profile: &UserProfile, now: DateTime<Utc>) -> String {
    let mut prompt = settings.persona.trim().to_string();

    prompt.push_str(&format!(
        "\n\nSpeak to this user in a {} style.",
        profile.style
    ));

    if profile.facts.is_empty() {
        prompt.push_str("\n\nYou don't know anything about this user yet.");
    } else {
        prompt.push_str("\n\nWhat you know about this user:");
        for fact in &profile.facts {
            prompt.push_str(&format!("\n- {fact}"));
        }
    }

    let local = now.with_timezone(&settings.tz);
    prompt.push_str(&format!(
        "\n\nYou are in {}. Current local time: {} ({}).",
        settings.location,
        local.format("%A, %d %B %Y %H:%M"),
        settings.tz.name(),
    ));

    prompt.push_str(
        "\n\nYou can use these tags anywhere in your reply. They are replaced automatically:\n\
         - [REMIND: <time> | <task>] sets a reminder, e.g. [REMIND: in 10 minutes | drink water] \
         or [REMIND: tomorrow at 8am | call mum]\n\
         - [GIF: <search words>] attaches a GIF\n\
         - [IMG: <search words>] attaches a picture\n\
         - [VIDEO: <search words>] attaches a YouTube video\n\
         - [STOCK: <ticker>] shows the latest price, e.g. [STOCK: SCOM] or [STOCK: BTC-USD]\n\
         Use each tag at most once per reply. Never explain the tags to the user.",
    );

    prompt.push_str(&format!(
        "\n\nIf the user's latest message tells you something new and lasting about them \
         (name, family, pets, work, likes, plans), end your reply with {FACT_SENTINEL}."
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_prompt_sections() {
        let settings = Settings::default();
        let mut profile = UserProfile::empty("u1");
        profile.style = "formal".into();
        profile.facts.push("user's dog is named Rex".into());
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();

        let prompt = build_system_prompt(&settings, &profile, now);
        assert!(prompt.starts_with(settings.persona.trim()));
        assert!(prompt.contains("formal style"));
        assert!(prompt.contains("- user's dog is named Rex"));
        assert!(prompt.contains("Monday, 02 March 2026 13:00"));
        assert!(prompt.contains("Africa/Nairobi"));
        assert!(prompt.contains("[REMIND: <time> | <task>]"));
        assert!(prompt.contains("[STOCK: <ticker>]"));
        assert!(prompt.contains(FACT_SENTINEL));
    }

    #[test]
    fn test_prompt_without_facts() {
        let prompt = build_system_prompt(
            &Settings::default(),
            &UserProfile::empty("u1"),
            Utc::now(),
        );
        assert!(prompt.contains("don't know anything about this user"));
        assert!(prompt.contains("friendly style"));
    }
}
