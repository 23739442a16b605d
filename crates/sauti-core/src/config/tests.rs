use super::*;
use std::collections::HashMap;

#[test]
fn test_defaults_match_documented_values() {
    let cfg = Config::default();
    assert_eq!(cfg.memory.history_capacity, 30);
    assert_eq!(cfg.scheduler.poll_interval_secs, 60);
    assert!(cfg.scheduler.enabled);
    assert_eq!(cfg.tools.media_pool, 10);
    assert_eq!(cfg.tools.local_exchange_suffix, ".NR");
    assert_eq!(cfg.tools.local_tickers.len(), 6);
    assert_eq!(cfg.delivery.max_chunk_chars, 2000);
    assert_eq!(cfg.voice.max_chars, 2000);
    assert_eq!(cfg.provider.default, "gemini");
}

#[test]
fn test_partial_toml_fills_defaults() {
    let toml_str = r#"
        [sauti]
        name = "Rafiki"

        [memory]
        history_capacity = 12

        [provider.gemini]
        api_key = "abc"
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.sauti.name, "Rafiki");
    assert_eq!(cfg.sauti.timezone, "Africa/Nairobi");
    assert_eq!(cfg.memory.history_capacity, 12);
    let gemini = cfg.provider.gemini.unwrap();
    assert_eq!(gemini.api_key, "abc");
    assert_eq!(gemini.model, "gemini-2.0-flash");
    assert!(gemini.grounding);
}

#[test]
fn test_timezone_parse() {
    let cfg = SautiConfig::default();
    assert_eq!(cfg.tz().unwrap(), chrono_tz::Africa::Nairobi);

    let bad = SautiConfig {
        timezone: "Mars/Olympus".into(),
        ..Default::default()
    };
    assert!(bad.tz().is_err());
}

#[test]
fn test_env_overrides_fill_only_empty_secrets() {
    let env: HashMap<&str, &str> = [
        ("GEMINI_API_KEY", "from-env"),
        ("OPENAI_API_KEY", "openai-env"),
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
    ]
    .into_iter()
    .collect();

    let mut cfg = Config::default();
    cfg.voice.api_key = "configured".into();
    cfg.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

    assert_eq!(cfg.provider.gemini.as_ref().unwrap().api_key, "from-env");
    assert_eq!(cfg.voice.api_key, "configured");
    let tg = cfg.channel.telegram.unwrap();
    assert_eq!(tg.bot_token, "123:abc");
    assert!(tg.enabled);
}

#[test]
fn test_env_overrides_noop_without_vars() {
    let mut cfg = Config::default();
    cfg.apply_env_overrides(|_| None);
    assert!(cfg.channel.telegram.is_none());
    assert!(cfg.provider.gemini.unwrap().api_key.is_empty());
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load("/nonexistent/sauti/config.toml").unwrap();
    assert_eq!(cfg.sauti.name, "Sauti");
}

#[test]
fn test_shellexpand_leaves_plain_paths() {
    assert_eq!(shellexpand("/tmp/x.db"), "/tmp/x.db");
    assert_eq!(shellexpand("relative/x.db"), "relative/x.db");
}
