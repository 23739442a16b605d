pub(super) fn default_name() -> String {
    "Sauti".to_string()
}
pub(super) fn default_data_dir() -> String {
    "~/.sauti".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_persona() -> String {
    "You are Sauti, a warm and witty personal assistant. You chat naturally, \
     keep answers short unless asked for detail, and remember what people tell you."
        .to_string()
}
pub(super) fn default_location() -> String {
    "Nairobi, Kenya".to_string()
}
pub(super) fn default_timezone() -> String {
    "Africa/Nairobi".to_string()
}
pub(super) fn default_provider() -> String {
    "gemini".to_string()
}
pub(super) fn default_true() -> bool {
    true
}
pub(super) fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}
pub(super) fn default_generation_timeout() -> u64 {
    60
}
pub(super) fn default_db_path() -> String {
    "~/.sauti/data/memory.db".to_string()
}
pub(super) fn default_history_capacity() -> usize {
    30
}
pub(super) fn default_poll_interval() -> u64 {
    60
}
pub(super) fn default_tool_timeout() -> u64 {
    10
}
pub(super) fn default_media_pool() -> usize {
    10
}
pub(super) fn default_local_tickers() -> Vec<String> {
    ["SCOM", "KCB", "EQTY", "EABL", "BAT", "COOP"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
pub(super) fn default_exchange_suffix() -> String {
    ".NR".to_string()
}
pub(super) fn default_extract_max_chars() -> usize {
    5000
}
pub(super) fn default_tts_model() -> String {
    "tts-1".to_string()
}
pub(super) fn default_tts_voice() -> String {
    "alloy".to_string()
}
pub(super) fn default_voice_max_chars() -> usize {
    2000
}
pub(super) fn default_chunk_chars() -> usize {
    2000
}
