//! YouTube transcripts via the caption tracks listed on the watch page.

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Url;
use sauti_core::error::SautiError;
use serde::Deserialize;

/// Transcript text kept per video.
pub const TRANSCRIPT_MAX_CHARS: usize = 6000;

/// Video id of a youtube.com or youtu.be link.
pub fn youtube_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.");

    let id = if host == "youtu.be" {
        parsed.path_segments()?.next()?.to_string()
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        let mut segments = parsed.path_segments()?;
        match segments.next()? {
            "watch" => parsed
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())?,
            "shorts" | "embed" | "live" | "v" => segments.next()?.to_string(),
            _ => return None,
        }
    } else {
        return None;
    };

    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(id)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    #[serde(default)]
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

/// Caption URL from a watch page, preferring English and human-made tracks.
pub(super) fn caption_url(watch_html: &str) -> Option<String> {
    const KEY: &str = "\"captionTracks\":";
    let start = watch_html.find(KEY)? + KEY.len();
    // Parse the one JSON array that follows and ignore the rest of the page.
    let tracks: Vec<CaptionTrack> = serde_json::Deserializer::from_str(&watch_html[start..])
        .into_iter()
        .next()?
        .ok()?;

    let rank = |t: &CaptionTrack| {
        let english = t.language_code.starts_with("en");
        let generated = t.kind.as_deref() == Some("asr");
        match (english, generated) {
            (true, false) => 0,
            (true, true) => 1,
            (false, false) => 2,
            (false, true) => 3,
        }
    };
    tracks.into_iter().min_by_key(rank).map(|t| t.base_url)
}

/// Spoken text of a timedtext XML document, whitespace collapsed.
pub(super) fn transcript_text(xml: &str) -> Result<String, SautiError> {
    let mut reader = Reader::from_str(xml);
    let mut pieces: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"text" => in_text = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"text" => in_text = false,
            Ok(Event::Text(t)) if in_text => {
                let once = t
                    .unescape()
                    .map_err(|e| SautiError::Tool(format!("bad caption text: {e}")))?;
                // Caption text arrives escaped twice (`&amp;#39;`).
                let twice = quick_xml::escape::unescape(&once)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| once.to_string());
                pieces.push(twice);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SautiError::Tool(format!("malformed captions: {e}"))),
        }
    }

    Ok(pieces
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" "))
}

pub(super) fn tag_transcript(url: &str, text: &str) -> String {
    let (body, truncated) = super::cap_chars(text, TRANSCRIPT_MAX_CHARS);
    let ellipsis = if truncated { "..." } else { "" };
    format!("--- YOUTUBE VIDEO TRANSCRIPT ({url}) ---\n{body}{ellipsis}\n--- END TRANSCRIPT ---")
}
