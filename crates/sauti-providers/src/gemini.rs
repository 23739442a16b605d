//! Google Gemini API provider.
//!
//! Calls the Gemini `generateContent` endpoint. Auth via URL query param.
//! Turns are sent as multi-part contents (text and inline media), and the
//! Google Search tool is attached when grounding is requested.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use sauti_core::{
    context::{Completion, Context, ReplyMetadata, Source},
    error::SautiError,
    traits::Provider,
    turn::{Part, Role, Turn},
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiProvider {
    /// Create from config values.
    pub fn from_config(api_key: String, model: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiReplyContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct GeminiReplyContent {
    #[serde(default)]
    parts: Vec<GeminiReplyPart>,
}

#[derive(Deserialize)]
struct GeminiReplyPart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    web: Option<GroundingWeb>,
}

#[derive(Deserialize)]
struct GroundingWeb {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    total_token_count: u64,
}

fn to_content(turn: &Turn) -> GeminiContent {
    let role = match turn.role() {
        Role::User => "user",
        Role::Agent => "model",
    };
    let parts = turn
        .parts()
        .iter()
        .map(|p| match p {
            Part::Text { text } => GeminiPart::Text { text: text.clone() },
            Part::Media { mime_type, data } => GeminiPart::Inline {
                inline_data: GeminiBlob {
                    mime_type: mime_type.clone(),
                    data: STANDARD.encode(data),
                },
            },
        })
        .collect();
    GeminiContent {
        role: Some(role.to_string()),
        parts,
    }
}

fn build_request(context: &Context) -> GeminiRequest {
    let system_instruction = if context.system_prompt.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text {
                text: context.system_prompt.clone(),
            }],
        })
    };

    let tools = if context.grounding {
        vec![GeminiTool {
            google_search: serde_json::json!({}),
        }]
    } else {
        Vec::new()
    };

    GeminiRequest {
        contents: context.history.iter().map(to_content).collect(),
        system_instruction,
        tools,
    }
}

/// Reply text (all text parts concatenated) and deduplicated citations.
fn read_candidate(parsed: &GeminiResponse) -> Option<(String, Vec<Source>)> {
    let candidate = parsed.candidates.as_ref()?.first()?;
    let text: String = candidate
        .content
        .as_ref()?
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    if text.trim().is_empty() {
        return None;
    }

    let mut sources: Vec<Source> = Vec::new();
    if let Some(meta) = &candidate.grounding_metadata {
        for chunk in &meta.grounding_chunks {
            let Some(web) = &chunk.web else { continue };
            let Some(uri) = &web.uri else { continue };
            if sources.iter().any(|s| &s.url == uri) {
                continue;
            }
            sources.push(Source {
                url: uri.clone(),
                title: web.title.clone().unwrap_or_default(),
            });
        }
    }
    Some((text, sources))
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    async fn complete(&self, context: &Context) -> Result<Completion, SautiError> {
        let effective_model = self.model.as_str();
        let start = Instant::now();
        let body = build_request(context);

        let url = format!(
            "{GEMINI_BASE_URL}/models/{effective_model}:generateContent?key={}",
            self.api_key
        );
        debug!(
            "gemini: POST models/{effective_model}:generateContent ({} turns, grounding={})",
            context.history.len(),
            context.grounding
        );

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SautiError::Timeout(format!("gemini after {}s", self.timeout.as_secs()))
                } else {
                    SautiError::Provider(format!("gemini request failed: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SautiError::Provider(format!(
                "gemini returned {status}: {text}"
            )));
        }

        let parsed: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| SautiError::Provider(format!("gemini: failed to parse response: {e}")))?;

        let (text, sources) = read_candidate(&parsed)
            .ok_or_else(|| SautiError::Provider("gemini returned no text".into()))?;

        let tokens = parsed.usage_metadata.as_ref().map(|u| u.total_token_count);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        Ok(Completion {
            text,
            sources,
            metadata: ReplyMetadata {
                provider_used: "gemini".to_string(),
                tokens_used: tokens,
                processing_time_ms: elapsed_ms,
                model: Some(effective_model.to_string()),
            },
        })
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("gemini: no API key configured");
            return false;
        }
        let url = format!("{GEMINI_BASE_URL}/models?key={}", self.api_key);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("gemini not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_provider_name() {
        let p = GeminiProvider::from_config("AIza-test".into(), "gemini-2.0-flash".into(), 60);
        assert_eq!(p.name(), "gemini");
        assert!(p.requires_api_key());
    }

    #[test]
    fn test_request_maps_roles_and_media() {
        let ctx = Context {
            system_prompt: "Be helpful.".into(),
            history: vec![
                Turn::user_text("Hi"),
                Turn::agent_text("Hello!"),
                Turn::new(
                    Role::User,
                    vec![Part::text("what is this"), Part::media("image/png", vec![1, 2])],
                )
                .unwrap(),
            ],
            grounding: false,
        };
        let json = serde_json::to_value(build_request(&ctx)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be helpful.");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][0]["text"], "what is this");
        assert_eq!(
            json["contents"][2]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(json["contents"][2]["parts"][1]["inlineData"]["data"], "AQI=");
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_request_grounding_adds_search_tool() {
        let mut ctx = Context::new("news today?");
        ctx.grounding = true;
        let json = serde_json::to_value(build_request(&ctx)).unwrap();
        assert!(json["tools"][0].get("googleSearch").is_some());
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_response_parsing_with_grounding() {
        let json = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "It is "}, {"text": "sunny."}]},
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://weather.example/a", "title": "Weather A"}},
                    {"web": {"uri": "https://weather.example/a", "title": "dup"}},
                    {"web": {"uri": "https://weather.example/b"}}
                ]}
            }],
            "usageMetadata": {"totalTokenCount": 25}
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let (text, sources) = read_candidate(&resp).unwrap();
        assert_eq!(text, "It is sunny.");
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "Weather A");
        assert_eq!(sources[1].title, "");
        assert_eq!(
            resp.usage_metadata.as_ref().map(|u| u.total_token_count),
            Some(25)
        );
    }

    #[test]
    fn test_response_without_text_is_none() {
        let resp: GeminiResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[]}}]}"#).unwrap();
        assert!(read_candidate(&resp).is_none());
        let empty: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(read_candidate(&empty).is_none());
    }
}
