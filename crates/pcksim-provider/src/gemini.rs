//! Google Gemini API provider
//!
//! https://ai.google.dev/api/generate-content

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{ContentBlock, LlmProvider, LlmRequest, LlmResponse};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, GEMINI_API_BASE)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn build_request(&self, request: &LlmRequest) -> GeminiRequest {
        let mut contents = Vec::new();

        for msg in &request.messages {
            let role = match msg.role.as_str() {
                "assistant" | "model" => "model",
                _ => "user",
            };

            let parts: Vec<GeminiPart> = msg
                .content
                .iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => GeminiPart::Text { text: text.clone() },
                    ContentBlock::Image { mime_type, data } => GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: mime_type.clone(),
                            data: data.clone(),
                        },
                    },
                })
                .collect();

            if !parts.is_empty() {
                contents.push(GeminiContent {
                    role: role.to_string(),
                    parts,
                });
            }
        }

        let opts = &request.options;
        GeminiRequest {
            contents,
            system_instruction: request.system.as_ref().map(|s| GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart::Text { text: s.clone() }],
            }),
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: opts.max_output_tokens,
                temperature: opts.temperature,
                top_p: opts.top_p,
                stop_sequences: opts.stop_sequences.clone(),
                response_mime_type: opts.response_mime_type.clone(),
                response_schema: opts.response_schema.clone(),
            }),
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );

        let payload = self.build_request(&request);

        let resp = match self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(anyhow!(
                    "gemini api error (timeout) [retryable]: request timed out"
                ));
            }
            Err(e) if e.is_connect() => {
                return Err(anyhow!("gemini api error (connect) [retryable]: {e}"));
            }
            Err(e) => return Err(e.into()),
        };

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await?;
            return Err(format_api_error(status, &text));
        }

        let body: GeminiResponse = resp.json().await?;
        to_llm_response(body)
    }
}

fn to_llm_response(body: GeminiResponse) -> Result<LlmResponse> {
    let candidate = body
        .candidates
        .first()
        .ok_or_else(|| anyhow!("gemini api error: empty candidates"))?;

    let mut content = Vec::new();
    let mut text = String::new();

    for part in candidate.content.iter().flat_map(|c| c.parts.iter()) {
        if let GeminiPart::Text { text: t } = part {
            if !t.is_empty() {
                text.push_str(t);
                content.push(ContentBlock::Text { text: t.clone() });
            }
        }
    }

    let stop_reason = match candidate.finish_reason.as_deref() {
        Some("STOP") => Some("end_turn".to_string()),
        Some("MAX_TOKENS") => Some("max_tokens".to_string()),
        Some("SAFETY") => Some("safety".to_string()),
        Some(r) => Some(r.to_lowercase()),
        None => None,
    };

    Ok(LlmResponse {
        text,
        content,
        input_tokens: body.usage_metadata.as_ref().map(|u| u.prompt_token_count),
        output_tokens: body
            .usage_metadata
            .as_ref()
            .map(|u| u.candidates_token_count),
        stop_reason,
    })
}

fn format_api_error(status: StatusCode, text: &str) -> anyhow::Error {
    let retryable = match status.as_u16() {
        429 | 500..=599 => " [retryable]",
        _ => "",
    };
    anyhow!("gemini api error ({status}){retryable}: {text}")
}

// ============================================================
// Gemini API Types
// ============================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    // absent when the candidate was blocked
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GenerationOptions, LlmMessage};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 2}
        })
    }

    #[test]
    fn build_request_maps_roles_and_system() {
        let provider = GeminiProvider::new("test-key");
        let req = LlmRequest {
            model: "gemini-2.5-flash-lite".into(),
            system: Some("Be a student".into()),
            messages: vec![LlmMessage::user("Hi"), LlmMessage::assistant("Hello")],
            options: GenerationOptions::default(),
        };
        let api_req = provider.build_request(&req);

        assert!(api_req.system_instruction.is_some());
        assert_eq!(api_req.contents.len(), 2);
        assert_eq!(api_req.contents[0].role, "user");
        assert_eq!(api_req.contents[1].role, "model");
    }

    #[test]
    fn build_request_carries_generation_options() {
        let provider = GeminiProvider::new("test-key");
        let req = LlmRequest::simple("m".into(), None, "Hi".into()).with_options(
            GenerationOptions {
                max_output_tokens: Some(512),
                temperature: Some(0.7),
                top_p: Some(1.0),
                stop_sequences: vec!["Teacher:".into()],
                response_mime_type: Some("application/json".into()),
                response_schema: Some(serde_json::json!({"type": "object"})),
            },
        );
        let json = serde_json::to_value(provider.build_request(&req)).unwrap();
        let cfg = &json["generationConfig"];
        assert_eq!(cfg["maxOutputTokens"], 512);
        assert_eq!(cfg["stopSequences"][0], "Teacher:");
        assert_eq!(cfg["responseMimeType"], "application/json");
        assert_eq!(cfg["responseSchema"]["type"], "object");
        assert!(cfg.get("topK").is_none());
    }

    #[test]
    fn build_request_inlines_images() {
        let provider = GeminiProvider::new("test-key");
        let msg = LlmMessage::user("see drawing").with_png(b"png");
        let req = LlmRequest {
            model: "m".into(),
            system: None,
            messages: vec![msg],
            options: GenerationOptions::default(),
        };
        let json = serde_json::to_value(provider.build_request(&req)).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "see drawing");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "cG5n");
    }

    #[test]
    fn to_llm_response_text_only() {
        let parsed: GeminiResponse = serde_json::from_value(text_response("Hello!")).unwrap();
        let resp = to_llm_response(parsed).unwrap();

        assert_eq!(resp.text, "Hello!");
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(resp.input_tokens, Some(5));
        assert_eq!(resp.output_tokens, Some(2));
    }

    #[test]
    fn to_llm_response_blocked_candidate_is_empty() {
        let raw = serde_json::json!({"candidates": [{"finishReason": "SAFETY"}]});
        let parsed: GeminiResponse = serde_json::from_value(raw).unwrap();
        let resp = to_llm_response(parsed).unwrap();
        assert_eq!(resp.text, "");
        assert_eq!(resp.stop_reason.as_deref(), Some("safety"));
    }

    #[test]
    fn to_llm_response_without_candidates_fails() {
        let parsed: GeminiResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(to_llm_response(parsed).is_err());
    }

    #[test]
    fn api_errors_mark_retryable_statuses() {
        let err = format_api_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.to_string().contains("[retryable]"));
        let err = format_api_error(StatusCode::BAD_REQUEST, "bad");
        assert!(!err.to_string().contains("[retryable]"));
    }

    #[tokio::test]
    async fn chat_posts_to_generate_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash-lite:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("שלום")))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiProvider::with_base_url("test-key", server.uri());
        let resp = provider
            .chat(LlmRequest::simple(
                "gemini-2.5-flash-lite".into(),
                None,
                "hi".into(),
            ))
            .await
            .unwrap();
        assert_eq!(resp.text, "שלום");
    }

    #[tokio::test]
    async fn chat_surfaces_server_errors_as_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider = GeminiProvider::with_base_url("k", server.uri());
        let err = provider
            .chat(LlmRequest::simple("m".into(), None, "hi".into()))
            .await
            .err()
            .unwrap();
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("[retryable]"));
        assert!(msg.contains("overloaded"));
    }
}
