//! HTTP client for the Gemini `generateContent` endpoint.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use unitplan_core::PlanConfig;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gemini API error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("Gemini response has no text: {body}")]
    EmptyResponse { body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid Gemini endpoint: {0}")]
    Endpoint(String),
}

/// Binary content sent alongside the prompt.
#[derive(Debug, Clone, Copy)]
pub struct Attachment<'a> {
    pub mime_type: &'a str,
    pub data: &'a [u8],
}

impl<'a> Attachment<'a> {
    pub fn pdf(data: &'a [u8]) -> Self {
        Self {
            mime_type: "application/pdf",
            data,
        }
    }
}

/// Anything that turns a prompt (and optional attachment) into response text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        attachment: Option<Attachment<'_>>,
    ) -> Result<String, ModelError>;
}

// ── Wire types ──

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

fn build_request<'a>(
    prompt: &'a str,
    attachment: Option<Attachment<'a>>,
    temperature: f32,
) -> GenerateRequest<'a> {
    let mut parts = vec![Part::Text { text: prompt }];
    if let Some(att) = attachment {
        parts.push(Part::Inline {
            inline_data: InlineData {
                mime_type: att.mime_type,
                data: STANDARD.encode(att.data),
            },
        });
    }
    GenerateRequest {
        contents: [Content { parts }],
        generation_config: GenerationConfig {
            temperature,
            response_mime_type: "application/json",
        },
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
fn response_text(body: &str) -> Result<String, ModelError> {
    let json: Value = serde_json::from_str(body)?;
    match json["candidates"][0]["content"]["parts"][0]["text"].as_str() {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(ModelError::EmptyResponse {
            body: body.to_string(),
        }),
    }
}

/// Gemini client bound to one model and API key.
pub struct GeminiClient {
    client: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, config: &PlanConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            temperature: config.temperature,
        }
    }

    /// `{api_base}/v1beta/models/{model}:generateContent`, with the model
    /// name percent-encoded as a single path segment.
    fn endpoint(&self) -> Result<reqwest::Url, ModelError> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| ModelError::Endpoint(format!("{}: {e}", self.api_base)))?;
        let call = format!("{}:generateContent", self.model);
        url.path_segments_mut()
            .map_err(|_| ModelError::Endpoint(self.api_base.clone()))?
            .pop_if_empty()
            .extend(["v1beta", "models", call.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        attachment: Option<Attachment<'_>>,
    ) -> Result<String, ModelError> {
        let url = self.endpoint()?;
        let request = build_request(prompt, attachment, self.temperature);

        debug!(
            model = %self.model,
            attachment = attachment.is_some(),
            prompt_chars = prompt.chars().count(),
            "calling generateContent"
        );
        let resp = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response_text(&body)
    }
}
