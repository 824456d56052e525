use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RelayConfig;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("rate limited by Gemini API")]
    RateLimited,

    #[error("Gemini API error {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("failed to parse Gemini response: {0}")]
    Decode(String),

    #[error("response blocked: {0}")]
    Blocked(String),

    #[error("Gemini response contained no text")]
    EmptyResponse,
}

/// Generated output, relayed verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<Generated, GenerateError>;
}

pub struct GeminiClient {
    api_key: String,
    api_base: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, config: &RelayConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            api_key: api_key.into(),
            api_base: config.api_base.clone(),
            client: builder.build()?,
        })
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<Generated, GenerateError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        tracing::debug!(model, prompt_len = prompt.len(), "Sending request to Gemini API");

        let response = self
            .client
            .post(self.generate_url(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerateError::RateLimited);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unable to read response body: {e}>"));
            return Err(GenerateError::Api { status, body });
        }

        let body = response.bytes().await?;
        let parsed: GenerateContentResponse =
            serde_json::from_slice(&body).map_err(|e| GenerateError::Decode(e.to_string()))?;

        parsed.into_text().map(|text| Generated { text })
    }
}

// Gemini wire types. Only the fields the relay reads are modelled.

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

impl GenerateContentResponse {
    /// Concatenates the non-thought text parts of the first candidate.
    fn into_text(self) -> Result<String, GenerateError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let candidate = self.candidates.into_iter().next();

        let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());
        let text = candidate
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|part| part.thought != Some(true))
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
            })
            .filter(|texts| !texts.is_empty())
            .map(|texts| texts.concat());

        if let Some(text) = text {
            return Ok(text);
        }
        if let Some(reason) = block_reason {
            return Err(GenerateError::Blocked(reason));
        }
        match finish_reason {
            Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
                Err(GenerateError::Blocked(reason))
            }
            _ => Err(GenerateError::EmptyResponse),
        }
    }
}
