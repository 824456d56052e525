use lambda_http::http::{Method, StatusCode};
use lambda_http::{Body, Error, Request, Response};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::error::{json_response, RelayError};
use crate::gemini::{GeminiClient, TextGenerator};

pub struct AppState {
    // None when no API key was configured; every request is refused.
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub model: String,
}

impl AppState {
    pub fn from_config(config: &RelayConfig) -> Result<Self, reqwest::Error> {
        let generator: Option<Arc<dyn TextGenerator>> = match &config.api_key {
            Some(api_key) => {
                let client: Arc<dyn TextGenerator> =
                    Arc::new(GeminiClient::new(api_key.as_str(), config)?);
                Some(client)
            }
            None => {
                tracing::error!(
                    "CRITICAL: GEMINI_API_KEY is not set; every request will be refused until it is configured"
                );
                None
            }
        };

        Ok(Self {
            generator,
            model: config.model.clone(),
        })
    }
}

pub(crate) async fn function_handler(
    state: Arc<AppState>,
    event: Request,
) -> Result<Response<Body>, Error> {
    match relay(&state, &event).await {
        Ok(text) => Ok(json_response(StatusCode::OK, &json!({ "text": text }))?),
        Err(err) => Ok(err.into_response()?),
    }
}

async fn relay(state: &AppState, event: &Request) -> Result<String, RelayError> {
    if event.method() != Method::POST {
        tracing::debug!(method = %event.method(), "Rejecting non-POST request");
        return Err(RelayError::MethodNotAllowed);
    }

    let Some(generator) = &state.generator else {
        tracing::warn!("Refusing request: GEMINI_API_KEY is not configured");
        return Err(RelayError::NotConfigured);
    };

    let Some(prompt) = extract_prompt(event.body()) else {
        tracing::debug!("Rejecting request without a prompt");
        return Err(RelayError::MissingPrompt);
    };

    tracing::info!(model = %state.model, prompt_len = prompt.len(), "Received prompt");
    tracing::debug!(prompt = %prompt, "Prompt content");

    match generator.generate(&state.model, &prompt).await {
        Ok(generated) => Ok(generated.text),
        Err(err) => {
            tracing::error!(model = %state.model, error = %err, "Gemini API call failed");
            Err(RelayError::Upstream(err))
        }
    }
}

/// The `prompt` string from a JSON object body, if present and non-empty.
fn extract_prompt(body: &Body) -> Option<String> {
    let bytes: &[u8] = body.as_ref();
    if bytes.is_empty() {
        return None;
    }

    let value: Value = serde_json::from_slice(bytes).ok()?;
    match value.get("prompt")? {
        Value::String(prompt) if !prompt.is_empty() => Some(prompt.clone()),
        _ => None,
    }
}
