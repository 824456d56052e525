use lambda_http::http::{header::CONTENT_TYPE, StatusCode};
use lambda_http::{Body, Response};
use serde_json::json;
use thiserror::Error;

use crate::gemini::GenerateError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("API Key not configured on the server.")]
    NotConfigured,

    #[error("Prompt is missing in the request body.")]
    MissingPrompt,

    // Source is logged, never rendered to the caller.
    #[error("An error occurred while contacting the Gemini service.")]
    Upstream(#[source] GenerateError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotConfigured | Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingPrompt => StatusCode::BAD_REQUEST,
        }
    }

    pub fn into_response(self) -> Result<Response<Body>, lambda_http::http::Error> {
        // 405 uses `message`; every other failure shares `text` with the success body.
        let body = match self {
            Self::MethodNotAllowed => json!({ "message": self.to_string() }),
            _ => json!({ "text": self.to_string() }),
        };
        json_response(self.status(), &body)
    }
}

pub(crate) fn json_response(
    status: StatusCode,
    body: &serde_json::Value,
) -> Result<Response<Body>, lambda_http::http::Error> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
}
