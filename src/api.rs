use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::credentials::Credentials;
use crate::status::JobStatus;
use crate::transcript::truthy;

/// Failures talking to the assistant backend.
///
/// `Display` yields only the detail text; callers add their own prefix
/// (`"Error: "`, `"Error validating: "`, ...).
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Network(#[from] reqwest::Error),

    #[error("{detail}")]
    Http { status: StatusCode, detail: String },

    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Task(String),
}

#[derive(Serialize)]
struct ValidateRequest<'a> {
    jmeter_path: &'a str,
    openai_key: &'a str,
}

/// Per-field verdict from `/validate_config`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    #[serde(default)]
    pub jmeter_valid: bool,
    pub jmeter_error: Option<String>,
    #[serde(default)]
    pub openai_valid: bool,
    pub openai_error: Option<String>,
}

#[derive(Deserialize)]
struct ValidateErrorBody {
    error: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    jmeter_path: &'a str,
    openai_key: &'a str,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub user_response: Option<String>,
    pub technical_action: Option<Value>,
}

impl ChatReply {
    /// The suggested action, unless it is null or falsy (`false`, `0`, `""`).
    pub fn action(&self) -> Option<&Value> {
        self.technical_action.as_ref().filter(|v| truthy(v))
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn validate_config(&self, credentials: &Credentials) -> Result<ValidationResult, ApiError> {
        let request = ValidateRequest {
            jmeter_path: &credentials.jmeter_path,
            openai_key: &credentials.openai_key,
        };

        tracing::debug!(url = %self.url("/validate_config"), "Validating configuration");

        let response = self
            .client
            .post(self.url("/validate_config"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        // The body is parsed before the status is looked at, so a non-JSON
        // error page surfaces as a decode error.
        let value: Value = serde_json::from_slice(&body)?;
        if !status.is_success() {
            let detail = serde_json::from_value::<ValidateErrorBody>(value)
                .ok()
                .and_then(|b| b.error)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "Validation request failed".to_string());
            return Err(ApiError::Http { status, detail });
        }

        Ok(serde_json::from_value(value)?)
    }

    pub async fn chat(&self, message: &str, credentials: &Credentials) -> Result<ChatReply, ApiError> {
        let request = ChatRequest {
            message,
            jmeter_path: &credentials.jmeter_path,
            openai_key: &credentials.openai_key,
        };

        tracing::debug!(url = %self.url("/chat"), chars = message.chars().count(), "Sending chat message");

        let response = self
            .client
            .post(self.url("/chat"))
            .json(&request)
            .send()
            .await?;

        decode(response).await
    }

    pub async fn last_job_status(&self) -> Result<JobStatus, ApiError> {
        let response = self
            .client
            .get(self.url("/get_last_jmeter_result"))
            .send()
            .await?;

        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(ApiError::Http {
            status,
            detail: error_detail(status, &body),
        });
    }

    Ok(serde_json::from_slice(&body)?)
}

/// Pull a human-readable message out of a non-2xx body of the form `{"detail": ...}`.
pub fn error_detail(status: StatusCode, body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return "Unknown server error".to_string();
    };

    match value.get("detail") {
        Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
        Some(Value::Null | Value::String(_)) | None => {
            format!("HTTP error! status: {}", status.as_u16())
        }
        // e.g. a list of field errors
        Some(other) => other.to_string(),
    }
}
