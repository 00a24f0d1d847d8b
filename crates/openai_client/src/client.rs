//! Batch API HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).
//! Covers the batch flow: upload → create batch → retrieve → download output.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

/// Default API base URL (paths below are appended to it).
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Name the JSON-Lines payload is uploaded under.
pub const BATCH_FILE_NAME: &str = "batch_input.jsonl";

/// Completion window requested for every batch.
pub const COMPLETION_WINDOW: &str = "24h";

/// Batch API client (blocking).
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_base: String,
    token: String,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the token
        f.debug_struct("OpenAiClient")
            .field("api_base", &self.api_base)
            .field("has_token", &self.has_token())
            .finish()
    }
}

/// Error type for API operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No API key configured
    #[error("No API key configured")]
    NotAuthenticated,
    /// Network error (connect, TLS, timeout)
    #[error("Network error: {0}")]
    Network(String),
    /// Non-success HTTP status with the server's message
    #[error("HTTP {0}: {1}")]
    Http(u16, String),
    /// Response body did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Uploaded file (from `POST /v1/files`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Lifecycle status reported by the batches endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BatchStatus {
    Validating,
    InProgress,
    Finalizing,
    Completed,
    Failed,
    Expired,
    Cancelling,
    Cancelled,
    /// Anything this client does not know about yet.
    Other(String),
}

impl BatchStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BatchStatus::Validating => "validating",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Finalizing => "finalizing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Expired => "expired",
            BatchStatus::Cancelling => "cancelling",
            BatchStatus::Cancelled => "cancelled",
            BatchStatus::Other(s) => s,
        }
    }

    /// Terminal states that produce no usable output.
    pub fn is_failure(&self) -> bool {
        matches!(self, BatchStatus::Failed | BatchStatus::Expired | BatchStatus::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed) || self.is_failure()
    }
}

impl From<&str> for BatchStatus {
    fn from(s: &str) -> Self {
        match s {
            "validating" => BatchStatus::Validating,
            "in_progress" => BatchStatus::InProgress,
            "finalizing" => BatchStatus::Finalizing,
            "completed" => BatchStatus::Completed,
            "failed" => BatchStatus::Failed,
            "expired" => BatchStatus::Expired,
            "cancelling" => BatchStatus::Cancelling,
            "cancelled" => BatchStatus::Cancelled,
            other => BatchStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for BatchStatus {
    fn from(s: String) -> Self {
        BatchStatus::from(s.as_str())
    }
}

impl From<BatchStatus> for String {
    fn from(status: BatchStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
}

/// Batch resource (from `POST /v1/batches` and `GET /v1/batches/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchObject {
    pub id: String,
    pub status: BatchStatus,
    #[serde(default)]
    pub input_file_id: Option<String>,
    #[serde(default)]
    pub output_file_id: Option<String>,
    #[serde(default)]
    pub error_file_id: Option<String>,
    #[serde(default)]
    pub request_counts: Option<RequestCounts>,
}

impl OpenAiClient {
    /// Create a client for `api_base` authenticating with `token`.
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("gridbatch/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// True when a non-blank bearer token is configured.
    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }

    /// Upload a JSON-Lines payload with purpose `batch`.
    pub fn upload_batch_file(&self, jsonl: &str) -> Result<FileObject, ApiError> {
        let url = format!("{}/v1/files", self.api_base);
        let part = Part::bytes(jsonl.as_bytes().to_vec())
            .file_name(BATCH_FILE_NAME)
            .mime_str("application/jsonl")
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        let form = Form::new().text("purpose", "batch").part("file", part);

        log::debug!("POST {} ({} bytes)", url, jsonl.len());
        let response = self.http.post(&url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let response = check_status(response)?;
        response.json::<FileObject>().map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Create a batch over an uploaded input file.
    pub fn create_batch(&self, input_file_id: &str, endpoint: &str) -> Result<BatchObject, ApiError> {
        let url = format!("{}/v1/batches", self.api_base);
        let body = serde_json::json!({
            "input_file_id": input_file_id,
            "endpoint": endpoint,
            "completion_window": COMPLETION_WINDOW,
        });
        let resp = self.post_json(&url, &body)?;
        resp.json::<BatchObject>().map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Current state of a batch.
    pub fn retrieve_batch(&self, batch_id: &str) -> Result<BatchObject, ApiError> {
        let url = format!("{}/v1/batches/{}", self.api_base, batch_id);
        let resp = self.get(&url)?;
        resp.json::<BatchObject>().map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Raw contents of a file (the batch output is JSON Lines).
    pub fn file_content(&self, file_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/v1/files/{}/content", self.api_base, file_id);
        let resp = self.get(&url)?;
        resp.text().map_err(|e| ApiError::Network(e.to_string()))
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, ApiError> {
        log::debug!("GET {}", url);
        let response = self.http.get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        check_status(response)
    }

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<reqwest::blocking::Response, ApiError> {
        log::debug!("POST {}", url);
        let response = self.http.post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        check_status(response)
    }
}

fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ApiError::Http(status.as_u16(), api_error_message(&body)))
}

/// Pull `error.message` out of an API error body; fall back to the raw body.
pub fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}
