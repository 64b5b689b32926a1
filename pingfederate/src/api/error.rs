use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {body}")]
    ApiError {
        status: u16,
        body: String,
        details: Option<Box<PingFederateErrorResponse>>,
    },

    #[error("Resource not found (HTTP 404)")]
    NotFound { body: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// HTTP status of a response-level error
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(404),
            ApiError::RateLimited => Some(429),
            ApiError::ServiceUnavailable => Some(503),
            ApiError::RequestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Error body returned by the PingFederate admin API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingFederateErrorResponse {
    #[serde(default)]
    pub result_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub validation_errors: Vec<ValidationError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub developer_message: String,
    #[serde(default)]
    pub field_path: String,
    #[serde(default)]
    pub error_id: String,
}
