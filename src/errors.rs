#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable application error codes exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest = 1001,
    UnsupportedRequestType = 1003,
    InternalServerError = 2001,
    ApiError = 2002,
    NetworkError = 2003,
    Timeout = 2004,
    UnknownError = 2005,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported request type: {0}")]
    UnsupportedRequestType(String),

    #[error("Failed to connect to whois upstream: {0}")]
    UpstreamConnectivity(String),

    #[error("Whois upstream request timed out")]
    UpstreamTimeout,

    #[error("Whois upstream request failed with status code: {status}")]
    UpstreamStatus { status: u16 },

    #[error("Whois upstream request failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    // raw_payload is for internal diagnostics only; keep it out of Display
    #[error("Failed to parse whois upstream response: {reason}")]
    Parsing { reason: String, raw_payload: String },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn parsing(reason: impl Into<String>, raw_payload: &str) -> Self {
        GatewayError::Parsing {
            reason: reason.into(),
            raw_payload: raw_payload.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidRequest(_) | GatewayError::UnsupportedRequestType(_)
        )
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::UnsupportedRequestType(_) => "unsupported_request_type",
            GatewayError::UpstreamConnectivity(_) => "upstream_connectivity",
            GatewayError::UpstreamTimeout => "upstream_timeout",
            GatewayError::UpstreamStatus { .. } => "upstream_status",
            GatewayError::RetriesExhausted { .. } => "upstream_retries_exhausted",
            GatewayError::Parsing { .. } => "parsing",
            GatewayError::ConfigError(_) => "config",
            GatewayError::CacheError(_) => "cache",
            GatewayError::Internal(_) => "internal",
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            GatewayError::UnsupportedRequestType(_) => ErrorCode::UnsupportedRequestType,
            GatewayError::UpstreamConnectivity(_) => ErrorCode::NetworkError,
            GatewayError::UpstreamTimeout => ErrorCode::Timeout,
            GatewayError::UpstreamStatus { .. } | GatewayError::RetriesExhausted { .. } => {
                ErrorCode::ApiError
            }
            GatewayError::Parsing { .. } | GatewayError::Internal(_) => {
                ErrorCode::InternalServerError
            }
            GatewayError::ConfigError(_) | GatewayError::CacheError(_) => ErrorCode::UnknownError,
        }
    }

    /// Message that is safe to hand to an external caller.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::InvalidRequest(msg) | GatewayError::UnsupportedRequestType(msg) => {
                msg.clone()
            }
            GatewayError::UpstreamConnectivity(_) => {
                "Failed to connect to the whois data provider.".to_string()
            }
            GatewayError::UpstreamTimeout => {
                "Request timeout. The whois data provider took too long to respond.".to_string()
            }
            GatewayError::UpstreamStatus { status } => {
                format!("Whois data provider request failed with status code: {}", status)
            }
            GatewayError::RetriesExhausted { .. } => {
                "Whois data provider request failed after multiple retries.".to_string()
            }
            GatewayError::Parsing { .. } | GatewayError::Internal(_) => {
                "An unexpected error occurred. Please try again later.".to_string()
            }
            GatewayError::ConfigError(_) | GatewayError::CacheError(_) => {
                "An unknown error occurred.".to_string()
            }
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error_code: self.code().as_u16(),
            error_message: self.public_message(),
        }
    }

    #[cfg(feature = "server")]
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) | GatewayError::UnsupportedRequestType(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::UpstreamTimeout => StatusCode::REQUEST_TIMEOUT,
            GatewayError::UpstreamConnectivity(_) | GatewayError::RetriesExhausted { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Body returned to callers when a lookup fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: u16,
    pub error_message: String,
}

impl From<tokio::time::error::Elapsed> for GatewayError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        GatewayError::UpstreamTimeout
    }
}

#[cfg(feature = "server")]
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Lookup failed: {}", self);
        }
        (status, Json(self.to_response())).into_response()
    }
}
