//! Gemini-specific error handling.

use bugscope_core::Error;

/// Gemini-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiErrorCode {
    /// Missing or invalid API key.
    AuthenticationError,
    /// Key is valid but lacks access to the model or API.
    PermissionDenied,
    /// Quota or rate limit exceeded.
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Malformed request or prompt rejected.
    InvalidRequest,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl GeminiErrorCode {
    /// Determine error code from HTTP status and the canonical error status.
    pub fn from_response(status: u16, error_status: &str) -> Self {
        match (status, error_status) {
            (401, _) | (_, "UNAUTHENTICATED") => Self::AuthenticationError,
            (403, _) | (_, "PERMISSION_DENIED") => Self::PermissionDenied,
            (429, _) | (_, "RESOURCE_EXHAUSTED") => Self::RateLimitExceeded,
            (404, _) | (_, "NOT_FOUND") => Self::ModelNotFound,
            (400, _) => Self::InvalidRequest,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Whether operator action (key or model configuration) is needed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationError | Self::PermissionDenied | Self::ModelNotFound
        )
    }
}

/// Convert a Gemini error to a bugscope Error.
pub fn to_bugscope_error(code: GeminiErrorCode, message: &str) -> Error {
    match code {
        GeminiErrorCode::AuthenticationError => {
            Error::Config(format!("Gemini authentication failed: {}", message))
        }
        GeminiErrorCode::PermissionDenied => {
            Error::Config(format!("Gemini permission denied: {}", message))
        }
        GeminiErrorCode::RateLimitExceeded => {
            Error::Inference(format!("Gemini quota exceeded: {}", message))
        }
        GeminiErrorCode::ModelNotFound => {
            Error::Config(format!("Gemini model not found: {}", message))
        }
        GeminiErrorCode::InvalidRequest => {
            Error::Inference(format!("Gemini rejected the request: {}", message))
        }
        GeminiErrorCode::ServerError => Error::Inference(format!("Gemini server error: {}", message)),
        GeminiErrorCode::Unknown => Error::Inference(format!("Gemini error: {}", message)),
    }
}
