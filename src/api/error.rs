use serde_json::json;
use thiserror::Error;

use super::ApiResponse;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// Uniqueness violation, e.g. a slug already taken by another job.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Injected by the network simulation before the handler ran.
    #[error("{0}")]
    SimulatedFailure(String),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::SimulatedFailure(_) | ApiError::Internal(_) => 500,
        }
    }

    /// Only failures that left the store untouched are worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::SimulatedFailure(_))
    }

    pub fn into_response(self) -> ApiResponse {
        if let ApiError::Internal(err) = &self {
            tracing::error!("handler failed: {err:#}");
        }
        ApiResponse {
            status: self.status(),
            body: json!({ "message": self.to_string() }),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.into())
    }
}
