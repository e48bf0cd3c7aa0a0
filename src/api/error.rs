//! API error type and its mapping onto HTTP status codes.

use serde_json::json;
use thiserror::Error;

use crate::{
    core::{lines::LineApplyError, store::StoreError},
    persist::PersistError,
    runtime::handle::RuntimeError,
};

use super::request::ApiResponse;

/// Error returned by request handlers.
///
/// Rendered as `{ "message": "..." }` with the matching status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Unavailable(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> ApiResponse {
        ApiResponse {
            status: self.status(),
            body: json!({ "message": self.to_string() }),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound(err.to_string()),
            StoreError::AlreadyExists(_) => Self::Conflict(err.to_string()),
            StoreError::InvalidBody(_) | StoreError::NoLines(_) => Self::BadRequest(err.to_string()),
            StoreError::Lines(LineApplyError::UnknownLine(_)) => Self::BadRequest(err.to_string()),
            StoreError::Lines(LineApplyError::Malformed(_)) => Self::Internal(err.to_string()),
        }
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Store(err) => err.into(),
            // queue pressure surfaces as a persist message
            RuntimeError::Persist(PersistError::Message(msg)) => Self::Unavailable(msg),
            RuntimeError::Persist(err) => Self::Internal(err.to_string()),
            RuntimeError::ChannelClosed => Self::Unavailable("service is shutting down".to_string()),
        }
    }
}
