use cliky_core::{EngineError, OverlayError, StorageError};
use serde::Serialize;

/// Error shape handed to the webview; commands return it as a plain string.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::new(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::new(format!("failed to save settings: {err}"))
    }
}

impl From<OverlayError> for ApiError {
    fn from(err: OverlayError) -> Self {
        ApiError::new(err.to_string())
    }
}

impl From<ApiError> for String {
    fn from(err: ApiError) -> Self {
        err.message
    }
}

pub type CommandResult<T> = Result<T, String>;

/// Shorthand for `.map_err(|e| ApiError::from(e).into())`.
pub fn api_err<E: Into<ApiError>>(err: E) -> String {
    err.into().into()
}
