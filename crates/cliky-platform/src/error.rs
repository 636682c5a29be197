use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    /// The OS refused the global hook (missing permission, no display, ...).
    #[error("input hook unavailable: {0}")]
    HookUnavailable(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;
