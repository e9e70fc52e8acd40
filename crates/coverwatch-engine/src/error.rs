use coverwatch_core::{ExceptionStatus, RequirementError};
use coverwatch_store::StoreError;
use thiserror::Error;

/// Service-boundary result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Conflict,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InternalError => "internal_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid requirement set: {0}")]
    Requirements(#[from] RequirementError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Lost an optimistic-concurrency race. Re-fetch and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("exception cannot move from {from} to {to}")]
    InvalidTransition {
        from: ExceptionStatus,
        to: ExceptionStatus,
    },

    #[error("permanent exceptions require a fresh re-authentication of the requesting principal")]
    ReauthenticationRequired,

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("verification task failed: {0}")]
    Task(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(what) => Self::Conflict(what),
            other => Self::Store(other),
        }
    }
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Requirements(_)
            | Self::Validation(_)
            | Self::InvalidTransition { .. }
            | Self::ReauthenticationRequired => ErrorCode::ValidationError,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::Store(_) | Self::Task(_) => ErrorCode::InternalError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code() == ErrorCode::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_codes() {
        let e: EngineError = StoreError::Conflict("version".into()).into();
        assert_eq!(e.code(), ErrorCode::Conflict);
        assert!(e.is_retryable());

        let e: EngineError = StoreError::NotFound("assignment".into()).into();
        assert_eq!(e.code(), ErrorCode::NotFound);
        assert!(!e.is_retryable());

        let e: EngineError = StoreError::LockPoisoned.into();
        assert_eq!(e.code(), ErrorCode::InternalError);
    }

    #[test]
    fn transition_errors_are_validation() {
        let e = EngineError::InvalidTransition {
            from: ExceptionStatus::Rejected,
            to: ExceptionStatus::Active,
        };
        assert_eq!(e.code().as_str(), "validation_error");
        assert_eq!(e.to_string(), "exception cannot move from rejected to active");
    }
}
