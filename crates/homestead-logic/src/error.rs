//! Engine error taxonomy.
//!
//! Every rejected operation reports one [`ErrorKind`] plus a human-readable
//! reason. Validation errors are raised before any write, so callers never
//! observe a partially applied operation.

use thiserror::Error;

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    PreconditionFailed,
    OutOfBounds,
    StorageFault,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("insufficient quantity of #{target_id}: have {available}, need {requested}")]
    InsufficientQuantity {
        target_id: u64,
        available: u64,
        requested: u64,
    },

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("storage fault: {0}")]
    StorageFault(String),

    #[error("malformed job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionFailed(reason.into())
    }

    pub fn out_of_bounds(reason: impl Into<String>) -> Self {
        Self::OutOfBounds(reason.into())
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::StorageFault(reason.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::PreconditionFailed(_) | Self::InsufficientQuantity { .. } | Self::Payload(_) => {
                ErrorKind::PreconditionFailed
            }
            Self::OutOfBounds(_) => ErrorKind::OutOfBounds,
            Self::StorageFault(_) => ErrorKind::StorageFault,
        }
    }

    /// Only store failures are worth redelivering; everything else would fail
    /// the same way again.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::StorageFault
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_quantity_is_a_precondition() {
        let err = EngineError::InsufficientQuantity {
            target_id: 3,
            available: 10,
            requested: 11,
        };
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("have 10, need 11"));
    }

    #[test]
    fn test_only_storage_faults_retry() {
        assert!(EngineError::storage("disk full").is_retryable());
        assert!(!EngineError::not_found("session #1").is_retryable());
        assert!(!EngineError::conflict("taken").is_retryable());
        assert!(!EngineError::out_of_bounds("x2 > width").is_retryable());
    }

    #[test]
    fn test_payload_errors_convert() {
        let bad: Result<u32, _> = serde_json::from_str("{");
        let err: EngineError = bad.unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }
}
