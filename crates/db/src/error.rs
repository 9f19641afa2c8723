//! Error taxonomy for store access.

use std::time::Duration;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Coarse classification of a [`StoreError`], used by callers that decide on
/// presentation or retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    Connectivity,
    Timeout,
    Contention,
    Constraint,
    Consistency,
    Coercion,
    Query,
}

/// Any failure originating from the underlying store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] r2d2::Error),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("store busy: {0}")]
    Busy(#[source] rusqlite::Error),

    #[error("constraint violation: {0}")]
    Constraint(#[source] rusqlite::Error),

    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("cannot coerce {value:?} to an integer id")]
    Coercion { value: String },

    #[error("query failed: {0}")]
    Query(#[source] rusqlite::Error),

    #[error("store task aborted: {0}")]
    Aborted(String),
}

impl StoreError {
    /// Create a consistency error
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency(message.into())
    }

    /// Create a coercion error for a value the store cannot read as an id
    pub fn coercion(value: impl Into<String>) -> Self {
        Self::Coercion {
            value: value.into(),
        }
    }

    pub fn kind(&self) -> StoreErrorKind {
        match self {
            Self::Unavailable(_) | Self::Aborted(_) => StoreErrorKind::Connectivity,
            Self::Timeout { .. } => StoreErrorKind::Timeout,
            Self::Busy(_) => StoreErrorKind::Contention,
            Self::Constraint(_) => StoreErrorKind::Constraint,
            Self::Consistency(_) => StoreErrorKind::Consistency,
            Self::Coercion { .. } => StoreErrorKind::Coercion,
            Self::Query(_) => StoreErrorKind::Query,
        }
    }

    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            StoreErrorKind::Connectivity | StoreErrorKind::Timeout | StoreErrorKind::Contention
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Self::Constraint(err),
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => Self::Busy(err),
            _ => Self::Query(err),
        }
    }
}
