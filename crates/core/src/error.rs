//! Domain error model shared by the ledger and sale lifecycle.

use serde::Serialize;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is recoverable at the call site. Callers render a localized
/// message from [`DomainError::kind`] and the carried detail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Entitlement, plan perimeter or tenant payment gating denial.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A plan numeric limit has been reached.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The transition is not allowed from the aggregate's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An inventory campaign is in progress for the tenant.
    #[error("locked: {0}")]
    Locked(String),

    /// Unknown sale, stock item, campaign, customer or sale item.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input (empty cart, missing cancellation reason, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Optimistic concurrency failure: the aggregate moved under us.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

/// Stable, transport-friendly error classification.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Forbidden,
    QuotaExceeded,
    InvalidState,
    Locked,
    NotFound,
    Validation,
    Conflict,
    InvalidId,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Locked => "locked",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidId => "invalid_id",
        }
    }
}

impl DomainError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn quota_exceeded(msg: impl Into<String>) -> Self {
        Self::QuotaExceeded(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn locked(msg: impl Into<String>) -> Self {
        Self::Locked(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            DomainError::InvalidState(_) => ErrorKind::InvalidState,
            DomainError::Locked(_) => ErrorKind::Locked,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::InvalidId(_) => ErrorKind::InvalidId,
        }
    }

    /// Whether retrying the same request later can succeed without changes.
    ///
    /// `Locked` clears once the campaign closes; `Conflict` clears on reload.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Locked(_) | DomainError::Conflict(_))
    }
}
