//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required field is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record no longer exists (stale id).
    #[error("not found: {0}")]
    NotFound(String),

    /// A vehicle unit is already reserved by another sale, a unique key is
    /// taken, or a versioned write was based on a stale read.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A delete was blocked by dependent records.
    #[error("referential restriction: {0}")]
    ReferentialRestriction(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn restricted(msg: impl Into<String>) -> Self {
        Self::ReferentialRestriction(msg.into())
    }

    /// Whether the user can fix this by correcting the input and retrying.
    pub fn is_correctable(&self) -> bool {
        matches!(
            self,
            DomainError::Validation(_) | DomainError::ReferentialRestriction(_)
        )
    }
}

/// Require a non-blank text field, returning it trimmed.
pub fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}
