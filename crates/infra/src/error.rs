//! Store-level error model.

use caravan_core::DomainError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by repositories and background collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Business failure (validation, conflict, restriction, stale id).
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A stored row could not be turned back into a domain value.
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    /// The interpreter or script needed for reports is missing.
    #[error("external tool unavailable: {0}")]
    ExternalToolUnavailable(String),

    /// The cloud collaborator has no credentials configured.
    #[error("cloud sync credentials are missing")]
    CredentialMissing,

    /// An external collaborator ran but failed.
    #[error("external collaborator failed: {0}")]
    External(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// The domain error, if this is a business failure.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            StoreError::Domain(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Domain(DomainError::Conflict(_)))
    }
}

/// Map a sqlx error, turning constraint violations into domain errors.
pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Domain(DomainError::conflict(format!(
                "{operation}: {}",
                db_err.message()
            )));
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::Domain(DomainError::restricted(format!(
                "{operation}: {}",
                db_err.message()
            )));
        }
    }
    StoreError::Database {
        operation,
        source: err,
    }
}

/// `map_err` adapter: `.map_err(db_err("load_sale"))`.
pub(crate) fn db_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| map_sqlx_error(operation, e)
}
