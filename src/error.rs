//! Crate-wide error taxonomy.
//!
//! Conflict / NotFound / Validation surface directly to callers; GitExec and
//! GitTimeout wrap the external tool boundary with the op name and the tool's
//! diagnostic text.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The requested resource is already claimed elsewhere. The message names
    /// the session holding the active execution.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("validation: {0}")]
    Validation(String),

    #[error("not a git repository: {0}")]
    NotARepository(String),

    /// git invocation failed (absent binary or non-zero exit).
    #[error("git {op} failed: {message}")]
    GitExec { op: &'static str, message: String },

    #[error("git {op} timed out after {secs}s")]
    GitTimeout { op: &'static str, secs: u64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// True when the underlying sqlx error is a unique-constraint violation.
    /// Used to map races on the active-execution index into `Conflict`.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}
