//! Error type for the worktrack library.
//!
//! Expected business-rule violations never land here; they are values in
//! `validate`. This enum covers the failures a command cannot recover from
//! locally: missing setup, missing session, denied access, unknown records,
//! and store I/O.

use thiserror::Error;

use super::validate::FieldErrors;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Tracker not initialized. Run `worktrack init` first.")]
    NotInitialized,

    #[error("Not logged in. Run `worktrack login` first.")]
    NotLoggedIn,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("You do not have permission to {action}")]
    PermissionDenied { action: String },

    #[error("{entity} '{reference}' not found")]
    NotFound {
        entity: &'static str,
        reference: String,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("Failed to save because of missing or invalid fields ({0})")]
    Validation(FieldErrors),

    #[error("Unknown sort column '{0}'")]
    InvalidSortKey(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrackerError {
    pub fn not_found(entity: &'static str, reference: impl ToString) -> Self {
        Self::NotFound {
            entity,
            reference: reference.to_string(),
        }
    }

    pub fn denied(action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action: action.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
