//! Typed error hierarchy for the spooldesk store.
//!
//! `StoreError` covers the conditions the API layer needs to distinguish
//! from plain internal failures: uniqueness conflicts, missing stock, and
//! broken references. Everything else travels as `anyhow::Error` context
//! chains and surfaces as an internal error.

use thiserror::Error;

/// Errors from the persistence layer that callers can react to.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Stock label {label} is already in use")]
    LabelTaken { label: i64 },

    #[error("Username '{username}' is already taken")]
    UsernameTaken { username: String },

    #[error("No stock with label {label}")]
    StockNotFound { label: i64 },

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
