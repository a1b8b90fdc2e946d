//! # AppError
//!
//! Centralized error handling for the distributed forum.
//! The Display text of every variant is the exact message returned to callers.

use thiserror::Error;

/// The primary error type for all ds-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or oversized request fields (e.g. "missing post id")
    #[error("{0}")]
    Validation(String),

    /// Record, post or session absent (e.g. "post or comment not found")
    #[error("{0}")]
    NotFound(String),

    /// No usable identity behind the request (e.g. "not logged in")
    #[error("{0}")]
    Unauthorized(String),

    /// The write would duplicate existing state (e.g. "already voted")
    #[error("{0}")]
    Conflict(String),

    /// An external service call failed; the message is passed through verbatim.
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Upstream(anyhow::anyhow!("malformed record: {err}"))
    }
}

/// A specialized Result type for forum logic.
pub type Result<T> = std::result::Result<T, AppError>;
