//! # AppError
//!
//! Centralized error handling for Agri-Sentinel.
//! Every failure is recoverable: callers turn it into a user-visible notice
//! and leave prior state untouched.

use thiserror::Error;

/// Rejected user input. Nothing is written when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("please enter your farming question")]
    EmptyQuestion,

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("unknown status: {0}")]
    UnknownStatus(String),

    #[error("unsupported language: {0}")]
    UnknownLanguage(String),

    #[error("invalid email address")]
    InvalidEmail,

    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
}

/// The primary error type for all ag-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Microphone or storage access refused by the platform.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Resource not found (e.g., Query, Profile)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Persistence or identity collaborator failure.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Resource already exists (e.g., duplicate email)
    #[error("conflict: {0}")]
    Conflict(String),
}

impl AppError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        AppError::NotFound(entity.to_string(), id.to_string())
    }

    /// Wraps an infrastructure failure coming out of a port.
    pub fn backend(err: anyhow::Error) -> Self {
        AppError::Backend(format!("{err:#}"))
    }
}

/// A specialized Result type for Agri-Sentinel logic.
pub type Result<T> = std::result::Result<T, AppError>;
