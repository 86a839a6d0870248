//! Error type definitions for the favicon service
//!
//! Everything beneath the resolution coordinator returns a classified error
//! from this module. Only the web layer maps errors to HTTP statuses and
//! externally visible messages; internal detail stays in the logs.

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Request validation errors (bad or oversized URLs)
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Icon discovery errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Image decode/encode errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Object store errors
    #[error("Object store error: {operation} - {message}")]
    Store { operation: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Icon discovery specific errors
///
/// These two are the only discovery outcomes with a caller-visible contract:
/// `IconNotFound` degrades to the caller-supplied fallback URL, while
/// `UnreachableServer` surfaces as an ordinary bad request.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("icon not found")]
    IconNotFound,

    #[error("unreachable server")]
    UnreachableServer,
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an object store error
    pub fn store<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
