//! # Application Error Types
//!
//! This module defines the error types shared by the polling bot and its
//! collaborators (marketplace APIs, chat transport, order store, remote disk).
//! "Not found" is never an error here: lookups return `Ok(None)`.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Order store errors
    Database(String),
    /// Marketplace / chat API communication errors
    Network(String),
    /// Remote disk errors
    Storage(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Database(msg) => write!(f, "[DATABASE] {}", msg),
            AppError::Network(msg) => write!(f, "[NETWORK] {}", msg),
            AppError::Storage(msg) => write!(f, "[STORAGE] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Network(format!("unexpected response shape: {}", err))
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Log order store errors with contextual information
    pub fn log_database_error(
        error: &impl std::fmt::Display,
        operation: &str,
        key: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            key = ?key,
            "Database operation failed"
        );
    }

    /// Log network/communication errors with connection context
    pub fn log_network_error(
        error: &impl std::fmt::Display,
        operation: &str,
        endpoint: Option<&str>,
        attempt_count: Option<u32>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            endpoint = ?endpoint,
            attempt_count = ?attempt_count,
            "Network operation failed"
        );
    }

    /// Log remote disk errors with path and size context
    pub fn log_storage_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        file_size: Option<usize>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            file_size_bytes = ?file_size,
            "Remote storage operation failed"
        );
    }

    /// Log chat pipeline errors with chat context
    pub fn log_chat_error(
        error: &impl std::fmt::Display,
        operation: &str,
        chat_id: &str,
        rid: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            chat_id = %chat_id,
            rid = ?rid,
            "Chat processing failed"
        );
    }

    /// Log internal application errors with component context
    pub fn log_internal_error(error: &impl std::fmt::Display, component: &str, operation: &str) {
        error!(
            error = %error,
            component = %component,
            operation = %operation,
            "Internal application error"
        );
    }
}
