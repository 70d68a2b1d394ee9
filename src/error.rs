//! Error types for http-dl
//!
//! This module provides the error taxonomy for the library:
//! - Transient transfer errors (network transport, timeouts, HTTP status) that
//!   are eligible for backoff retry
//! - Incomplete-transfer errors (body ended before the expected size)
//! - Storage errors (directory creation, promote/rename failures)
//! - Database errors from the task store
//! - Configuration errors for invalid tunables
//!
//! Which errors count as transient is decided by [`crate::retry::IsRetryable`].

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for http-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for http-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retry.max_tries")
        key: Option<String>,
    },

    /// Task store operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Network transport error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success HTTP status
    #[error("server returned {status} for {url}")]
    HttpStatus {
        /// The URL that was requested
        url: String,
        /// The non-success status the server answered with
        status: StatusCode,
    },

    /// No response headers or body data arrived within the per-read socket timeout
    #[error("read timed out while downloading {url}")]
    ReadTimeout {
        /// The URL whose body read timed out
        url: String,
    },

    /// Response body ended before the expected total size was received
    #[error("incomplete transfer for {url}: expected {expected} bytes, received {received}")]
    Incomplete {
        /// The URL whose transfer ended short
        url: String,
        /// Expected total size in bytes, from content-length
        expected: u64,
        /// Bytes actually present on disk after the stream ended
        received: u64,
    },

    /// Partial/completed file storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the partial/completed file storage layer
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to create the partial or completed directory
    #[error("failed to create storage directory {path}: {reason}")]
    CreateDir {
        /// The directory that could not be created
        path: PathBuf,
        /// The underlying I/O failure
        reason: String,
    },

    /// Promote was called but no partial file exists for the URL
    #[error("no partial file to promote at {path}")]
    MissingPartial {
        /// The partial path that was expected to exist
        path: PathBuf,
    },

    /// Renaming the partial file into the completed directory failed
    #[error("failed to promote {from} to {to}: {reason}")]
    Promote {
        /// The partial path being renamed
        from: PathBuf,
        /// The completed path being renamed to
        to: PathBuf,
        /// The underlying I/O failure (permissions, cross-device, etc.)
        reason: String,
    },
}

/// Task-store persistence errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to the task database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run schema migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Task not found
    #[error("task not found: {0}")]
    NotFound(String),
}
