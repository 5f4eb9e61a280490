// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Error types for Specforge
//!
//! This module defines all error types used throughout the engine.

use thiserror::Error;

/// How many characters of an unclassified provider message survive into the
/// user-facing error. The full message goes to the log, never to the caller.
const UNKNOWN_MESSAGE_LIMIT: usize = 200;

/// Main error type for Specforge operations
#[derive(Error, Debug)]
pub enum SpecforgeError {
    /// Provider API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Durable storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generation session errors
    #[error("Session error: {0}")]
    Session(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Provider-facing error taxonomy
///
/// Every adapter classifies its wire-level failures into exactly these
/// variants, so the orchestrator and callers never see provider-specific
/// status codes or error-type strings.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid or missing credential)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the provider
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Provider returned a server-side failure (5xx, overloaded)
    #[error("Provider error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// The request itself was rejected as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The caller cancelled the in-flight generation
    #[error("Generation cancelled")]
    Cancelled,

    /// Anything the adapter could not classify
    #[error("Unexpected provider error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// Build an `Unknown` error with the message truncated for display.
    pub fn unknown(message: impl Into<String>) -> Self {
        let message: String = message.into();
        tracing::warn!(raw = %message, "unclassified provider error");
        let truncated = if message.chars().count() > UNKNOWN_MESSAGE_LIMIT {
            let cut: String = message.chars().take(UNKNOWN_MESSAGE_LIMIT).collect();
            format!("{cut}...")
        } else {
            message
        };
        ApiError::Unknown(truncated)
    }

    /// Whether this classification is eligible for retry with backoff.
    ///
    /// Only transient conditions qualify; auth and request-shape failures
    /// are fatal on first occurrence, and cancellation is never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited(_) | ApiError::ServerError { .. } | ApiError::Network(_)
        )
    }

    /// Whether this error represents a caller-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

/// Durable-storage error taxonomy
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing store is out of space
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Write failed for some other reason
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// The persisted document could not be read
    #[error("Read failed: {0}")]
    ReadFailed(String),
}

impl StorageError {
    /// Classify an IO error from a write, keeping quota exhaustion distinct
    /// so callers can present "storage full" instead of a generic failure.
    pub fn from_write_io(err: std::io::Error) -> Self {
        // ENOSPC is 28 on every unix target Rust supports.
        if err.raw_os_error() == Some(28) {
            StorageError::QuotaExceeded(err.to_string())
        } else {
            StorageError::WriteFailed(err.to_string())
        }
    }
}

/// Result type alias for Specforge operations
pub type Result<T> = std::result::Result<T, SpecforgeError>;
