// LogIQ Detection - Windowed baselines and anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Error types for LogIQ Detection

use logiq::Retryable;
use thiserror::Error;

/// Main error type for detection operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    /// An active-only query was made while the baseline is still learning
    #[error("Baseline not ready: still learning")]
    BaselineNotReady,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Event source failure
    #[error("Event source error: {0}")]
    Source(#[from] SourceError),

    /// Anomaly sink failure
    #[error("Anomaly sink error: {0}")]
    Sink(#[from] SinkError),

    /// Engine snapshot could not be written, read or applied
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

/// Errors raised by an event source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Temporarily unreachable; retried
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Query rejected; retrying will not help
    #[error("rejected: {0}")]
    Rejected(String),
}

impl Retryable for SourceError {
    fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

/// Errors raised by an anomaly sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Temporarily unreachable; retried and requeued
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Record rejected; retrying will not help
    #[error("rejected: {0}")]
    Rejected(String),
}

impl Retryable for SinkError {
    fn is_transient(&self) -> bool {
        matches!(self, SinkError::Unavailable(_))
    }
}

/// Result type alias for detection operations
pub type Result<T> = std::result::Result<T, DetectError>;
