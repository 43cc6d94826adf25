//! Error types for LogIQ
//!
//! Mining itself never fails; errors only arise from configuration and
//! from parsing externally supplied template identifiers.

use thiserror::Error;

/// Result type alias for LogIQ operations
pub type Result<T> = std::result::Result<T, LogiqError>;

/// Main error type for LogIQ operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogiqError {
    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Template ID not in 16-hex-digit form
    #[error("Invalid template ID: {0}")]
    InvalidTemplateId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LogiqError::InvalidConfig("max_depth must be at least 1".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid configuration"));
        assert!(msg.contains("max_depth"));
    }
}
