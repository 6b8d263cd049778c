//! Brook Common Error Types
//!
//! Centralized error handling for all Brook components

use std::fmt;

/// Main error type for Brook operations
#[derive(Debug)]
pub enum BrookError {
    /// Generic error with message
    Generic(String),
    /// IO-related errors
    Io(std::io::Error),
    /// Serialization/deserialization errors
    Serde(serde_json::Error),
    /// Configuration errors (missing agent manager, unresolvable provider)
    Config(String),
    /// Provider/upstream errors
    Provider(String),
    /// Wire-format rendering errors
    Serialization(String),
    /// Stream aggregation errors
    Aggregation(String),
    /// Session lifecycle errors
    Session(String),
}

impl fmt::Display for BrookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrookError::Generic(msg) => write!(f, "Brook error: {}", msg),
            BrookError::Io(err) => write!(f, "IO error: {}", err),
            BrookError::Serde(err) => write!(f, "Serialization error: {}", err),
            BrookError::Config(msg) => write!(f, "Configuration error: {}", msg),
            BrookError::Provider(msg) => write!(f, "Provider error: {}", msg),
            BrookError::Serialization(msg) => write!(f, "Wire format error: {}", msg),
            BrookError::Aggregation(msg) => write!(f, "Aggregation error: {}", msg),
            BrookError::Session(msg) => write!(f, "Session error: {}", msg),
        }
    }
}

impl std::error::Error for BrookError {}

/// Convenience result type for Brook operations
pub type Result<T> = std::result::Result<T, BrookError>;

// Implement From traits for common error types
impl From<std::io::Error> for BrookError {
    fn from(err: std::io::Error) -> Self {
        BrookError::Io(err)
    }
}

impl From<serde_json::Error> for BrookError {
    fn from(err: serde_json::Error) -> Self {
        BrookError::Serde(err)
    }
}

impl From<anyhow::Error> for BrookError {
    fn from(err: anyhow::Error) -> Self {
        BrookError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_variant_context() {
        let err = BrookError::Config("agent manager not configured".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: agent manager not configured"
        );

        let err = BrookError::Provider("no provider supports streaming".to_string());
        assert!(err.to_string().starts_with("Provider error:"));
    }

    #[test]
    fn converts_from_serde_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: BrookError = serde_err.into();
        assert!(matches!(err, BrookError::Serde(_)));
    }
}
