// src/error.rs

use std::path::PathBuf;

use crate::config::ValidationReport;

/// Result type used throughout the kogia library
pub type KogiaResult<T> = Result<T, KogiaError>;

/// All possible errors that can occur in the kogia library
#[derive(thiserror::Error, Debug)]
pub enum KogiaError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Configuration file does not exist
    #[error("Configuration file not found: {}", .path.display())]
    ConfigNotFound { path: PathBuf },

    /// Configuration file is not valid YAML for the schema
    #[error("Failed to parse configuration: {source}")]
    ConfigParse {
        #[from]
        source: serde_yaml::Error,
    },

    /// One or more services failed validation
    #[error("{} service(s) failed validation", .report.len())]
    Validation { report: ValidationReport },

    /// A duration string could not be parsed
    #[error("Invalid duration '{input}': {message}")]
    InvalidDuration { input: String, message: String },

    /// A call to the metric source or orchestrator failed
    #[error("Backend call failed for '{operation}': {message}")]
    Backend { operation: String, message: String },

    /// The service cannot be scaled because it is not in replicated mode
    #[error("Service '{service}' is not in replicated mode, scale can only be used with replicated services")]
    NotReplicated { service: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// HTTP transport errors
    #[cfg(feature = "http-backends")]
    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Helper methods for creating common errors
impl KogiaError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_duration<I: Into<String>, M: Into<String>>(input: I, message: M) -> Self {
        Self::InvalidDuration {
            input: input.into(),
            message: message.into(),
        }
    }

    pub fn backend<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn not_replicated<S: Into<String>>(service: S) -> Self {
        Self::NotReplicated {
            service: service.into(),
        }
    }
}
