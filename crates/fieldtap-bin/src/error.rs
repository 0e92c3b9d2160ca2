// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the fieldtap binary.
//!
//! Exit codes:
//!
//! | Code | Cause                                  |
//! |------|----------------------------------------|
//! | 1    | configuration could not be used        |
//! | 2    | the process could not be set up        |
//! | 3    | the subscription session failed        |
//! | 4    | output could not be encoded or written |

use thiserror::Error;

use fieldtap_config::ConfigError;
use fieldtap_opcua::OpcUaError;

/// Result type alias for fieldtap-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors surfaced by the plugin facade and the CLI.
#[derive(Debug, Error)]
pub enum BinError {
    /// The configuration is unusable for reasons the loader does not check.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Process setup failed before a session was attempted.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Loading or validating configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The subscription engine failed.
    #[error("OPC UA error: {0}")]
    OpcUa(#[from] OpcUaError),

    /// Encoding a record or report as JSON failed.
    #[error("Failed to encode JSON: {0}")]
    Encode(#[from] serde_json::Error),

    /// Encoding a report as YAML failed.
    #[error("Failed to encode YAML: {0}")]
    EncodeYaml(#[from] serde_yaml::Error),

    /// Writing records failed.
    #[error("Failed to write records: {0}")]
    Output(#[from] std::io::Error),

    /// An error annotated with what was being attempted.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being attempted.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Wraps the error with `context`.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping context wrappers.
    pub fn root(&self) -> &BinError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the process exit code.
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            Self::Configuration(_) | Self::Config(_) => 1,
            Self::Initialization(_) => 2,
            Self::OpcUa(_) => 3,
            Self::Encode(_) | Self::EncodeYaml(_) | Self::Output(_) | Self::WithContext { .. } => 4,
        }
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Prints the error, its causes and any recovery hints to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    if let BinError::OpcUa(err) = error.root() {
        eprintln!("  Code: {}", err.error_code());
        for hint in err.recovery_hints() {
            eprintln!("  Hint: {}", hint);
        }
    }
}

/// Reports an error and exits with its exit code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldtap_opcua::SessionError;

    #[test]
    fn test_context_wraps_message() {
        let err = BinError::config("OPC UA plugin is missing a URL").with_context("Failed to start plugin");
        assert_eq!(
            err.to_string(),
            "Failed to start plugin: Configuration error: OPC UA plugin is missing a URL"
        );
        assert!(matches!(err.root(), BinError::Configuration(_)));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::config("no url").exit_code(), 1);
        assert_eq!(BinError::from(ConfigError::missing_field("url")).exit_code(), 1);
        assert_eq!(BinError::init("no transport").exit_code(), 2);
        assert_eq!(BinError::from(OpcUaError::from(SessionError::NoSubscriptions)).exit_code(), 3);
        assert_eq!(
            BinError::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).exit_code(),
            4
        );
    }

    #[test]
    fn test_context_keeps_inner_exit_code() {
        let err = BinError::from(OpcUaError::not_connected()).with_context("Failed to start plugin");
        assert_eq!(err.exit_code(), 3);
    }
}
