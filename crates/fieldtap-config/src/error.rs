// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types.
//!
//! ```text
//! read file ──► resolve ${VAR} ──► parse ──► env overrides ──► validate
//!   FileNotFound                    Parse      InvalidEnvVar     MissingField
//!   Io                                                           Validation
//!   UnsupportedFormat                                            InvalidSubscription
//! ```
//!
//! Host category documents fail with [`ConfigError::InvalidCategory`] before
//! any of the above runs.

use std::path::{Path, PathBuf};

use thiserror::Error;

use fieldtap_opcua::ConfigurationError;

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("File not found: {}", .path.display())]
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The configuration file exists but could not be read.
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension names no known format.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The extension that was found.
        format: String,
    },

    /// The document is not valid YAML, TOML or JSON, or does not match the schema.
    #[error("Failed to parse {format} config{}: {message}", located(.path))]
    Parse {
        /// Format name.
        format: &'static str,
        /// Source file, when loaded from disk.
        path: Option<PathBuf>,
        /// Parser message.
        message: String,
    },

    /// An override variable holds an unusable value.
    #[error("Invalid environment variable value for '{name}': {message}")]
    InvalidEnvVar {
        /// The variable name.
        name: String,
        /// What was expected.
        message: String,
    },

    /// A required setting is absent.
    #[error("Missing required field: {field}")]
    MissingField {
        /// The setting name.
        field: String,
    },

    /// A setting is present but out of range.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The setting name.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The subscription document is JSON but not `{"subscriptions": [...]}`.
    #[error("Invalid subscription document: {message}")]
    InvalidSubscription {
        /// What is wrong with it.
        message: String,
    },

    /// The host category is not an object of `{value, default}` items.
    #[error("Invalid configuration category: {message}")]
    InvalidCategory {
        /// What is wrong with it.
        message: String,
    },
}

fn located(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" '{}'", p.display()))
        .unwrap_or_default()
}

impl ConfigError {
    pub(crate) fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub(crate) fn parse(format: &'static str, message: impl ToString) -> Self {
        Self::Parse {
            format,
            path: None,
            message: message.to_string(),
        }
    }

    pub(crate) fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_subscription(message: impl Into<String>) -> Self {
        Self::InvalidSubscription {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_category(message: impl Into<String>) -> Self {
        Self::InvalidCategory {
            message: message.into(),
        }
    }

    /// Attaches the source file to a parse error; other errors pass through.
    pub(crate) fn at_path(self, file: &Path) -> Self {
        match self {
            Self::Parse { format, message, .. } => Self::Parse {
                format,
                path: Some(file.to_path_buf()),
                message,
            },
            other => other,
        }
    }

    /// Returns the setting this error is about, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field } | Self::Validation { field, .. } => Some(field),
            Self::InvalidSubscription { .. } => Some("subscription"),
            Self::InvalidEnvVar { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<ConfigurationError> for ConfigError {
    fn from(error: ConfigurationError) -> Self {
        match &error {
            ConfigurationError::InvalidValue { field, .. } => Self::validation(*field, error.to_string()),
            ConfigurationError::InvalidFilter { .. } => Self::invalid_subscription(error.to_string()),
            ConfigurationError::InvalidNodeId { .. } => Self::validation("subscriptions", error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_location() {
        let bare = ConfigError::parse("JSON", "expected value at line 1 column 3");
        assert_eq!(bare.to_string(), "Failed to parse JSON config: expected value at line 1 column 3");

        let located = bare.at_path(Path::new("plant.json"));
        assert_eq!(
            located.to_string(),
            "Failed to parse JSON config 'plant.json': expected value at line 1 column 3"
        );
    }

    #[test]
    fn test_at_path_leaves_other_errors() {
        let error = ConfigError::missing_field("url").at_path(Path::new("plant.yaml"));
        assert_eq!(error.to_string(), "Missing required field: url");
        assert_eq!(error.field(), Some("url"));
    }

    #[test]
    fn test_from_engine_configuration_error() {
        let error: ConfigError = ConfigurationError::invalid_value("assetNameType", "Bogus").into();
        assert!(matches!(error, ConfigError::Validation { .. }));
        assert_eq!(error.field(), Some("assetNameType"));

        let error: ConfigError = ConfigurationError::invalid_filter("x:Speed", "bad namespace").into();
        assert_eq!(error.field(), Some("subscription"));
    }
}
