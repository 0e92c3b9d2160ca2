// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for fieldtap.
//!
//! Keys are camelCase so a configuration file uses the same item names as the
//! plugin host's configuration category.
//!
//! # Schema Structure
//!
//! ```text
//! PluginConfig
//! ├── asset                   prefix of every asset name
//! ├── url                     opc.tcp:// endpoint
//! ├── subscriptions           filter strings
//! ├── subscription            optional {"subscriptions": [...]} document
//! ├── subscribeById
//! ├── assetNameType
//! ├── pathDelimiter
//! ├── reportingInterval       milliseconds
//! ├── zeroSubscriptionPolicy
//! ├── integerOverflow
//! ├── maxWalkDepth
//! └── logging: LoggingConfig
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use fieldtap_opcua::naming::DEFAULT_MAX_DEPTH;
use fieldtap_opcua::{
    AssetNameType, DecoderOptions, IntegerOverflow, PathDelimiter, SessionSettings,
    ZeroSubscriptionPolicy,
};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default asset name prefix.
pub const DEFAULT_ASSET: &str = "opcua";

/// Default server endpoint.
pub const DEFAULT_URL: &str = "opc.tcp://mark.local:53530/OPCUA/SimulationServer";

/// Default subscription filter.
pub const DEFAULT_SUBSCRIPTION: &str = "ns=5;s=85/0:Simulation";

/// Default reporting interval in milliseconds.
pub const DEFAULT_REPORTING_INTERVAL_MS: u64 = 100;

/// Default path delimiter.
pub const DEFAULT_PATH_DELIMITER: &str = "/";

/// Required endpoint scheme.
pub const ENDPOINT_SCHEME: &str = "opc.tcp://";

// =============================================================================
// PluginConfig
// =============================================================================

/// The root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PluginConfig {
    /// Asset name prefix.
    #[serde(default = "default_asset")]
    pub asset: String,

    /// Server endpoint.
    #[serde(default = "default_url")]
    pub url: String,

    /// Subscription filters.
    #[serde(default = "default_subscriptions")]
    pub subscriptions: Vec<String>,

    /// Subscription document; when present it replaces `subscriptions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    /// Filters are identity references.
    #[serde(default = "default_subscribe_by_id")]
    pub subscribe_by_id: bool,

    /// Asset naming policy.
    #[serde(default)]
    pub asset_name_type: AssetNameType,

    /// Path delimiter; only the first character is used.
    #[serde(default = "default_path_delimiter")]
    pub path_delimiter: String,

    /// Minimum reporting interval in milliseconds.
    #[serde(default = "default_reporting_interval")]
    pub reporting_interval: u64,

    /// What to do when a pass registers nothing.
    #[serde(default)]
    pub zero_subscription_policy: ZeroSubscriptionPolicy,

    /// Handling of unsigned 64-bit values beyond the signed range.
    #[serde(default)]
    pub integer_overflow: IntegerOverflow,

    /// Bound on address-space walk depth.
    #[serde(default = "default_max_walk_depth")]
    pub max_walk_depth: usize,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_asset() -> String {
    DEFAULT_ASSET.to_string()
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_subscriptions() -> Vec<String> {
    vec![DEFAULT_SUBSCRIPTION.to_string()]
}

fn default_subscribe_by_id() -> bool {
    true
}

fn default_path_delimiter() -> String {
    DEFAULT_PATH_DELIMITER.to_string()
}

fn default_reporting_interval() -> u64 {
    DEFAULT_REPORTING_INTERVAL_MS
}

fn default_max_walk_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            asset: default_asset(),
            url: default_url(),
            subscriptions: default_subscriptions(),
            subscription: None,
            subscribe_by_id: default_subscribe_by_id(),
            asset_name_type: AssetNameType::default(),
            path_delimiter: default_path_delimiter(),
            reporting_interval: default_reporting_interval(),
            zero_subscription_policy: ZeroSubscriptionPolicy::default(),
            integer_overflow: IntegerOverflow::default(),
            max_walk_depth: default_max_walk_depth(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PluginConfig {
    /// Validates the configuration.
    ///
    /// - `url` must be non-empty and start with `opc.tcp://`
    /// - `reportingInterval` must be positive
    /// - `maxWalkDepth` must be positive
    pub fn validate(&self) -> ConfigResult<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::missing_field("url"));
        }
        if !self.url.starts_with(ENDPOINT_SCHEME) {
            return Err(ConfigError::validation(
                "url",
                format!("endpoint must start with {}", ENDPOINT_SCHEME),
            ));
        }
        if self.reporting_interval == 0 {
            return Err(ConfigError::validation("reportingInterval", "must be greater than 0"));
        }
        if self.max_walk_depth == 0 {
            return Err(ConfigError::validation("maxWalkDepth", "must be greater than 0"));
        }
        Ok(())
    }

    /// Returns non-fatal findings.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.subscriptions.is_empty() {
            warnings.push("No subscriptions configured; every variable below Objects will be monitored".to_string());
        }
        if self.path_delimiter.chars().count() > 1 {
            warnings.push(format!(
                "pathDelimiter '{}' is longer than one character; only '{}' is used",
                self.path_delimiter,
                self.delimiter().as_char()
            ));
        }
        if self.subscribe_by_id {
            for filter in &self.subscriptions {
                if fieldtap_opcua::NodeId::parse_identity_ref(filter).is_err() {
                    warnings.push(format!("Subscription '{}' is not a node identity and will be skipped", filter));
                }
            }
        }
        warnings
    }

    /// Returns the reporting interval.
    pub fn reporting_interval_duration(&self) -> Duration {
        Duration::from_millis(self.reporting_interval)
    }

    /// Returns the parsed path delimiter.
    pub fn delimiter(&self) -> PathDelimiter {
        PathDelimiter::from_config(&self.path_delimiter)
    }

    /// Replaces `subscriptions` with the content of the `subscription`
    /// document, if one is set.
    ///
    /// A document that is not JSON leaves an empty filter list.
    pub fn resolve_subscription_document(&mut self) -> ConfigResult<()> {
        if let Some(document) = self.subscription.take() {
            self.subscriptions = SubscriptionDocument::parse(&document)?
                .map(|doc| doc.subscriptions)
                .unwrap_or_default();
        }
        Ok(())
    }

    /// Builds the session settings.
    pub fn session_settings(&self) -> SessionSettings {
        let mut settings = SessionSettings::new(self.url.clone())
            .with_asset_name(self.asset.clone())
            .with_reporting_interval(self.reporting_interval_duration())
            .with_subscribe_by_id(self.subscribe_by_id)
            .with_asset_name_type(self.asset_name_type)
            .with_path_delimiter(self.delimiter())
            .with_zero_subscription_policy(self.zero_subscription_policy)
            .with_decoder(DecoderOptions {
                integer_overflow: self.integer_overflow,
            });
        settings.max_walk_depth = self.max_walk_depth;
        settings
    }
}

// =============================================================================
// SubscriptionDocument
// =============================================================================

/// The `{"subscriptions": [...]}` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionDocument {
    /// Filter strings.
    pub subscriptions: Vec<String>,
}

impl SubscriptionDocument {
    /// Parses a document.
    ///
    /// Returns `Ok(None)` when the text is not JSON, which callers treat as
    /// "no document". Non-string elements are skipped with a warning.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidSubscription`] when the JSON has no
    /// `subscriptions` array.
    pub fn parse(document: &str) -> ConfigResult<Option<Self>> {
        let value: Value = match serde_json::from_str(document) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Subscription document is not valid JSON, ignoring");
                return Ok(None);
            }
        };

        let entries = value
            .get("subscriptions")
            .and_then(Value::as_array)
            .ok_or_else(|| ConfigError::invalid_subscription("missing a subscriptions array"))?;

        let mut subscriptions = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match entry.as_str() {
                Some(s) => subscriptions.push(s.to_string()),
                None => warn!(index, entry = %entry, "Skipping non-string subscription entry"),
            }
        }
        Ok(Some(Self { subscriptions }))
    }

    /// Renders the document as JSON text.
    pub fn to_json(&self) -> String {
        serde_json::json!({ "subscriptions": self.subscriptions }).to_string()
    }
}

// =============================================================================
// LoggingConfig
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::validation("logging.level", format!("unknown level '{}'", s))),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON lines.
    Json,
    /// Compact single line.
    Compact,
}

// =============================================================================
// Tests
// =============================================================================
