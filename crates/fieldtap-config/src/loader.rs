// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for fieldtap.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Parse YAML/TOML/JSON into [`PluginConfig`]
//! 4. Apply `FIELDTAP_*` environment overrides
//! 5. Replace the filter list with the `subscription` document, if any
//! 6. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! FIELDTAP_URL=opc.tcp://plc:4840
//! FIELDTAP_ASSET=line1/
//! FIELDTAP_REPORTING_INTERVAL=250
//! FIELDTAP_LOG_LEVEL=debug
//! ```
//!
//! Variable lookup goes through a closure so tests never touch the process
//! environment.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::PluginConfig;

/// Environment lookup function.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "FIELDTAP";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
///
/// # Examples
///
/// ```no_run
/// use fieldtap_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("fieldtap.yaml").unwrap();
/// println!("{}", config.url);
/// ```
#[derive(Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
    lookup: EnvLookup,
}

impl ConfigLoader {
    /// Creates a loader reading the process environment.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
            lookup: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Replaces the environment lookup.
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookup = Arc::new(lookup);
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format is determined by the extension: `.yaml`/`.yml`, `.toml`
    /// or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<PluginConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let config = self.process(&content, format).map_err(|e| e.at_path(path))?;

        debug!(
            url = %config.url,
            subscriptions = config.subscriptions.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<PluginConfig> {
        self.process(content, format)
    }

    fn process(&self, content: &str, format: ConfigFormat) -> ConfigResult<PluginConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)?
        } else {
            content.to_string()
        };

        let mut config = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        config.resolve_subscription_document()?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    /// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
    ///
    /// An unset variable without a default is kept verbatim.
    pub fn resolve_env_placeholders(&self, content: &str) -> ConfigResult<String> {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (var_content.as_str(), None),
            };

            match ((self.lookup)(var_name), default_value) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(default)) => result.push_str(default),
                (None, None) => {
                    warn!(variable = %var_name, "Environment variable not found");
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        }

        Ok(result)
    }

    fn apply_env_overrides(&self, config: &mut PluginConfig) -> ConfigResult<()> {
        let var = |suffix: &str| format!("{}_{}", self.env_prefix, suffix);

        if let Some(value) = (self.lookup)(&var("URL")) {
            config.url = value;
        }
        if let Some(value) = (self.lookup)(&var("ASSET")) {
            config.asset = value;
        }
        if let Some(value) = (self.lookup)(&var("REPORTING_INTERVAL")) {
            config.reporting_interval = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(var("REPORTING_INTERVAL"), "expected milliseconds"))?;
        }
        if let Some(value) = (self.lookup)(&var("LOG_LEVEL")) {
            match value.parse() {
                Ok(level) => config.logging.level = level,
                Err(_) => warn!(value = %value, "Ignoring unknown log level override"),
            }
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("env_prefix", &self.env_prefix)
            .field("resolve_env_vars", &self.resolve_env_vars)
            .finish()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

fn parse_str(content: &str, format: ConfigFormat) -> ConfigResult<PluginConfig> {
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| ConfigError::parse("YAML", e)),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::parse("TOML", e)),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| ConfigError::parse("JSON", e)),
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default loader settings.
///
/// ```no_run
/// use fieldtap_config::load_config;
///
/// let config = load_config("fieldtap.yaml").unwrap();
/// ```
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<PluginConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<PluginConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn loader(pairs: &[(&str, &str)]) -> ConfigLoader {
        ConfigLoader::new().with_lookup(env(pairs))
    }

    const YAML: &str = r#"
asset: line1/
url: opc.tcp://plc:4840
subscriptions:
  - "5:Simulation"
subscribeById: false
assetNameType: Subscription Path with BrowseName
reportingInterval: 500
"#;

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = loader(&[]).load(file.path()).unwrap();

        assert_eq!(config.asset, "line1/");
        assert_eq!(config.subscriptions, vec!["5:Simulation".to_string()]);
        assert!(!config.subscribe_by_id);
        assert_eq!(config.reporting_interval, 500);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
url = "opc.tcp://plc:4840"
subscriptions = ["Random1"]
subscribeById = false
"#;
        let config = loader(&[]).load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.subscriptions, vec!["Random1".to_string()]);
        assert_eq!(config.asset, "opcua");
    }

    #[test]
    fn test_subscription_document_in_json() {
        let json = r#"{
            "url": "opc.tcp://plc:4840",
            "subscription": "{ \"subscriptions\" : [ \"ns=5;s=Random1\" ] }"
        }"#;
        let config = loader(&[]).load_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.subscriptions, vec!["ns=5;s=Random1".to_string()]);
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.TOML")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")).unwrap(), ConfigFormat::Json);
        assert!(ConfigFormat::from_path(Path::new("a.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("fieldtap")).is_err());
    }

    #[test]
    fn test_env_placeholders() {
        let loader = loader(&[("PLC_HOST", "plc7")]);
        assert_eq!(
            loader.resolve_env_placeholders("opc.tcp://${PLC_HOST}:4840").unwrap(),
            "opc.tcp://plc7:4840"
        );
        assert_eq!(loader.resolve_env_placeholders("${MISSING:fallback}").unwrap(), "fallback");
        assert_eq!(loader.resolve_env_placeholders("${MISSING}").unwrap(), "${MISSING}");
        assert_eq!(loader.resolve_env_placeholders("${open").unwrap(), "${open");
    }

    #[test]
    fn test_env_overrides() {
        let loader = loader(&[
            ("FIELDTAP_URL", "opc.tcp://other:4840"),
            ("FIELDTAP_ASSET", "x"),
            ("FIELDTAP_REPORTING_INTERVAL", "750"),
        ]);
        let config = loader.load_from_str(YAML, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.url, "opc.tcp://other:4840");
        assert_eq!(config.asset, "x");
        assert_eq!(config.reporting_interval, 750);
    }

    #[test]
    fn test_invalid_env_override() {
        let loader = loader(&[("FIELDTAP_REPORTING_INTERVAL", "soon")]);
        let err = loader.load_from_str(YAML, ConfigFormat::Yaml).unwrap_err();
        assert_eq!(err.field(), Some("FIELDTAP_REPORTING_INTERVAL"));
    }

    #[test]
    fn test_env_disabled() {
        let loader = loader(&[("FIELDTAP_URL", "opc.tcp://other:4840")]).with_env_vars(false);
        let config = loader.load_from_str(YAML, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.url, "opc.tcp://plc:4840");
    }

    #[test]
    fn test_file_not_found() {
        let err = loader(&[]).load("/nonexistent/fieldtap.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = loader(&[]).load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
