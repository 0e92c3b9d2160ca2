// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration category documents.
//!
//! A plugin host hands configuration over as a JSON object of items, each
//! item an object whose `value` (or, failing that, `default`) is a string:
//!
//! ```json
//! {
//!     "url":               { "value": "opc.tcp://plc:4840" },
//!     "subscription":      { "value": "{ \"subscriptions\" : [ \"5:Simulation\" ] }" },
//!     "reportingInterval": { "value": "250" }
//! }
//! ```
//!
//! [`ConfigCategory::to_plugin_config`] builds a fresh configuration the way
//! plugin init does; [`ConfigCategory::apply`] updates an existing one the
//! way reconfigure does.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use fieldtap_opcua::{AssetNameType, IntegerOverflow, ZeroSubscriptionPolicy};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{DEFAULT_PATH_DELIMITER, DEFAULT_REPORTING_INTERVAL_MS, PluginConfig, SubscriptionDocument};

/// Item values of a configuration category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigCategory {
    items: BTreeMap<String, String>,
}

impl ConfigCategory {
    /// Parses a category document.
    ///
    /// Items with neither `value` nor `default` are skipped. Non-string
    /// values are kept in their JSON text form.
    pub fn parse(json: &str) -> ConfigResult<Self> {
        let root: Value = serde_json::from_str(json).map_err(|e| ConfigError::invalid_category(e.to_string()))?;
        let object = root
            .as_object()
            .ok_or_else(|| ConfigError::invalid_category("document is not an object"))?;

        let mut items = BTreeMap::new();
        for (name, item) in object {
            let Some(item) = item.as_object() else {
                return Err(ConfigError::invalid_category(format!("item '{}' is not an object", name)));
            };
            let value = item.get("value").or_else(|| item.get("default"));
            match value {
                Some(Value::String(s)) => {
                    items.insert(name.clone(), s.clone());
                }
                Some(other) => {
                    items.insert(name.clone(), other.to_string());
                }
                None => debug!(item = %name, "Category item has no value"),
            }
        }
        Ok(Self { items })
    }

    /// Creates a category from name/value pairs.
    pub fn from_items<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            items: items.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Returns `true` if the item is present.
    pub fn item_exists(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Returns an item's value.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.items.get(name).map(String::as_str)
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there are no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Builds a configuration from this category.
    ///
    /// Filters come only from the `subscription` document; a document that is
    /// not JSON leaves the filter list empty.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingField`] without a `url` item
    /// - [`ConfigError::InvalidSubscription`] for a document without a
    ///   `subscriptions` array
    pub fn to_plugin_config(&self) -> ConfigResult<PluginConfig> {
        if !self.item_exists("url") {
            return Err(ConfigError::missing_field("url"));
        }
        let mut config = PluginConfig {
            subscriptions: Vec::new(),
            ..Default::default()
        };
        self.apply(&mut config)?;
        Ok(config)
    }

    /// Applies this category to `config`.
    ///
    /// Absent `reportingInterval`, `assetNameType` and `pathDelimiter` items
    /// reset to their defaults; other absent items leave the value unchanged.
    /// Returns `true` if the filter list was replaced.
    pub fn apply(&self, config: &mut PluginConfig) -> ConfigResult<bool> {
        if let Some(url) = self.value("url") {
            config.url = url.to_string();
        }
        if let Some(asset) = self.value("asset") {
            config.asset = asset.to_string();
        }

        config.reporting_interval = match self.value("reportingInterval") {
            Some(v) => parse_leading_integer(v)
                .ok_or_else(|| ConfigError::validation("reportingInterval", format!("'{}' is not a number", v)))?,
            None => DEFAULT_REPORTING_INTERVAL_MS,
        };

        if let Some(by_id) = self.value("subscribeById") {
            config.subscribe_by_id = by_id == "true";
        }

        config.asset_name_type = match self.value("assetNameType") {
            Some(v) => v.parse::<AssetNameType>()?,
            None => AssetNameType::default(),
        };

        config.path_delimiter = self
            .value("pathDelimiter")
            .unwrap_or(DEFAULT_PATH_DELIMITER)
            .to_string();

        if let Some(v) = self.value("zeroSubscriptionPolicy") {
            config.zero_subscription_policy = v.parse::<ZeroSubscriptionPolicy>()?;
        }
        if let Some(v) = self.value("integerOverflow") {
            config.integer_overflow = v.parse::<IntegerOverflow>()?;
        }
        if let Some(v) = self.value("maxWalkDepth") {
            config.max_walk_depth = parse_leading_integer(v)
                .and_then(|d| usize::try_from(d).ok())
                .ok_or_else(|| ConfigError::validation("maxWalkDepth", format!("'{}' is not a number", v)))?;
        }

        if let Some(document) = self.value("subscription") {
            if let Some(doc) = SubscriptionDocument::parse(document)? {
                config.subscriptions = doc.subscriptions;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Parses the leading decimal digits of `s`, ignoring leading whitespace.
fn parse_leading_integer(s: &str) -> Option<u64> {
    let digits: String = s.trim_start().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATEGORY: &str = r#"{
        "plugin": { "value": "opcua", "default": "opcua" },
        "asset": { "value": "line1/" },
        "url": { "value": "opc.tcp://plc:4840" },
        "subscription": { "value": "{ \"subscriptions\" : [ \"5:Simulation\", \"Random1\" ] }" },
        "subscribeById": { "value": "false" },
        "assetNameType": { "value": "Subscription Path with NodeId" },
        "pathDelimiter": { "value": "::" },
        "reportingInterval": { "default": "250ms" }
    }"#;

    #[test]
    fn test_parse_category() {
        let category = ConfigCategory::parse(CATEGORY).unwrap();
        assert_eq!(category.len(), 8);
        assert_eq!(category.value("reportingInterval"), Some("250ms"));
        assert!(!category.item_exists("missing"));
    }

    #[test]
    fn test_to_plugin_config() {
        let config = ConfigCategory::parse(CATEGORY).unwrap().to_plugin_config().unwrap();
        assert_eq!(config.asset, "line1/");
        assert_eq!(config.url, "opc.tcp://plc:4840");
        assert_eq!(config.subscriptions, vec!["5:Simulation".to_string(), "Random1".to_string()]);
        assert!(!config.subscribe_by_id);
        assert_eq!(config.asset_name_type, AssetNameType::SubscriptionPathWithNodeId);
        assert_eq!(config.delimiter().as_char(), ':');
        assert_eq!(config.reporting_interval, 250);
    }

    #[test]
    fn test_missing_url_is_fatal() {
        let category = ConfigCategory::from_items([("asset", "x")]);
        assert!(matches!(category.to_plugin_config(), Err(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_missing_subscriptions_array_is_fatal() {
        let category = ConfigCategory::from_items([
            ("url", "opc.tcp://plc:4840"),
            ("subscription", r#"{"items": []}"#),
        ]);
        assert!(matches!(
            category.to_plugin_config(),
            Err(ConfigError::InvalidSubscription { .. })
        ));
    }

    #[test]
    fn test_unparsable_document() {
        let category = ConfigCategory::from_items([("url", "opc.tcp://plc:4840"), ("subscription", "{oops")]);
        assert!(category.to_plugin_config().unwrap().subscriptions.is_empty());

        let mut config = PluginConfig::default();
        assert!(!category.apply(&mut config).unwrap());
        assert_eq!(config.subscriptions, PluginConfig::default().subscriptions);
    }

    #[test]
    fn test_apply_resets_defaults() {
        let mut config = PluginConfig {
            reporting_interval: 900,
            path_delimiter: ".".into(),
            asset_name_type: AssetNameType::BrowseName,
            ..Default::default()
        };
        let category = ConfigCategory::from_items([("asset", "renamed")]);

        assert!(!category.apply(&mut config).unwrap());
        assert_eq!(config.asset, "renamed");
        assert_eq!(config.reporting_interval, 100);
        assert_eq!(config.path_delimiter, "/");
        assert_eq!(config.asset_name_type, AssetNameType::NodeId);
    }

    #[test]
    fn test_unknown_asset_name_type() {
        let category = ConfigCategory::from_items([("url", "opc.tcp://plc"), ("assetNameType", "Bogus")]);
        assert!(matches!(category.to_plugin_config(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_invalid_document() {
        assert!(ConfigCategory::parse("[]").is_err());
        assert!(ConfigCategory::parse(r#"{"url": "x"}"#).is_err());
    }

    #[test]
    fn test_parse_leading_integer() {
        assert_eq!(parse_leading_integer(" 42abc"), Some(42));
        assert_eq!(parse_leading_integer("abc"), None);
    }
}
