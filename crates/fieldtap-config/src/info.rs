// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Plugin information and the default configuration category.

use serde::Serialize;
use serde_json::{Value, json};

use fieldtap_opcua::AssetNameType;

use crate::schema::{
    DEFAULT_ASSET, DEFAULT_PATH_DELIMITER, DEFAULT_REPORTING_INTERVAL_MS, DEFAULT_SUBSCRIPTION,
    DEFAULT_URL, SubscriptionDocument,
};

/// Plugin name registered with the host.
pub const PLUGIN_NAME: &str = "opcua";

/// Host interface version.
pub const INTERFACE_VERSION: &str = "1.0.0";

/// Plugin kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    /// Data source.
    South,
}

/// Plugin flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginFlag {
    /// Readings are pushed, never polled.
    Async,
}

/// Information the host reads before initialising the plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    /// Plugin name.
    pub name: &'static str,
    /// Plugin version.
    pub version: &'static str,
    /// Flags.
    pub flags: Vec<PluginFlag>,
    /// Plugin kind.
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    /// Host interface version.
    pub interface_version: &'static str,
    /// Default configuration category.
    pub config: Value,
}

/// Returns the plugin information.
pub fn plugin_info() -> PluginInfo {
    PluginInfo {
        name: PLUGIN_NAME,
        version: env!("CARGO_PKG_VERSION"),
        flags: vec![PluginFlag::Async],
        plugin_type: PluginType::South,
        interface_version: INTERFACE_VERSION,
        config: default_category(),
    }
}

/// Returns the default configuration category.
pub fn default_category() -> Value {
    let subscription = SubscriptionDocument {
        subscriptions: vec![DEFAULT_SUBSCRIPTION.to_string()],
    };
    let options: Vec<&str> = AssetNameType::ALL.iter().map(AssetNameType::as_str).collect();

    json!({
        "plugin": {
            "description": "Simple OPC UA data change plugin",
            "type": "string",
            "default": PLUGIN_NAME,
            "readonly": "true"
        },
        "asset": {
            "description": "Asset name",
            "type": "string",
            "default": DEFAULT_ASSET,
            "displayName": "Asset Name",
            "order": "1",
            "mandatory": "true"
        },
        "url": {
            "description": "URL of the OPC UA Server",
            "type": "string",
            "default": DEFAULT_URL,
            "displayName": "OPCUA Server URL",
            "order": "2"
        },
        "subscription": {
            "description": "Variables to observe changes in",
            "type": "JSON",
            "default": subscription.to_json(),
            "displayName": "OPCUA Object Subscriptions",
            "order": "3"
        },
        "subscribeById": {
            "description": "Subscribe using node id",
            "type": "boolean",
            "default": "true",
            "displayName": "Subscribe By ID",
            "order": "4"
        },
        "assetNameType": {
            "description": "Name from the OPC UA Server's namespace to use as the Asset name",
            "type": "enumeration",
            "options": options,
            "default": AssetNameType::default().as_str(),
            "displayName": "Asset Name Source",
            "order": "5"
        },
        "pathDelimiter": {
            "description": "Single-character delimiter to use in Asset path names",
            "type": "string",
            "default": DEFAULT_PATH_DELIMITER,
            "displayName": "Asset Path Delimiter",
            "order": "6"
        },
        "reportingInterval": {
            "description": "The minimum reporting interval for data change notifications",
            "type": "integer",
            "default": DEFAULT_REPORTING_INTERVAL_MS.to_string(),
            "displayName": "Min Reporting Interval",
            "order": "7"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::ConfigCategory;

    #[test]
    fn test_plugin_info() {
        let info = plugin_info();
        assert_eq!(info.name, "opcua");
        assert_eq!(info.flags, vec![PluginFlag::Async]);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "south");
        assert_eq!(json["interface_version"], "1.0.0");
    }

    #[test]
    fn test_default_category_options() {
        let category = default_category();
        let options = category["assetNameType"]["options"].as_array().unwrap();
        assert_eq!(options.len(), 6);
        assert_eq!(options[2], "Subscription Path with NodeId");
    }

    #[test]
    fn test_default_category_round_trips_into_config() {
        let config = ConfigCategory::parse(&default_category().to_string())
            .unwrap()
            .to_plugin_config()
            .unwrap();
        assert_eq!(config.subscriptions, vec![DEFAULT_SUBSCRIPTION.to_string()]);
        assert!(config.subscribe_by_id);
        assert_eq!(config.asset, DEFAULT_ASSET);
    }
}
