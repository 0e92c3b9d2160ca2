// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldtap-config
//!
//! Configuration management for the fieldtap OPC UA south plugin.
//!
//! ## Features
//!
//! - **Schema Definition**: [`PluginConfig`] with validation
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `${VAR:default}` placeholders and `FIELDTAP_*`
//!   variables
//! - **Category Documents**: host-style `{"item": {"value": ...}}` documents
//! - **Plugin Information**: name, flags and the default configuration category
//!
//! ## Quick Start
//!
//! ```no_run
//! use fieldtap_config::load_config;
//!
//! let config = load_config("fieldtap.yaml").unwrap();
//! println!("Endpoint: {}", config.url);
//! println!("Filters: {:?}", config.subscriptions);
//! ```
//!
//! ## Example File
//!
//! ```yaml
//! asset: "opcua/"
//! url: "${OPCUA_URL:opc.tcp://localhost:4840}"
//! subscriptions:
//!   - "5:Simulation"
//! subscribeById: false
//! assetNameType: "Subscription Path with BrowseName"
//! pathDelimiter: "/"
//! reportingInterval: 100
//! logging:
//!   level: info
//!   format: text
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod category;
pub mod error;
pub mod info;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use category::ConfigCategory;
pub use error::{ConfigError, ConfigResult};
pub use info::{PluginFlag, PluginInfo, PluginType, default_category, plugin_info};
pub use loader::{ConfigFormat, ConfigLoader, load_config, load_config_str};
pub use schema::{LogFormat, LogLevel, LoggingConfig, PluginConfig, SubscriptionDocument};
