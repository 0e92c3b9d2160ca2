// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use std::path::Path;

use serde::Serialize;

use fieldtap_config::{PluginConfig, load_config};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    if !config_path.exists() {
        return Err(BinError::Configuration(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = load_config(config_path)
        .map_err(|e| BinError::Configuration(format!("Configuration validation failed: {}", e)))?;
    let warnings = config.warnings();

    println!("{}", render(config_path, &config, &warnings, &args)?);

    if args.strict && !warnings.is_empty() {
        return Err(BinError::Configuration(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Machine-readable validation result.
#[derive(Serialize)]
struct Report<'a> {
    valid: bool,
    config_path: String,
    summary: Summary<'a>,
    warnings: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a PluginConfig>,
}

#[derive(Serialize)]
struct Summary<'a> {
    url: &'a str,
    asset: &'a str,
    subscriptions: &'a [String],
    subscribe_by_id: bool,
    asset_name_type: &'static str,
    reporting_interval_ms: u64,
}

impl<'a> Report<'a> {
    fn new(path: &Path, config: &'a PluginConfig, warnings: &'a [String], args: &ValidateArgs) -> Self {
        Self {
            valid: true,
            config_path: path.display().to_string(),
            summary: Summary {
                url: &config.url,
                asset: &config.asset,
                subscriptions: &config.subscriptions,
                subscribe_by_id: config.subscribe_by_id,
                asset_name_type: config.asset_name_type.as_str(),
                reporting_interval_ms: config.reporting_interval,
            },
            warnings,
            config: args.show_config.then_some(config),
        }
    }
}

fn render(path: &Path, config: &PluginConfig, warnings: &[String], args: &ValidateArgs) -> BinResult<String> {
    let mut out = String::new();

    match args.format {
        OutputFormat::Text => {
            out.push_str(&format!("✓ Configuration is valid: {}\n\n", path.display()));
            out.push_str("Summary:\n");
            out.push_str(&format!("  Endpoint:           {}\n", config.url));
            out.push_str(&format!("  Asset prefix:       {}\n", config.asset));
            out.push_str(&format!("  Subscriptions:      {}\n", config.subscriptions.len()));
            out.push_str(&format!(
                "  Subscribe by:       {}\n",
                if config.subscribe_by_id { "node id" } else { "browse name" }
            ));
            out.push_str(&format!("  Asset name source:  {}\n", config.asset_name_type.as_str()));
            out.push_str(&format!("  Path delimiter:     {}\n", config.delimiter().as_char()));
            out.push_str(&format!("  Reporting interval: {} ms\n", config.reporting_interval));

            if !warnings.is_empty() {
                out.push_str("\nWarnings:\n");
                for warning in warnings {
                    out.push_str(&format!("  ⚠ {}\n", warning));
                }
            }

            if args.show_config {
                out.push_str("\nParsed configuration:\n");
                out.push_str(&serde_json::to_string_pretty(config)?);
            }
        }
        OutputFormat::Json => out.push_str(&serde_json::to_string_pretty(&Report::new(path, config, warnings, args))?),
        OutputFormat::Yaml => out.push_str(&serde_yaml::to_string(&Report::new(path, config, warnings, args))?),
    }

    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PluginConfig {
        PluginConfig {
            url: "opc.tcp://plc:4840".into(),
            subscriptions: vec!["5:Simulation".into()],
            subscribe_by_id: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_render_text() {
        let text = render(Path::new("plant.yaml"), &config(), &[], &ValidateArgs::default()).unwrap();
        assert!(text.starts_with("✓ Configuration is valid: plant.yaml"));
        assert!(text.contains("Subscribe by:       browse name"));
        assert!(!text.contains("Warnings"));
    }

    #[test]
    fn test_render_json_with_config() {
        let args = ValidateArgs {
            show_config: true,
            format: OutputFormat::Json,
            strict: false,
        };
        let warnings = vec!["something odd".to_string()];
        let text = render(Path::new("plant.yaml"), &config(), &warnings, &args).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["valid"], true);
        assert_eq!(value["summary"]["subscriptions"][0], "5:Simulation");
        assert_eq!(value["warnings"][0], "something odd");
        assert_eq!(value["config"]["url"], "opc.tcp://plc:4840");
    }

    #[test]
    fn test_render_yaml() {
        let args = ValidateArgs {
            format: OutputFormat::Yaml,
            ..Default::default()
        };
        let text = render(Path::new("plant.yaml"), &config(), &[], &args).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(value["valid"], serde_yaml::Value::Bool(true));
        assert_eq!(value["summary"]["subscriptions"][0].as_str(), Some("5:Simulation"));
        assert!(value.get("config").is_none());
    }
}
