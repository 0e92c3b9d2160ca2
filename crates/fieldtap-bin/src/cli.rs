// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command line surface. `run` is implied when no subcommand is given.
//!
//! Log level and format fall back to the configuration file's `logging`
//! section when not given here; `-q` and `-v` override both.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// fieldtap - OPC UA data change gateway
///
/// Subscribes to variables on an OPC UA server and writes every data change
/// as a JSON line on standard output.
#[derive(Parser, Debug)]
#[command(
    name = "fieldtap",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "OPC UA data change gateway",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "fieldtap.yaml",
        env = "FIELDTAP_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error) [default: the file's, else info]
    #[arg(short, long, env = "FIELDTAP_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact) [default: the file's, else text]
    #[arg(long, env = "FIELDTAP_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the gateway
    ///
    /// This is the default command when no subcommand is specified.
    /// Connects to the configured server, resolves the subscriptions and
    /// streams readings until interrupted.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Parses and validates the configuration file without connecting.
    Validate(ValidateArgs),

    /// Print plugin information
    ///
    /// Shows the plugin name, flags and default configuration category as
    /// JSON.
    Info(InfoArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Serve a built-in simulation address space instead of a real server
    #[arg(long, env = "FIELDTAP_SIMULATE")]
    pub simulate: bool,

    /// Value change period of the simulation, in milliseconds
    #[arg(long, default_value = "1000", requires = "simulate")]
    pub tick_ms: u64,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `info` command.
#[derive(Args, Debug, Clone, Default)]
pub struct InfoArgs {
    /// Print the default category only
    #[arg(long)]
    pub category: bool,

    /// Single-line output
    #[arg(long)]
    pub compact: bool,
}

// =============================================================================
// Formats
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<fieldtap_config::LogFormat> for LogFormat {
    fn from(format: fieldtap_config::LogFormat) -> Self {
        match format {
            fieldtap_config::LogFormat::Text => Self::Text,
            fieldtap_config::LogFormat::Json => Self::Json,
            fieldtap_config::LogFormat::Compact => Self::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
    /// YAML format
    Yaml,
}


impl Cli {
    /// Parses the process arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to execute; `run` with default arguments when omitted.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Level directive: `-q` wins, then `-v`, then `--log-level`, then `fallback`.
    pub fn effective_log_level<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or(fallback)
        }
    }

    /// `--log-format`, else `fallback`.
    pub fn effective_log_format(&self, fallback: LogFormat) -> LogFormat {
        self.log_format.unwrap_or(fallback)
    }

    /// Returns true if both log settings were given on the command line.
    pub fn has_log_settings(&self) -> bool {
        (self.log_level.is_some() || self.quiet || self.verbose) && self.log_format.is_some()
    }
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            simulate: false,
            tick_ms: 1000,
        }
    }
}

impl Default for ValidateArgs {
    fn default() -> Self {
        Self {
            show_config: false,
            format: OutputFormat::Text,
            strict: false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
