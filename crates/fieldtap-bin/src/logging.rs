// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.
//!
//! Readings go to standard output, so every log layer writes to standard
//! error.

use std::io::IsTerminal;

use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use fieldtap_config::{LogLevel, LoggingConfig, load_config};

use crate::cli::{Cli, LogFormat};

/// Directives for noisy dependencies.
const QUIET_TARGETS: &[&str] = &["opcua=warn", "tokio=info"];

// =============================================================================
// Logging Initialization
// =============================================================================

/// Initializes the global subscriber.
///
/// `RUST_LOG` wins over `level` when set. A second call is a no-op.
///
/// ```ignore
/// use fieldtap_bin::cli::LogFormat;
/// use fieldtap_bin::logging::init_logging;
///
/// init_logging("debug", LogFormat::Json);
/// ```
pub fn init_logging(level: &str, format: LogFormat) {
    let _ = tracing_subscriber::registry()
        .with(output_layer(format))
        .with(build_filter(level))
        .try_init();
}

/// Initializes logging from the command line, falling back to the
/// configuration file's `logging` section for settings not given there.
pub fn init_for_cli(cli: &Cli) {
    let file = if cli.has_log_settings() {
        None
    } else {
        load_config(&cli.config).ok().map(|config| config.logging)
    };
    let (level, format) = file_defaults(file.as_ref());
    init_logging(cli.effective_log_level(level), cli.effective_log_format(format));
}

fn file_defaults(file: Option<&LoggingConfig>) -> (&'static str, LogFormat) {
    match file {
        Some(logging) => (logging.level.as_str(), logging.format.into()),
        None => ("info", LogFormat::Text),
    }
}

fn build_filter(level: &str) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_directive(level)));
    QUIET_TARGETS
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(base, EnvFilter::add_directive)
}

/// Maps a level name onto a filter directive; unknown names mean `info`.
fn level_directive(level: &str) -> &'static str {
    level.parse::<LogLevel>().unwrap_or_default().as_str()
}

fn output_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let ansi = std::io::stderr().is_terminal();
    let base = fmt::layer().with_writer(std::io::stderr);

    match format {
        LogFormat::Text => base.with_target(true).with_ansi(ansi).boxed(),
        LogFormat::Compact => base.compact().with_target(false).with_ansi(ansi).boxed(),
        LogFormat::Json => base
            .json()
            .with_file(true)
            .with_line_number(true)
            .with_current_span(true)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("warning"), "warn");
        assert_eq!(level_directive("loud"), "info");
    }

    #[test]
    fn test_file_defaults() {
        assert_eq!(file_defaults(None), ("info", LogFormat::Text));

        let logging = LoggingConfig {
            level: LogLevel::Debug,
            format: fieldtap_config::LogFormat::Json,
        };
        assert_eq!(file_defaults(Some(&logging)), ("debug", LogFormat::Json));
    }

    #[test]
    fn test_quiet_targets_parse() {
        for directive in QUIET_TARGETS {
            assert!(directive.parse::<tracing_subscriber::filter::Directive>().is_ok());
        }
    }
}
