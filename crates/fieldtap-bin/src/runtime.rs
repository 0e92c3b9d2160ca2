// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway runtime orchestration.
//!
//! ```text
//! PluginConfig ──▶ SouthPlugin<T> ──▶ ChannelSink ──▶ record writer ──▶ stdout
//!                       │
//!                       └── T = RealOpcUaTransport | MemoryTransport + Simulation
//! ```
//!
//! The runtime starts the plugin, waits for a shutdown signal, shuts the
//! plugin down and lets the writer drain what is queued.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use fieldtap_config::{PluginConfig, load_config};
use fieldtap_opcua::{ChannelSink, MemoryTransport, OpcUaTransport};

use crate::error::{BinError, BinResult};
use crate::output::write_records;
use crate::plugin::SouthPlugin;
use crate::shutdown::{ShutdownCoordinator, ShutdownGuard, ShutdownReason};
use crate::simulate::Simulation;

/// Time the record writer gets to drain after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// PluginRuntime
// =============================================================================

/// Runs one plugin instance until shutdown.
pub struct PluginRuntime {
    config: PluginConfig,
    shutdown: ShutdownCoordinator,
    simulate: Option<Duration>,
}

impl PluginRuntime {
    /// Creates a runtime for `config`.
    pub fn new(config: PluginConfig) -> Self {
        Self {
            config,
            shutdown: ShutdownCoordinator::new(),
            simulate: None,
        }
    }

    /// Serves the built-in simulation, ticking every `period`.
    pub fn with_simulation(mut self, period: Duration) -> Self {
        self.simulate = Some(period);
        self
    }

    /// Returns the shutdown coordinator.
    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Runs until a shutdown signal arrives.
    pub async fn run(self) -> BinResult<()> {
        info!("Starting fieldtap v{}", crate::VERSION);

        match self.simulate {
            Some(period) => {
                let transport = MemoryTransport::new(Simulation::address_space());
                let ticker = Simulation::new(transport.clone()).spawn(period, self.shutdown.listener());
                let result = self.run_with(transport).await;
                ticker.abort();
                result
            }
            None => self.run_with(real_transport()?).await,
        }
    }

    /// Runs the plugin over `transport`.
    pub async fn run_with<T: OpcUaTransport + 'static>(&self, transport: T) -> BinResult<()> {
        let (sink, records) = ChannelSink::new();

        let guard = ShutdownGuard::new(self.shutdown.clone(), ShutdownReason::WriterExited);
        let writer_shutdown = self.shutdown.listener();
        let writer = tokio::spawn(async move {
            let result = write_records(records, tokio::io::stdout(), writer_shutdown).await;
            if let Err(e) = &result {
                warn!(error = %e, "Record writer failed");
            } else {
                guard.disarm();
            }
            result
        });

        let plugin = SouthPlugin::init(self.config.clone(), transport, Arc::new(sink)).await?;
        let started = plugin.start().await;

        let result = match started {
            Ok(report) => {
                info!(
                    registered = report.registered(),
                    failed = report.failures.len(),
                    "fieldtap is running, press Ctrl+C to stop"
                );
                let reason = self.shutdown.wait_for_shutdown().await;
                info!(%reason, "Stopping fieldtap");
                Ok(())
            }
            Err(e) => {
                self.shutdown.trigger(ShutdownReason::StartFailed);
                Err(e.with_context("Failed to start plugin"))
            }
        };

        if let Err(e) = plugin.shutdown().await {
            warn!(error = %e, "Plugin shutdown failed");
        }
        drop(plugin);

        self.shutdown.initiate_shutdown();
        match tokio::time::timeout(DRAIN_TIMEOUT, writer).await {
            Ok(Ok(Ok(written))) => info!(written, "fieldtap shutdown complete"),
            Ok(Ok(Err(e))) => warn!(error = %e, "Record writer ended with an error"),
            Ok(Err(e)) => warn!(error = %e, "Record writer task failed"),
            Err(_) => warn!("Record writer did not drain in time"),
        }

        result
    }
}

#[cfg(feature = "real-transport")]
fn real_transport() -> BinResult<fieldtap_opcua::RealOpcUaTransport> {
    Ok(fieldtap_opcua::RealOpcUaTransport::new(
        fieldtap_opcua::RealTransportConfig::default(),
    ))
}

#[cfg(not(feature = "real-transport"))]
fn real_transport() -> BinResult<MemoryTransport> {
    Err(BinError::init(
        "built without the real-transport feature; rebuild with --features real-transport or run with --simulate",
    ))
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`PluginRuntime`].
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<PluginConfig>,
    simulate: Option<Duration>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_path: None,
            config: None,
            simulate: None,
        }
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: PluginConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Serves the built-in simulation.
    pub fn simulate(mut self, period: Duration) -> Self {
        self.simulate = Some(period);
        self
    }

    /// Builds the runtime.
    ///
    /// In simulation mode a missing configuration file falls back to the
    /// defaults, which subscribe to the simulation folder.
    pub fn build(self) -> BinResult<PluginRuntime> {
        let config = match self.config {
            Some(cfg) => cfg,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::Configuration("No configuration provided".into()))?;

                if self.simulate.is_some() && !path.exists() {
                    info!(path = %path.display(), "No configuration file, using simulation defaults");
                    PluginConfig::default()
                } else {
                    load_config(&path).map_err(|e| {
                        BinError::Configuration(format!("Failed to load config from {:?}: {}", path, e))
                    })?
                }
            }
        };

        let runtime = PluginRuntime::new(config);
        Ok(match self.simulate {
            Some(period) => runtime.with_simulation(period),
            None => runtime,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_builder() {
        let runtime = RuntimeBuilder::new()
            .config(PluginConfig::default())
            .simulate(Duration::from_millis(50))
            .build()
            .unwrap();
        assert_eq!(runtime.simulate, Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_runtime_builder_requires_config() {
        assert!(matches!(RuntimeBuilder::new().build(), Err(BinError::Configuration(_))));
    }

    #[test]
    fn test_missing_file_is_an_error_without_simulation() {
        let result = RuntimeBuilder::new().config_path("/nonexistent/fieldtap.yaml").build();
        assert!(matches!(result, Err(BinError::Configuration(_))));
    }

    #[test]
    fn test_simulation_defaults_without_file() {
        let runtime = RuntimeBuilder::new()
            .config_path("/nonexistent/fieldtap.yaml")
            .simulate(Duration::from_millis(50))
            .build()
            .unwrap();
        assert_eq!(runtime.config().subscriptions, vec!["ns=5;s=85/0:Simulation".to_string()]);
    }

    #[test]
    fn test_builder_loads_file() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        std::fs::write(
            file.path(),
            "url: \"opc.tcp://plc:4840\"\nsubscriptions:\n  - \"5:Simulation\"\nsubscribeById: false\n",
        )
        .unwrap();

        let runtime = RuntimeBuilder::new().config_path(file.path()).build().unwrap();
        assert_eq!(runtime.config().url, "opc.tcp://plc:4840");
        assert!(!runtime.config().subscribe_by_id);
    }

    #[tokio::test]
    async fn test_run_with_stops_on_shutdown() {
        let runtime = PluginRuntime::new(PluginConfig::default());
        let coordinator = runtime.shutdown_coordinator();

        let transport = MemoryTransport::new(Simulation::address_space());
        let probe = transport.clone();
        let task = tokio::spawn(async move { runtime.run_with(transport).await });

        for _ in 0..100 {
            if !probe.monitored_nodes().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(probe.monitored_nodes().len(), 5);

        coordinator.initiate_shutdown();
        let result = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert_eq!(probe.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_run_with_reports_start_failure() {
        let runtime = PluginRuntime::new(PluginConfig::default());
        let transport = MemoryTransport::new(Simulation::address_space());
        transport.fail_connect(true);

        let result = runtime.run_with(transport).await;
        assert!(matches!(result, Err(BinError::WithContext { .. })));
        assert_eq!(runtime.shutdown_coordinator().reason(), Some(ShutdownReason::StartFailed));
    }
}
