// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! South plugin facade.
//!
//! Maps the host's plugin entry points onto a [`SessionController`]:
//!
//! ```text
//! host            SouthPlugin                 SessionController
//! ────            ───────────                 ─────────────────
//! info       ──▶  plugin_info()
//! init       ──▶  validate config        ──▶  new + add_subscription*
//! start      ──▶                         ──▶  start
//! poll       ──▶  error (async plugin)
//! reconfigure──▶  stop, apply category   ──▶  reconfigure
//! shutdown   ──▶                         ──▶  shutdown
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, instrument, warn};

use fieldtap_config::{ConfigCategory, PluginConfig, PluginInfo, plugin_info};
use fieldtap_opcua::{
    IngestSink, OpcUaError, OpcUaTransport, PipelineStats, ResolutionReport, SessionController,
    SessionError, SessionState,
};

use crate::error::{BinError, BinResult};

/// An initialised south plugin instance.
pub struct SouthPlugin<T: OpcUaTransport> {
    config: RwLock<PluginConfig>,
    controller: SessionController<T>,
}

impl<T: OpcUaTransport> SouthPlugin<T> {
    /// Returns the plugin information.
    pub fn info() -> PluginInfo {
        plugin_info()
    }

    /// Creates a plugin instance from a configuration.
    ///
    /// # Errors
    ///
    /// [`BinError::Configuration`] when the endpoint URL is missing.
    pub async fn init(config: PluginConfig, transport: T, sink: Arc<dyn IngestSink>) -> BinResult<Self> {
        if config.url.trim().is_empty() {
            return Err(BinError::config("OPC UA plugin is missing a URL"));
        }

        let controller = SessionController::new(transport, config.session_settings(), sink);
        for filter in &config.subscriptions {
            controller.add_subscription(filter.clone()).await;
        }
        info!(
            url = %config.url,
            asset = %config.asset,
            subscriptions = config.subscriptions.len(),
            "Plugin initialised"
        );

        Ok(Self {
            config: RwLock::new(config),
            controller,
        })
    }

    /// Creates a plugin instance from a host configuration category.
    pub async fn init_from_category(category_json: &str, transport: T, sink: Arc<dyn IngestSink>) -> BinResult<Self> {
        let config = ConfigCategory::parse(category_json)?.to_plugin_config()?;
        Self::init(config, transport, sink).await
    }

    /// Connects and subscribes.
    pub async fn start(&self) -> BinResult<ResolutionReport> {
        let report = self.controller.start().await?;
        for failure in &report.failures {
            warn!(node = %failure.node_id, reason = %failure.reason, "Variable not monitored");
        }
        Ok(report)
    }

    /// Readings are pushed; the host must never poll.
    pub fn poll(&self) -> BinResult<()> {
        Err(OpcUaError::from(SessionError::PollUnsupported).into())
    }

    /// Applies a new configuration category and restarts.
    ///
    /// The session is stopped before the category is applied. When the
    /// category cannot be applied the session stays stopped.
    #[instrument(skip_all)]
    pub async fn reconfigure(&self, category_json: &str) -> BinResult<ResolutionReport> {
        info!("OPC UA plugin restart in progress");
        self.controller.stop().await?;

        let category = ConfigCategory::parse(category_json)?;
        let mut config = self.config.read().clone();
        let replaced = category.apply(&mut config)?;
        if replaced {
            info!(subscriptions = config.subscriptions.len(), "Subscriptions replaced");
        }

        let filters = replaced.then(|| config.subscriptions.clone());
        let settings = config.session_settings();
        *self.config.write() = config;

        let report = self.controller.reconfigure(settings, filters).await?;
        info!(registered = report.registered(), "OPC UA plugin restarted");
        Ok(report)
    }

    /// Stops the session for good.
    pub async fn shutdown(&self) -> BinResult<()> {
        self.controller.shutdown().await?;
        let stats = self.controller.stats();
        info!(
            received = stats.received,
            emitted = stats.emitted,
            dropped = stats.dropped,
            "Plugin shut down"
        );
        Ok(())
    }

    /// Returns a copy of the current configuration.
    pub fn config(&self) -> PluginConfig {
        self.config.read().clone()
    }

    /// Returns the session state.
    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    /// Returns the pipeline counters.
    pub fn stats(&self) -> PipelineStats {
        self.controller.stats()
    }

    /// Returns the session controller.
    pub fn controller(&self) -> &SessionController<T> {
        &self.controller
    }
}
