// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session controller.
//!
//! Owns the transport, the filter list and the per-session registry, and
//! drives a resolution pass on every start.
//!
//! # State Machine
//!
//! ```text
//!                 start()
//! Disconnected ──────────▶ Connecting ──▶ Resolving ──▶ Subscribed
//!      ▲                       │              │              │
//!      │      connect/create   │    fatal     │              │ stop()
//!      ├───────────────────────┘◀─────────────┘              ▼
//!      └──────────────────────────────────────────────── Stopping
//! ```
//!
//! `stop` when Disconnected is a no-op. `start` in any other state than
//! Disconnected is rejected with [`SessionError::AlreadyStarted`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex as SyncMutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::client::{DataChangeHandler, OpcUaTransport};
use crate::decode::DecoderOptions;
use crate::error::{ConfigurationError, OpcUaResult, SessionError};
use crate::naming::{AssetNameType, PathDelimiter, DEFAULT_MAX_DEPTH};
use crate::pipeline::{ChangeEventPipeline, IngestSink, PipelineStats};
use crate::resolve::{ResolutionEngine, ResolutionReport, ResolveOptions, SubscriptionRegistry};
use crate::types::SubscriptionSettings;

// =============================================================================
// SessionState
// =============================================================================

/// Lifecycle state of a [`SessionController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Connecting and creating the subscription.
    Connecting,
    /// Connected, resolution pass running.
    Resolving,
    /// Resolution done, notifications flowing.
    Subscribed,
    /// Tearing down.
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Resolving => write!(f, "Resolving"),
            Self::Subscribed => write!(f, "Subscribed"),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

// =============================================================================
// ZeroSubscriptionPolicy
// =============================================================================

/// What to do when a pass registers nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroSubscriptionPolicy {
    /// Log a warning and keep running idle.
    #[default]
    Warn,
    /// Stop and fail the start.
    Fail,
}

impl fmt::Display for ZeroSubscriptionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => write!(f, "warn"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

impl FromStr for ZeroSubscriptionPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "fail" => Ok(Self::Fail),
            _ => Err(ConfigurationError::invalid_value("zeroSubscriptionPolicy", s)),
        }
    }
}

// =============================================================================
// SessionSettings
// =============================================================================

/// Everything a start needs besides the filters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Server endpoint.
    pub url: String,
    /// Prefix of every emitted asset name.
    pub asset_name: String,
    /// Requested publishing interval.
    pub reporting_interval: Duration,
    /// Filters are identity references.
    pub subscribe_by_id: bool,
    /// Asset naming policy.
    pub asset_name_type: AssetNameType,
    /// Path delimiter.
    pub path_delimiter: PathDelimiter,
    /// Zero-registration policy.
    pub zero_subscription_policy: ZeroSubscriptionPolicy,
    /// Decoder options.
    pub decoder: DecoderOptions,
    /// Bound on walk depth.
    pub max_walk_depth: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            asset_name: String::new(),
            reporting_interval: Duration::from_millis(100),
            subscribe_by_id: false,
            asset_name_type: AssetNameType::default(),
            path_delimiter: PathDelimiter::default(),
            zero_subscription_policy: ZeroSubscriptionPolicy::default(),
            decoder: DecoderOptions::default(),
            max_walk_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SessionSettings {
    /// Creates settings for an endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the asset prefix.
    pub fn with_asset_name(mut self, asset_name: impl Into<String>) -> Self {
        self.asset_name = asset_name.into();
        self
    }

    /// Sets the reporting interval.
    pub fn with_reporting_interval(mut self, interval: Duration) -> Self {
        self.reporting_interval = interval;
        self
    }

    /// Selects identity-reference mode.
    pub fn with_subscribe_by_id(mut self, by_id: bool) -> Self {
        self.subscribe_by_id = by_id;
        self
    }

    /// Sets the naming policy.
    pub fn with_asset_name_type(mut self, policy: AssetNameType) -> Self {
        self.asset_name_type = policy;
        self
    }

    /// Sets the path delimiter.
    pub fn with_path_delimiter(mut self, delimiter: PathDelimiter) -> Self {
        self.path_delimiter = delimiter;
        self
    }

    /// Sets the zero-registration policy.
    pub fn with_zero_subscription_policy(mut self, policy: ZeroSubscriptionPolicy) -> Self {
        self.zero_subscription_policy = policy;
        self
    }

    /// Sets the decoder options.
    pub fn with_decoder(mut self, decoder: DecoderOptions) -> Self {
        self.decoder = decoder;
        self
    }

    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            subscribe_by_id: self.subscribe_by_id,
            asset_name_type: self.asset_name_type,
            path_delimiter: self.path_delimiter,
            max_depth: self.max_walk_depth,
        }
    }
}

// =============================================================================
// SessionController
// =============================================================================

/// Connects, resolves, subscribes, and tears down.
pub struct SessionController<T: OpcUaTransport> {
    transport: Mutex<T>,
    settings: RwLock<SessionSettings>,
    filters: Mutex<Vec<String>>,
    registry: SubscriptionRegistry,
    pipeline: Arc<ChangeEventPipeline>,
    state: RwLock<SessionState>,
    subscription_id: SyncMutex<Option<u32>>,
    last_report: RwLock<Option<ResolutionReport>>,
}

impl<T: OpcUaTransport> SessionController<T> {
    /// Creates a controller. Nothing connects until [`start`](Self::start).
    pub fn new(transport: T, settings: SessionSettings, sink: Arc<dyn IngestSink>) -> Self {
        let registry = SubscriptionRegistry::new();
        let pipeline = ChangeEventPipeline::new(registry.clone(), sink)
            .with_asset_prefix(settings.asset_name.clone())
            .with_decoder_options(settings.decoder);

        Self {
            transport: Mutex::new(transport),
            settings: RwLock::new(settings),
            filters: Mutex::new(Vec::new()),
            registry,
            pipeline: Arc::new(pipeline),
            state: RwLock::new(SessionState::Disconnected),
            subscription_id: SyncMutex::new(None),
            last_report: RwLock::new(None),
        }
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Sets the endpoint used by the next start.
    pub fn set_url(&self, url: impl Into<String>) {
        self.settings.write().url = url.into();
    }

    /// Sets the asset prefix. Applies to the next event.
    pub fn set_asset_name(&self, asset_name: impl Into<String>) {
        let asset_name = asset_name.into();
        self.pipeline.set_asset_prefix(asset_name.clone());
        self.settings.write().asset_name = asset_name;
    }

    /// Sets the reporting interval used by the next start.
    pub fn set_reporting_interval(&self, interval: Duration) {
        self.settings.write().reporting_interval = interval;
    }

    /// Selects identity-reference mode for the next start.
    pub fn set_subscribe_by_id(&self, by_id: bool) {
        self.settings.write().subscribe_by_id = by_id;
    }

    /// Sets the naming policy for the next start.
    pub fn set_asset_name_type(&self, policy: AssetNameType) {
        self.settings.write().asset_name_type = policy;
    }

    /// Sets the path delimiter for the next start from a configured string.
    pub fn set_path_delimiter(&self, delimiter: &str) {
        self.settings.write().path_delimiter = PathDelimiter::from_config(delimiter);
    }

    /// Returns a copy of the settings.
    pub fn settings(&self) -> SessionSettings {
        self.settings.read().clone()
    }

    // =========================================================================
    // Filters
    // =========================================================================

    /// Removes every filter.
    pub async fn clear_subscriptions(&self) {
        self.filters.lock().await.clear();
    }

    /// Adds a filter.
    pub async fn add_subscription(&self, filter: impl Into<String>) {
        self.filters.lock().await.push(filter.into());
    }

    /// Returns the current filters.
    pub async fn subscriptions(&self) -> Vec<String> {
        self.filters.lock().await.clone()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects, creates the subscription and runs a resolution pass.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyStarted`] unless Disconnected
    /// - connect or subscription creation failure
    /// - failure to fetch the Objects or Root container
    /// - [`SessionError::NoSubscriptions`] under [`ZeroSubscriptionPolicy::Fail`]
    pub async fn start(&self) -> OpcUaResult<ResolutionReport> {
        {
            let mut state = self.state.write();
            if *state != SessionState::Disconnected {
                return Err(SessionError::already_started(*state).into());
            }
            *state = SessionState::Connecting;
        }

        let settings = self.settings();
        self.registry.reset();
        self.pipeline.set_asset_prefix(settings.asset_name.clone());
        self.pipeline.set_decoder_options(settings.decoder);

        let mut transport = self.transport.lock().await;

        info!(url = %settings.url, "Connecting to OPC UA server");
        if let Err(e) = transport.connect(&settings.url).await {
            error!(url = %settings.url, error = %e, "Failed to connect to OPC UA server");
            self.set_state(SessionState::Disconnected);
            return Err(e);
        }

        let subscription = SubscriptionSettings::with_interval(settings.reporting_interval);
        debug!(subscription = %subscription, "Creating subscription");
        let handler: Arc<dyn DataChangeHandler> = self.pipeline.clone();
        let subscription_id = match transport.create_subscription(&subscription, handler).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to create subscription");
                self.teardown(&mut *transport).await;
                return Err(e);
            }
        };
        *self.subscription_id.lock() = Some(subscription_id);
        self.set_state(SessionState::Resolving);

        let mut filters = self.filters.lock().await;
        let mut engine = ResolutionEngine::new(
            &*transport,
            subscription_id,
            &self.registry,
            &filters,
            settings.resolve_options(),
        );
        let outcome = if settings.subscribe_by_id {
            Ok(engine.resolve_identities().await)
        } else {
            engine.resolve_tree().await
        };
        let report = engine.finish();
        // Emptying the list would widen the next pass to the whole server.
        if !report.accepted_filters.is_empty() || report.rejected_filters.is_empty() {
            *filters = report.accepted_filters.clone();
        } else {
            warn!(
                rejected = report.rejected_filters.len(),
                "Every subscription filter is malformed; keeping them so later passes stay restricted"
            );
        }
        drop(filters);

        if let Err(e) = outcome {
            error!(error = %e, "Failed to fetch the address space root");
            self.teardown(&mut *transport).await;
            return Err(e);
        }

        if report.registered() == 0 {
            match settings.zero_subscription_policy {
                ZeroSubscriptionPolicy::Warn => {
                    warn!("No eligible variables in OPC UA server to which to subscribe");
                }
                ZeroSubscriptionPolicy::Fail => {
                    self.teardown(&mut *transport).await;
                    return Err(SessionError::NoSubscriptions.into());
                }
            }
        }

        info!(
            registered = report.registered(),
            transport = %transport.display_name(),
            "Subscriptions active"
        );
        *self.last_report.write() = Some(report.clone());
        self.set_state(SessionState::Subscribed);
        Ok(report)
    }

    /// Deletes the subscription, disconnects and clears the registry.
    ///
    /// A no-op when Disconnected. A notification already in flight may still
    /// reach the sink after this returns.
    pub async fn stop(&self) -> OpcUaResult<()> {
        {
            let mut state = self.state.write();
            if *state == SessionState::Disconnected {
                debug!("Stop requested while disconnected");
                return Ok(());
            }
            *state = SessionState::Stopping;
        }

        let mut transport = self.transport.lock().await;
        self.teardown(&mut *transport).await;
        info!("OPC UA session stopped");
        Ok(())
    }

    /// Stops then starts.
    pub async fn restart(&self) -> OpcUaResult<ResolutionReport> {
        self.stop().await?;
        self.start().await
    }

    /// Stops, applies new settings (and filters, if given), then starts.
    pub async fn reconfigure(
        &self,
        settings: SessionSettings,
        filters: Option<Vec<String>>,
    ) -> OpcUaResult<ResolutionReport> {
        self.stop().await?;

        self.pipeline.set_asset_prefix(settings.asset_name.clone());
        *self.settings.write() = settings;
        if let Some(filters) = filters {
            *self.filters.lock().await = filters;
        }

        self.start().await
    }

    /// Stops the session for good.
    pub async fn shutdown(&self) -> OpcUaResult<()> {
        self.stop().await
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Returns the report of the last successful start.
    pub fn last_report(&self) -> Option<ResolutionReport> {
        self.last_report.read().clone()
    }

    /// Returns the pipeline counters.
    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    /// Returns the registry.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Returns the pipeline.
    pub fn pipeline(&self) -> Arc<ChangeEventPipeline> {
        self.pipeline.clone()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    async fn teardown(&self, transport: &mut T) {
        let subscription_id = self.subscription_id.lock().take();
        if let Some(id) = subscription_id {
            if let Err(e) = transport.delete_subscription(id).await {
                e.log("delete subscription");
            }
        }
        if let Err(e) = transport.disconnect().await {
            e.log("disconnect");
        }
        self.registry.reset();
        self.set_state(SessionState::Disconnected);
    }
}

impl<T: OpcUaTransport> fmt::Debug for SessionController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .field("settings", &*self.settings.read())
            .field("bound", &self.registry.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AddressSpace, MemoryTransport};
    use crate::decode::Variant;
    use crate::error::OpcUaError;
    use crate::pipeline::ChannelSink;
    use crate::types::{NodeId, QualifiedName};

    const URL: &str = "opc.tcp://localhost:4840";

    fn space() -> AddressSpace {
        let sim = NodeId::string(5, "85/0:Simulation");
        AddressSpace::new()
            .with_object(&NodeId::OBJECTS_FOLDER, sim.clone(), QualifiedName::new(5, "Simulation"))
            .with_variable(&sim, NodeId::string(5, "Random1"), QualifiedName::new(5, "Random1"))
    }

    fn controller(
        transport: MemoryTransport,
        settings: SessionSettings,
    ) -> (
        SessionController<MemoryTransport>,
        tokio::sync::mpsc::UnboundedReceiver<crate::pipeline::IngestRecord>,
    ) {
        let (sink, rx) = ChannelSink::new();
        (SessionController::new(transport, settings, Arc::new(sink)), rx)
    }

    #[tokio::test]
    async fn test_start_and_receive() {
        let transport = MemoryTransport::new(space());
        let (session, mut rx) = controller(transport.clone(), SessionSettings::new(URL).with_asset_name("opcua"));
        session.add_subscription("5:Simulation").await;

        let report = session.start().await.unwrap();
        assert_eq!(report.registered(), 1);
        assert_eq!(session.state(), SessionState::Subscribed);

        transport.publish(&NodeId::string(5, "Random1"), Variant::Double(1.5), None);
        let record = rx.recv().await.unwrap();
        assert_eq!(record.asset, "opcuans=5;s=Random1");
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let (session, _rx) = controller(MemoryTransport::new(space()), SessionSettings::new(URL));
        session.start().await.unwrap();
        let err = session.start().await.unwrap_err();
        assert!(matches!(err, OpcUaError::Session(SessionError::AlreadyStarted { .. })));
    }

    #[tokio::test]
    async fn test_stop_when_disconnected_is_noop() {
        let transport = MemoryTransport::new(space());
        let (session, _rx) = controller(transport.clone(), SessionSettings::new(URL));
        session.stop().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(transport.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_releases_everything() {
        let transport = MemoryTransport::new(space());
        let (session, _rx) = controller(transport.clone(), SessionSettings::new(URL));
        session.start().await.unwrap();
        assert!(!session.registry().is_empty());

        session.stop().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.registry().is_empty());
        assert_eq!(session.registry().key_count(), 0);
        assert!(!transport.is_connected());
        assert_eq!(transport.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal() {
        let transport = MemoryTransport::new(space());
        transport.fail_connect(true);
        let (session, _rx) = controller(transport, SessionSettings::new(URL));

        let err = session.start().await.unwrap_err();
        assert_eq!(err.category(), "connection");
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_subscription_failure_disconnects() {
        let transport = MemoryTransport::new(space());
        transport.fail_subscription_creation(true);
        let (session, _rx) = controller(transport.clone(), SessionSettings::new(URL));

        assert!(session.start().await.is_err());
        assert!(!transport.is_connected());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_zero_subscription_policies() {
        let (session, _rx) = controller(MemoryTransport::new(space()), SessionSettings::new(URL));
        session.add_subscription("Nothing").await;
        assert_eq!(session.start().await.unwrap().registered(), 0);
        assert_eq!(session.state(), SessionState::Subscribed);

        let transport = MemoryTransport::new(space());
        let settings = SessionSettings::new(URL).with_zero_subscription_policy(ZeroSubscriptionPolicy::Fail);
        let (strict, _rx) = controller(transport.clone(), settings);
        strict.add_subscription("Nothing").await;
        let err = strict.start().await.unwrap_err();
        assert!(matches!(err, OpcUaError::Session(SessionError::NoSubscriptions)));
        assert_eq!(strict.state(), SessionState::Disconnected);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_restart_rebuilds_registry() {
        let transport = MemoryTransport::new(space());
        let (session, _rx) = controller(transport.clone(), SessionSettings::new(URL));
        session.start().await.unwrap();
        let report = session.restart().await.unwrap();

        assert_eq!(report.registered(), 1);
        assert_eq!(transport.connect_count(), 2);
        assert_eq!(transport.monitored_nodes().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_filter_dropped_after_start() {
        let (session, _rx) = controller(MemoryTransport::new(space()), SessionSettings::new(URL));
        session.add_subscription("bad:Simulation").await;
        session.add_subscription("Random1").await;

        session.start().await.unwrap();
        assert_eq!(session.subscriptions().await, vec!["Random1".to_string()]);
    }

    #[tokio::test]
    async fn test_only_malformed_filters_never_widen_on_restart() {
        let transport = MemoryTransport::new(space());
        let (session, _rx) = controller(transport.clone(), SessionSettings::new(URL));
        session.add_subscription("x:Simulation").await;

        assert_eq!(session.start().await.unwrap().registered(), 0);
        assert_eq!(session.subscriptions().await, vec!["x:Simulation".to_string()]);

        assert_eq!(session.restart().await.unwrap().registered(), 0);
        assert!(transport.monitored_nodes().is_empty());
    }

    #[tokio::test]
    async fn test_reconfigure_switches_mode() {
        let transport = MemoryTransport::new(space());
        let (session, mut rx) = controller(transport.clone(), SessionSettings::new(URL));
        session.add_subscription("Nothing").await;
        assert_eq!(session.start().await.unwrap().registered(), 0);

        let settings = SessionSettings::new(URL)
            .with_subscribe_by_id(true)
            .with_asset_name("plant/")
            .with_asset_name_type(AssetNameType::BrowseName);
        let report = session
            .reconfigure(settings, Some(vec!["ns=5;s=Random1".to_string()]))
            .await
            .unwrap();
        assert_eq!(report.registered(), 1);

        transport.publish(&NodeId::string(5, "Random1"), Variant::Int32(3), None);
        assert_eq!(rx.recv().await.unwrap().asset, "plant/Random1");
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("FAIL".parse::<ZeroSubscriptionPolicy>().unwrap(), ZeroSubscriptionPolicy::Fail);
        assert!("maybe".parse::<ZeroSubscriptionPolicy>().is_err());
    }
}
