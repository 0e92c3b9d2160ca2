// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Change event pipeline.
//!
//! ```text
//! transport thread ──▶ on_data_change ──▶ VariantDecoder ──▶ registry lookup ──▶ IngestSink
//!                                              │                    │
//!                                          dropped++            unbound++
//! ```
//!
//! The pipeline is the [`DataChangeHandler`] of the session's subscription.
//! It only reads the registry, so notifications for different variables can
//! be handled concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::client::{DataChangeHandler, DataChangeNotification};
use crate::decode::{Decoded, DecoderOptions, NormalizedValue, VariantDecoder};
use crate::resolve::SubscriptionRegistry;
use crate::timestamp::{to_utc, UtcTimestamp};

// =============================================================================
// IngestRecord
// =============================================================================

/// One named value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Datapoint name.
    pub name: String,
    /// Value.
    pub value: NormalizedValue,
}

/// A record handed to the ingestion sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestRecord {
    /// Asset name.
    pub asset: String,
    /// Named values; one per change event.
    pub readings: Vec<Reading>,
    /// Source timestamp, or the local time at decode when the server sent none.
    pub timestamp: UtcTimestamp,
}

impl IngestRecord {
    /// Creates a record with a single reading.
    pub fn single(asset: impl Into<String>, name: impl Into<String>, value: NormalizedValue, timestamp: UtcTimestamp) -> Self {
        Self {
            asset: asset.into(),
            readings: vec![Reading {
                name: name.into(),
                value,
            }],
            timestamp,
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Downstream consumer of records. Fire-and-forget.
pub trait IngestSink: Send + Sync {
    /// Takes ownership of one record.
    fn ingest(&self, record: IngestRecord);
}

impl<F> IngestSink for F
where
    F: Fn(IngestRecord) + Send + Sync,
{
    fn ingest(&self, record: IngestRecord) {
        self(record)
    }
}

/// Sink forwarding records into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<IngestRecord>,
}

impl ChannelSink {
    /// Creates the sink and the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<IngestRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl IngestSink for ChannelSink {
    fn ingest(&self, record: IngestRecord) {
        if self.sender.send(record).is_err() {
            trace!("Ingest channel closed, record discarded");
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Notifications received.
    pub received: u64,
    /// Records emitted.
    pub emitted: u64,
    /// Notifications dropped by the decoder.
    pub dropped: u64,
    /// Records emitted for nodes with no registry entry.
    pub unbound: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
    unbound: AtomicU64,
}

// =============================================================================
// ChangeEventPipeline
// =============================================================================

#[derive(Debug, Clone)]
struct PipelineSettings {
    asset_prefix: String,
    decoder: VariantDecoder,
}

/// Decodes notifications and forwards them to the sink.
pub struct ChangeEventPipeline {
    registry: SubscriptionRegistry,
    settings: RwLock<PipelineSettings>,
    sink: Arc<dyn IngestSink>,
    counters: Counters,
}

impl ChangeEventPipeline {
    /// Creates a pipeline reading bindings from `registry`.
    pub fn new(registry: SubscriptionRegistry, sink: Arc<dyn IngestSink>) -> Self {
        Self {
            registry,
            settings: RwLock::new(PipelineSettings {
                asset_prefix: String::new(),
                decoder: VariantDecoder::default(),
            }),
            sink,
            counters: Counters::default(),
        }
    }

    /// Sets the asset prefix.
    pub fn with_asset_prefix(self, prefix: impl Into<String>) -> Self {
        self.set_asset_prefix(prefix);
        self
    }

    /// Sets the decoder options.
    pub fn with_decoder_options(self, options: DecoderOptions) -> Self {
        self.set_decoder_options(options);
        self
    }

    /// Replaces the asset prefix.
    pub fn set_asset_prefix(&self, prefix: impl Into<String>) {
        self.settings.write().asset_prefix = prefix.into();
    }

    /// Replaces the decoder options.
    pub fn set_decoder_options(&self, options: DecoderOptions) {
        self.settings.write().decoder = VariantDecoder::new(options);
    }

    /// Returns the asset prefix.
    pub fn asset_prefix(&self) -> String {
        self.settings.read().asset_prefix.clone()
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            received: self.counters.received.load(Ordering::Relaxed),
            emitted: self.counters.emitted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            unbound: self.counters.unbound.load(Ordering::Relaxed),
        }
    }

    /// Converts a notification into a record, or `None` if it is dropped.
    ///
    /// The outcome is counted in [`stats`](Self::stats) whether or not the
    /// record reaches the sink.
    pub fn process(&self, notification: &DataChangeNotification) -> Option<IngestRecord> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let (prefix, decoded) = {
            let settings = self.settings.read();
            (settings.asset_prefix.clone(), settings.decoder.decode(&notification.value))
        };

        let value = match decoded {
            Decoded::Value(v) => v,
            Decoded::Dropped(reason) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(node_id = %notification.node_id, reason = %reason, "Value dropped");
                return None;
            }
        };

        let (asset_path, datapoint) = match self.registry.lookup(&notification.node_id) {
            Some(binding) => (binding.asset_path, binding.datapoint),
            None => {
                self.counters.unbound.fetch_add(1, Ordering::Relaxed);
                debug!(node_id = %notification.node_id, "Notification for unbound node");
                let canonical = notification.node_id.canonical();
                (canonical.clone(), canonical)
            }
        };

        let timestamp = match notification.source_timestamp {
            Some(ticks) => to_utc(ticks),
            None => UtcTimestamp::now(),
        };

        self.counters.emitted.fetch_add(1, Ordering::Relaxed);
        Some(IngestRecord::single(
            format!("{}{}", prefix, asset_path),
            datapoint,
            value,
            timestamp,
        ))
    }
}

impl DataChangeHandler for ChangeEventPipeline {
    fn on_data_change(&self, notification: DataChangeNotification) {
        if let Some(record) = self.process(&notification) {
            self.sink.ingest(record);
        }
    }
}

impl std::fmt::Debug for ChangeEventPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeEventPipeline")
            .field("asset_prefix", &self.asset_prefix())
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
