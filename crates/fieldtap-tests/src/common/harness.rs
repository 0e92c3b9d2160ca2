// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! A session controller wired to an in-memory server and a recording sink.

use std::sync::Arc;

use fieldtap_opcua::{
    AddressSpace, IngestSink, MemoryTransport, NodeId, SessionController, SessionSettings, Variant,
};

use super::sinks::RecordingSink;

/// Session under test.
///
/// The transport is a clone of the one the controller owns, so the harness
/// can publish values and inject failures while the session runs.
pub struct SessionHarness {
    /// Shared in-memory server.
    pub transport: MemoryTransport,
    /// Records delivered by the pipeline.
    pub sink: Arc<RecordingSink>,
    /// The controller under test.
    pub controller: SessionController<MemoryTransport>,
}

impl SessionHarness {
    /// Creates a stopped session over `space` with `filters` added.
    pub async fn new(space: AddressSpace, settings: SessionSettings, filters: &[&str]) -> Self {
        let transport = MemoryTransport::new(space);
        let sink = Arc::new(RecordingSink::new());
        let ingest: Arc<dyn IngestSink> = sink.clone();
        let controller = SessionController::new(transport.clone(), settings, ingest);
        for filter in filters {
            controller.add_subscription(*filter).await;
        }
        Self {
            transport,
            sink,
            controller,
        }
    }

    /// Publishes a value without a source timestamp.
    ///
    /// Returns the number of monitored items that received it.
    pub fn publish(&self, node: &NodeId, value: Variant) -> usize {
        self.transport.publish(node, value, None)
    }

    /// Publishes a value stamped with `source_ticks`.
    pub fn publish_at(&self, node: &NodeId, value: Variant, source_ticks: i64) -> usize {
        self.transport.publish(node, value, Some(source_ticks))
    }

    /// Returns `true` if `node` is currently monitored.
    pub fn is_monitored(&self, node: &NodeId) -> bool {
        self.transport.monitored_nodes().contains(node)
    }
}
