// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! The engine consumes the server as an opaque "directory + subscription"
//! capability. [`OpcUaTransport`] is that capability; [`MemoryTransport`]
//! and (behind the `real-transport` feature) `RealOpcUaTransport` implement it.
//!
//! [`MemoryTransport`]: super::MemoryTransport

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::decode::Variant;
use crate::error::OpcUaResult;
use crate::types::{NodeId, NodeRef, SubscriptionSettings};

// =============================================================================
// TransportState
// =============================================================================

/// Where the transport's server connection stands.
///
/// The session controller keeps its own [`SessionState`](crate::SessionState);
/// this one only describes the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    /// No session with the server.
    #[default]
    Disconnected,
    /// Endpoint discovery and session activation in progress.
    Connecting,
    /// Session active; browse and subscribe calls are allowed.
    Connected,
    /// The last connect attempt failed.
    Failed,
}

impl TransportState {
    /// Returns `true` while browse and subscribe calls are allowed.
    #[inline]
    pub fn is_connected(&self) -> bool {
        *self == Self::Connected
    }

    /// Returns `true` if the last connect attempt failed.
    #[inline]
    pub fn is_failed(&self) -> bool {
        *self == Self::Failed
    }

    /// Returns the snake_case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Data Change Delivery
// =============================================================================

/// One server-pushed value change for a monitored node.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChangeNotification {
    /// The monitored node.
    pub node_id: NodeId,

    /// The new value.
    pub value: Variant,

    /// Source timestamp in 100ns ticks since 1601, if the server sent one.
    pub source_timestamp: Option<i64>,

    /// Server timestamp in 100ns ticks since 1601, if the server sent one.
    pub server_timestamp: Option<i64>,
}

impl DataChangeNotification {
    /// Creates a notification without timestamps.
    pub fn new(node_id: NodeId, value: Variant) -> Self {
        Self {
            node_id,
            value,
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    /// Sets the source timestamp.
    pub fn with_source_timestamp(mut self, ticks: i64) -> Self {
        self.source_timestamp = Some(ticks);
        self
    }

    /// Sets the server timestamp.
    pub fn with_server_timestamp(mut self, ticks: i64) -> Self {
        self.server_timestamp = Some(ticks);
        self
    }
}

/// Receiver of change notifications.
///
/// Called from the transport's delivery thread, possibly concurrently for
/// different nodes. Implementations must not block.
pub trait DataChangeHandler: Send + Sync {
    /// Handles one notification.
    fn on_data_change(&self, notification: DataChangeNotification);
}

impl<F> DataChangeHandler for F
where
    F: Fn(DataChangeNotification) + Send + Sync,
{
    fn on_data_change(&self, notification: DataChangeNotification) {
        self(notification)
    }
}

// =============================================================================
// OpcUaTransport Trait
// =============================================================================

/// Abstract transport for OPC UA communication.
///
/// Directory methods return immediate children only; the caller drives any
/// recursion. Node handles carry their browse name and class so the caller
/// never needs a second round trip to classify them.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Connects to the server at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectionError`](crate::error::ConnectionError) if the
    /// connection cannot be established. Failures are not retried.
    async fn connect(&mut self, endpoint: &str) -> OpcUaResult<()>;

    /// Closes the connection and releases every subscription.
    async fn disconnect(&mut self) -> OpcUaResult<()>;

    /// Returns `true` if the transport is currently connected.
    fn is_connected(&self) -> bool;

    /// Returns the current transport state.
    fn state(&self) -> TransportState;

    // =========================================================================
    // Directory
    // =========================================================================

    /// Returns the handle of a node.
    ///
    /// # Errors
    ///
    /// [`BrowseError::NodeNotFound`](crate::error::BrowseError::NodeNotFound)
    /// if the node does not exist.
    async fn describe(&self, node_id: &NodeId) -> OpcUaResult<NodeRef>;

    /// Returns the hierarchical parent of a node, `None` at the root.
    async fn parent(&self, node_id: &NodeId) -> OpcUaResult<Option<NodeRef>>;

    /// Lists the immediate variable children of a node.
    async fn variables(&self, node_id: &NodeId) -> OpcUaResult<Vec<NodeRef>>;

    /// Lists the immediate non-variable children of a node.
    async fn children(&self, node_id: &NodeId) -> OpcUaResult<Vec<NodeRef>>;

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Creates the server-side subscription that monitored items attach to.
    ///
    /// Every notification for items of this subscription goes to `handler`.
    async fn create_subscription(
        &mut self,
        settings: &SubscriptionSettings,
        handler: Arc<dyn DataChangeHandler>,
    ) -> OpcUaResult<u32>;

    /// Adds a data-change monitored item for `node_id`.
    ///
    /// Returns the monitored item id.
    async fn subscribe_data_change(&self, subscription_id: u32, node_id: &NodeId) -> OpcUaResult<u32>;

    /// Deletes a subscription and its monitored items.
    async fn delete_subscription(&mut self, subscription_id: u32) -> OpcUaResult<()>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns the transport display name for logging.
    fn display_name(&self) -> String;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_transport_state() {
        assert!(TransportState::Connected.is_connected());
        assert!(!TransportState::Disconnected.is_connected());
        assert!(TransportState::Failed.is_failed());
        assert_eq!(TransportState::Connecting.to_string(), "Connecting");
    }

    #[test]
    fn test_closure_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn DataChangeHandler> = Arc::new(move |n: DataChangeNotification| {
            sink.lock().push(n.node_id);
        });

        handler.on_data_change(
            DataChangeNotification::new(NodeId::string(5, "Random1"), Variant::Double(1.0))
                .with_source_timestamp(42),
        );
        assert_eq!(seen.lock().as_slice(), &[NodeId::string(5, "Random1")]);
    }
}
