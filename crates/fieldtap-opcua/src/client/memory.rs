// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory transport.
//!
//! [`MemoryTransport`] serves an [`AddressSpace`] built in code and delivers
//! notifications pushed with [`MemoryTransport::publish`]. It backs the
//! simulation mode of the binary and every test that needs a server.
//!
//! Clones share state, so a test can hand one clone to the session
//! controller and keep another to publish values and inspect counters.
//!
//! # Examples
//!
//! ```
//! use fieldtap_opcua::client::{AddressSpace, MemoryTransport};
//! use fieldtap_opcua::types::{NodeId, QualifiedName};
//!
//! let simulation = NodeId::string(5, "85/0:Simulation");
//! let space = AddressSpace::new()
//!     .with_object(&NodeId::OBJECTS_FOLDER, simulation.clone(), QualifiedName::new(5, "Simulation"))
//!     .with_variable(&simulation, NodeId::string(5, "Random1"), QualifiedName::new(5, "Random1"));
//!
//! let transport = MemoryTransport::new(space);
//! assert_eq!(transport.monitored_nodes().len(), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::transport::{DataChangeHandler, DataChangeNotification, OpcUaTransport, TransportState};
use crate::decode::Variant;
use crate::error::{BrowseError, ConnectionError, OpcUaError, OpcUaResult, SubscriptionError};
use crate::types::{NodeClass, NodeId, NodeRef, QualifiedName, SubscriptionSettings};

// =============================================================================
// AddressSpace
// =============================================================================

#[derive(Debug, Clone)]
struct NodeEntry {
    node: NodeRef,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A hierarchical address space.
///
/// [`AddressSpace::new`] starts with the standard Root (`ns=0;i=84`) and
/// Objects (`ns=0;i=85`) folders. Children keep insertion order.
#[derive(Debug, Clone)]
pub struct AddressSpace {
    nodes: HashMap<NodeId, NodeEntry>,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace {
    /// Creates an address space holding the Root and Objects folders.
    pub fn new() -> Self {
        let mut space = Self {
            nodes: HashMap::new(),
        };
        space.nodes.insert(
            NodeId::ROOT_FOLDER,
            NodeEntry {
                node: NodeRef::new(NodeId::ROOT_FOLDER, QualifiedName::new(0, "Root"), NodeClass::Object),
                parent: None,
                children: Vec::new(),
            },
        );
        space.insert(
            &NodeId::ROOT_FOLDER,
            NodeRef::new(NodeId::OBJECTS_FOLDER, QualifiedName::new(0, "Objects"), NodeClass::Object),
        );
        space
    }

    /// Inserts a node under `parent`.
    ///
    /// Re-inserting an existing node adds another parent reference to it; the
    /// first parent stays its hierarchical parent.
    pub fn insert(&mut self, parent: &NodeId, node: NodeRef) -> &mut Self {
        let node_id = node.node_id.clone();
        self.nodes.entry(node_id.clone()).or_insert_with(|| NodeEntry {
            node,
            parent: Some(parent.clone()),
            children: Vec::new(),
        });
        if let Some(entry) = self.nodes.get_mut(parent) {
            if !entry.children.contains(&node_id) {
                entry.children.push(node_id);
            }
        }
        self
    }

    /// Adds an object under `parent`.
    pub fn with_object(mut self, parent: &NodeId, node_id: NodeId, browse_name: QualifiedName) -> Self {
        self.insert(parent, NodeRef::new(node_id, browse_name, NodeClass::Object));
        self
    }

    /// Adds a variable under `parent`.
    pub fn with_variable(mut self, parent: &NodeId, node_id: NodeId, browse_name: QualifiedName) -> Self {
        self.insert(parent, NodeRef::new(node_id, browse_name, NodeClass::Variable));
        self
    }

    /// Returns the handle of a node.
    pub fn get(&self, node_id: &NodeId) -> Option<&NodeRef> {
        self.nodes.get(node_id).map(|e| &e.node)
    }

    /// Returns `true` if the node exists.
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Returns the number of nodes, including Root and Objects.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the space holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn parent_of(&self, node_id: &NodeId) -> Option<&NodeRef> {
        let parent = self.nodes.get(node_id)?.parent.as_ref()?;
        self.get(parent)
    }

    fn children_of(&self, node_id: &NodeId, variables: bool) -> Option<Vec<NodeRef>> {
        let entry = self.nodes.get(node_id)?;
        Some(
            entry
                .children
                .iter()
                .filter_map(|id| self.get(id))
                .filter(|n| n.is_variable() == variables)
                .cloned()
                .collect(),
        )
    }
}

// =============================================================================
// Failure Injection
// =============================================================================

#[derive(Debug, Default)]
struct Failures {
    connect: bool,
    create_subscription: bool,
    monitored_items: HashSet<NodeId>,
    parent_lookups: HashSet<NodeId>,
    browse: HashSet<NodeId>,
}

// =============================================================================
// MemoryTransport
// =============================================================================

struct MonitoredEntry {
    subscription_id: u32,
    node_id: NodeId,
}

struct State {
    transport_state: TransportState,
    endpoint: Option<String>,
    next_subscription_id: u32,
    next_item_id: u32,
    subscriptions: HashMap<u32, Arc<dyn DataChangeHandler>>,
    monitored: Vec<MonitoredEntry>,
    connect_count: u64,
    parent_lookups: u64,
}

struct Inner {
    space: RwLock<AddressSpace>,
    state: Mutex<State>,
    failures: Mutex<Failures>,
}

/// Transport serving an in-memory [`AddressSpace`].
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl MemoryTransport {
    /// Creates a transport over `space`.
    pub fn new(space: AddressSpace) -> Self {
        Self {
            inner: Arc::new(Inner {
                space: RwLock::new(space),
                state: Mutex::new(State {
                    transport_state: TransportState::Disconnected,
                    endpoint: None,
                    next_subscription_id: 1,
                    next_item_id: 1,
                    subscriptions: HashMap::new(),
                    monitored: Vec::new(),
                    connect_count: 0,
                    parent_lookups: 0,
                }),
                failures: Mutex::new(Failures::default()),
            }),
        }
    }

    // =========================================================================
    // Address Space Access
    // =========================================================================

    /// Mutates the address space in place.
    pub fn update_space<R>(&self, f: impl FnOnce(&mut AddressSpace) -> R) -> R {
        f(&mut self.inner.space.write())
    }

    // =========================================================================
    // Failure Injection
    // =========================================================================

    /// Makes subsequent connects fail.
    pub fn fail_connect(&self, fail: bool) {
        self.inner.failures.lock().connect = fail;
    }

    /// Makes subsequent subscription creation fail.
    pub fn fail_subscription_creation(&self, fail: bool) {
        self.inner.failures.lock().create_subscription = fail;
    }

    /// Makes monitored item creation for `node_id` fail.
    pub fn fail_monitored_item(&self, node_id: NodeId) {
        self.inner.failures.lock().monitored_items.insert(node_id);
    }

    /// Makes the parent lookup of `node_id` fail.
    pub fn fail_parent_lookup(&self, node_id: NodeId) {
        self.inner.failures.lock().parent_lookups.insert(node_id);
    }

    /// Makes listing the children and variables of `node_id` fail.
    pub fn fail_browse(&self, node_id: NodeId) {
        self.inner.failures.lock().browse.insert(node_id);
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Pushes a value change for `node_id`.
    ///
    /// The notification goes to the handler of every subscription monitoring
    /// the node. Returns the number of deliveries.
    pub fn publish(&self, node_id: &NodeId, value: Variant, source_ticks: Option<i64>) -> usize {
        let handlers: Vec<Arc<dyn DataChangeHandler>> = {
            let state = self.inner.state.lock();
            if !state.transport_state.is_connected() {
                return 0;
            }
            state
                .monitored
                .iter()
                .filter(|m| m.node_id == *node_id)
                .filter_map(|m| state.subscriptions.get(&m.subscription_id).cloned())
                .collect()
        };

        for handler in &handlers {
            let mut notification = DataChangeNotification::new(node_id.clone(), value.clone());
            notification.source_timestamp = source_ticks;
            handler.on_data_change(notification);
        }
        trace!(node_id = %node_id, deliveries = handlers.len(), "Published value");
        handlers.len()
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Returns every monitored node, one entry per monitored item.
    pub fn monitored_nodes(&self) -> Vec<NodeId> {
        self.inner
            .state
            .lock()
            .monitored
            .iter()
            .map(|m| m.node_id.clone())
            .collect()
    }

    /// Returns the number of successful connects.
    pub fn connect_count(&self) -> u64 {
        self.inner.state.lock().connect_count
    }

    /// Returns the number of parent lookups served.
    pub fn parent_lookups(&self) -> u64 {
        self.inner.state.lock().parent_lookups
    }

    /// Returns the number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.state.lock().subscriptions.len()
    }

    /// Returns the endpoint of the current connection.
    pub fn endpoint(&self) -> Option<String> {
        self.inner.state.lock().endpoint.clone()
    }

    fn ensure_connected(&self) -> OpcUaResult<()> {
        if self.inner.state.lock().transport_state.is_connected() {
            Ok(())
        } else {
            Err(OpcUaError::not_connected())
        }
    }

    fn ensure_browsable(&self, node_id: &NodeId) -> OpcUaResult<()> {
        self.ensure_connected()?;
        if self.inner.failures.lock().browse.contains(node_id) {
            return Err(BrowseError::browse_failed(node_id.to_string(), "injected browse failure").into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MemoryTransport")
            .field("state", &state.transport_state)
            .field("endpoint", &state.endpoint)
            .field("subscriptions", &state.subscriptions.len())
            .field("monitored", &state.monitored.len())
            .finish()
    }
}

#[async_trait]
impl OpcUaTransport for MemoryTransport {
    async fn connect(&mut self, endpoint: &str) -> OpcUaResult<()> {
        if !endpoint.starts_with("opc.tcp://") {
            return Err(ConnectionError::invalid_endpoint(endpoint, "endpoint must start with opc.tcp://").into());
        }

        let fail = self.inner.failures.lock().connect;
        let mut state = self.inner.state.lock();
        if fail {
            state.transport_state = TransportState::Failed;
            return Err(ConnectionError::refused(endpoint, "injected connect failure").into());
        }

        state.transport_state = TransportState::Connected;
        state.endpoint = Some(endpoint.to_string());
        state.connect_count += 1;
        debug!(endpoint = %endpoint, "Memory transport connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        let mut state = self.inner.state.lock();
        state.subscriptions.clear();
        state.monitored.clear();
        state.transport_state = TransportState::Disconnected;
        state.endpoint = None;
        debug!("Memory transport disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.state.lock().transport_state.is_connected()
    }

    fn state(&self) -> TransportState {
        self.inner.state.lock().transport_state
    }

    async fn describe(&self, node_id: &NodeId) -> OpcUaResult<NodeRef> {
        self.ensure_connected()?;
        self.inner
            .space
            .read()
            .get(node_id)
            .cloned()
            .ok_or_else(|| OpcUaError::node_not_found(node_id.to_string()))
    }

    async fn parent(&self, node_id: &NodeId) -> OpcUaResult<Option<NodeRef>> {
        self.ensure_connected()?;
        self.inner.state.lock().parent_lookups += 1;
        if self.inner.failures.lock().parent_lookups.contains(node_id) {
            return Err(BrowseError::attribute_read_failed(
                node_id.to_string(),
                "BrowseName",
                "injected parent lookup failure",
            )
            .into());
        }

        let space = self.inner.space.read();
        if !space.contains(node_id) {
            return Err(OpcUaError::node_not_found(node_id.to_string()));
        }
        Ok(space.parent_of(node_id).cloned())
    }

    async fn variables(&self, node_id: &NodeId) -> OpcUaResult<Vec<NodeRef>> {
        self.ensure_browsable(node_id)?;
        self.inner
            .space
            .read()
            .children_of(node_id, true)
            .ok_or_else(|| OpcUaError::node_not_found(node_id.to_string()))
    }

    async fn children(&self, node_id: &NodeId) -> OpcUaResult<Vec<NodeRef>> {
        self.ensure_browsable(node_id)?;
        self.inner
            .space
            .read()
            .children_of(node_id, false)
            .ok_or_else(|| OpcUaError::node_not_found(node_id.to_string()))
    }

    async fn create_subscription(
        &mut self,
        settings: &SubscriptionSettings,
        handler: Arc<dyn DataChangeHandler>,
    ) -> OpcUaResult<u32> {
        self.ensure_connected()?;
        if self.inner.failures.lock().create_subscription {
            return Err(SubscriptionError::creation_failed("injected subscription failure").into());
        }

        let mut state = self.inner.state.lock();
        let id = state.next_subscription_id;
        state.next_subscription_id += 1;
        state.subscriptions.insert(id, handler);
        debug!(
            subscription_id = id,
            interval = ?settings.publishing_interval,
            "Memory subscription created"
        );
        Ok(id)
    }

    async fn subscribe_data_change(&self, subscription_id: u32, node_id: &NodeId) -> OpcUaResult<u32> {
        self.ensure_connected()?;
        if self.inner.failures.lock().monitored_items.contains(node_id) {
            return Err(SubscriptionError::monitored_item_failed(
                node_id.to_string(),
                "injected monitored item failure",
            )
            .into());
        }
        if !self.inner.space.read().contains(node_id) {
            return Err(SubscriptionError::monitored_item_failed(node_id.to_string(), "BadNodeIdUnknown").into());
        }

        let mut state = self.inner.state.lock();
        if !state.subscriptions.contains_key(&subscription_id) {
            return Err(SubscriptionError::not_found(subscription_id).into());
        }
        let item_id = state.next_item_id;
        state.next_item_id += 1;
        state.monitored.push(MonitoredEntry {
            subscription_id,
            node_id: node_id.clone(),
        });
        Ok(item_id)
    }

    async fn delete_subscription(&mut self, subscription_id: u32) -> OpcUaResult<()> {
        let mut state = self.inner.state.lock();
        if state.subscriptions.remove(&subscription_id).is_none() {
            return Err(SubscriptionError::not_found(subscription_id).into());
        }
        state.monitored.retain(|m| m.subscription_id != subscription_id);
        Ok(())
    }

    fn display_name(&self) -> String {
        match &self.inner.state.lock().endpoint {
            Some(endpoint) => format!("memory({})", endpoint),
            None => "memory".to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
