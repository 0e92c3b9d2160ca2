// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription resolution.
//!
//! Walks the server's address space, decides which variables to monitor,
//! registers each with the transport exactly once, and records an asset path
//! for it in the [`SubscriptionRegistry`].
//!
//! # Walk
//!
//! ```text
//!            Objects (active = no filters configured)
//!               │
//!      ┌────────┴────────┐
//!   5:Simulation      2:Plant          child_active = active
//!   (filter hit)         │                 || a filter names the child
//!      │              Line1
//!   Random1 ◀── registered: ancestor active
//!                  Speed ◀── registered only if a filter names it
//! ```
//!
//! The walk uses an explicit stack over an immutable snapshot of the filters
//! taken when the pass starts. Malformed `<ns>:<name>` filters are rejected at
//! snapshot time and left out of [`ResolutionReport::accepted_filters`], the
//! list the caller keeps for the next pass.
//!
//! A variable is registered if it sits under an active object or a filter
//! names it, and its [`SubscriptionKey`] has not been seen in this pass.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::client::OpcUaTransport;
use crate::error::{ConfigurationError, OpcUaResult};
use crate::naming::{AssetNameType, AssetNamer, PathDelimiter, DEFAULT_MAX_DEPTH};
use crate::types::{NodeId, NodeRef, QualifiedName};

// =============================================================================
// SubscriptionFilter
// =============================================================================

/// A name filter from the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionFilter {
    /// Matches the browse name in any namespace.
    Bare(String),
    /// Matches namespace index and browse name.
    Qualified {
        /// Namespace index.
        namespace: u64,
        /// Browse name.
        name: String,
    },
}

impl SubscriptionFilter {
    /// Parses a filter.
    ///
    /// Everything before the first `:` is the namespace. Like `stoul`, the
    /// prefix may start with whitespace and an optional `+`, must then have at
    /// least one digit, and ignores anything after the digits.
    ///
    /// # Errors
    ///
    /// The namespace prefix has no digits or does not fit in 64 bits.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let Some((prefix, name)) = raw.split_once(':') else {
            return Ok(Self::Bare(raw.to_string()));
        };

        let digits_start = prefix.trim_start();
        let digits_start = digits_start.strip_prefix('+').unwrap_or(digits_start);
        let digits: &str = {
            let end = digits_start
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits_start.len());
            &digits_start[..end]
        };
        if digits.is_empty() {
            return Err(ConfigurationError::invalid_filter(raw, "namespace prefix is not a number"));
        }
        let namespace = digits
            .parse::<u64>()
            .map_err(|_| ConfigurationError::invalid_filter(raw, "namespace prefix out of range"))?;

        Ok(Self::Qualified {
            namespace,
            name: name.to_string(),
        })
    }

    /// Returns `true` if the filter names `browse_name`.
    pub fn matches(&self, browse_name: &QualifiedName) -> bool {
        match self {
            Self::Bare(name) => *name == browse_name.name,
            Self::Qualified { namespace, name } => {
                *namespace == u64::from(browse_name.namespace_index) && *name == browse_name.name
            }
        }
    }
}

impl fmt::Display for SubscriptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare(name) => f.write_str(name),
            Self::Qualified { namespace, name } => write!(f, "{}:{}", namespace, name),
        }
    }
}

// =============================================================================
// SubscriptionKey
// =============================================================================

/// De-duplication key `<ns>:<parent browse name>:<variable browse name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    /// Placeholder parent segment when the parent name is unavailable.
    pub const UNKNOWN_PARENT: &'static str = "_";

    /// Builds a key from the variable's namespace and the two browse names.
    pub fn new(namespace_index: u16, parent: &str, variable: &str) -> Self {
        Self(format!("{}:{}:{}", namespace_index, parent, variable))
    }

    /// Builds a key with the placeholder parent.
    pub fn without_parent(namespace_index: u16, variable: &str) -> Self {
        Self::new(namespace_index, Self::UNKNOWN_PARENT, variable)
    }

    /// Returns the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// SubscriptionRegistry
// =============================================================================

/// What the change pipeline needs to know about a registered node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetBinding {
    /// Asset path, without the configured asset prefix.
    pub asset_path: String,
    /// Datapoint name (sanitized browse name).
    pub datapoint: String,
}

#[derive(Debug, Default)]
struct RegistryState {
    keys: HashSet<SubscriptionKey>,
    bindings: HashMap<NodeId, AssetBinding>,
}

/// The per-session de-duplication set and asset path table.
///
/// Both live behind one lock and are only ever cleared together.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<RwLock<RegistryState>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears keys and bindings.
    pub fn reset(&self) {
        let mut state = self.inner.write();
        state.keys.clear();
        state.bindings.clear();
    }

    /// Marks a key as seen. Returns `true` if it was unseen.
    pub fn mark(&self, key: &SubscriptionKey) -> bool {
        self.inner.write().keys.insert(key.clone())
    }

    /// Returns `true` if the key has been seen.
    pub fn is_marked(&self, key: &SubscriptionKey) -> bool {
        self.inner.read().keys.contains(key)
    }

    /// Records the binding of a node.
    pub fn bind(&self, node_id: NodeId, binding: AssetBinding) {
        self.inner.write().bindings.insert(node_id, binding);
    }

    /// Removes the binding of a node.
    pub fn unbind(&self, node_id: &NodeId) {
        self.inner.write().bindings.remove(node_id);
    }

    /// Looks up the binding of a node.
    pub fn lookup(&self, node_id: &NodeId) -> Option<AssetBinding> {
        self.inner.read().bindings.get(node_id).cloned()
    }

    /// Returns the number of bound nodes.
    pub fn len(&self) -> usize {
        self.inner.read().bindings.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.inner.read().bindings.is_empty()
    }

    /// Returns the number of seen keys.
    pub fn key_count(&self) -> usize {
        self.inner.read().keys.len()
    }

    /// Returns every binding, ordered by asset path.
    pub fn bindings(&self) -> Vec<(NodeId, AssetBinding)> {
        let mut out: Vec<_> = self
            .inner
            .read()
            .bindings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort_by(|a, b| a.1.asset_path.cmp(&b.1.asset_path).then_with(|| a.0.cmp(&b.0)));
        out
    }
}

// =============================================================================
// Report
// =============================================================================

/// A variable registered during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    /// The node.
    pub node_id: String,
    /// Its de-duplication key.
    pub key: String,
    /// Its asset path.
    pub asset_path: String,
}

/// A variable the transport refused to monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationFailure {
    /// The node.
    pub node_id: String,
    /// Why it failed.
    pub reason: String,
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    /// Variables registered with the transport.
    pub registrations: Vec<Registration>,
    /// Variables whose registration failed.
    pub failures: Vec<RegistrationFailure>,
    /// Filters the pass accepted, to be kept for the next pass.
    pub accepted_filters: Vec<String>,
    /// Filters rejected as malformed.
    pub rejected_filters: Vec<String>,
    /// Nodes visited.
    pub visited: usize,
}

impl ResolutionReport {
    /// Returns the number of registered variables.
    pub fn registered(&self) -> usize {
        self.registrations.len()
    }
}

// =============================================================================
// ResolveOptions
// =============================================================================

/// Knobs of one resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Filters are identity references rather than names.
    pub subscribe_by_id: bool,
    /// Asset naming policy.
    pub asset_name_type: AssetNameType,
    /// Path delimiter.
    pub path_delimiter: PathDelimiter,
    /// Bound on walk depth and on the upward full-path walk.
    pub max_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            subscribe_by_id: false,
            asset_name_type: AssetNameType::default(),
            path_delimiter: PathDelimiter::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

// =============================================================================
// ResolutionEngine
// =============================================================================

struct Frame {
    node: NodeRef,
    path: String,
    active: bool,
    depth: usize,
}

/// Runs one resolution pass against a transport.
pub struct ResolutionEngine<'a, T: OpcUaTransport + ?Sized> {
    transport: &'a T,
    subscription_id: u32,
    registry: &'a SubscriptionRegistry,
    options: ResolveOptions,
    raw_filters: Vec<String>,
    filters: Vec<SubscriptionFilter>,
    namer: AssetNamer,
    visited: HashMap<NodeId, bool>,
    report: ResolutionReport,
}

impl<'a, T: OpcUaTransport + ?Sized> ResolutionEngine<'a, T> {
    /// Prepares a pass over a snapshot of `filters`.
    ///
    /// In name mode every filter is parsed now; malformed ones are logged and
    /// dropped from the accepted list. In identity mode the list is kept as is.
    pub fn new(
        transport: &'a T,
        subscription_id: u32,
        registry: &'a SubscriptionRegistry,
        filters: &[String],
        options: ResolveOptions,
    ) -> Self {
        let mut report = ResolutionReport::default();
        let mut parsed = Vec::new();

        if options.subscribe_by_id {
            report.accepted_filters = filters.to_vec();
        } else {
            for raw in filters {
                match SubscriptionFilter::parse(raw) {
                    Ok(filter) => {
                        parsed.push(filter);
                        report.accepted_filters.push(raw.clone());
                    }
                    Err(e) => {
                        error!(filter = %raw, error = %e, "Malformed subscription filter removed");
                        report.rejected_filters.push(raw.clone());
                    }
                }
            }
        }

        let namer = AssetNamer::new(options.asset_name_type, options.path_delimiter)
            .with_max_depth(options.max_depth);

        Self {
            transport,
            subscription_id,
            registry,
            options,
            raw_filters: filters.to_vec(),
            filters: parsed,
            namer,
            visited: HashMap::new(),
            report,
        }
    }

    /// Resolves the configured identity references directly, without a
    /// tree walk from Objects.
    ///
    /// Malformed or unknown references are logged and skipped.
    pub async fn resolve_identities(&mut self) -> usize {
        let mut total = 0;
        for raw in self.raw_filters.clone() {
            let node_id = match NodeId::parse_identity_ref(&raw) {
                Ok(id) => id,
                Err(e) => {
                    error!(filter = %raw, error = %e, "Invalid identity reference");
                    continue;
                }
            };
            let node = match self.transport.describe(&node_id).await {
                Ok(node) => node,
                Err(e) => {
                    error!(node_id = %node_id, error = %e, "Failed to resolve identity reference");
                    continue;
                }
            };
            debug!(node_id = %node_id, "Subscribing by identity");
            total += self.resolve(node, true).await;
        }
        total
    }

    /// Walks from the Objects container, falling back to the Root when
    /// Objects yields nothing.
    ///
    /// # Errors
    ///
    /// Fails if either container cannot be fetched.
    pub async fn resolve_tree(&mut self) -> OpcUaResult<usize> {
        // Whole-tree subscription only when nothing was configured; a list of
        // malformed filters still restricts the walk.
        let active = self.raw_filters.is_empty();

        let objects = self.transport.describe(&NodeId::OBJECTS_FOLDER).await?;
        let mut total = self.resolve(objects, active).await;
        if total == 0 {
            debug!("Nothing found under Objects, walking from Root");
            let root = self.transport.describe(&NodeId::ROOT_FOLDER).await?;
            total = self.resolve(root, active).await;
        }
        Ok(total)
    }

    /// Walks the subtree of `start`.
    ///
    /// Returns the number of variables newly registered in this call.
    pub async fn resolve(&mut self, start: NodeRef, active: bool) -> usize {
        let before = self.report.registered();
        let mut stack = vec![Frame {
            node: start,
            path: String::new(),
            active,
            depth: 0,
        }];

        while let Some(frame) = stack.pop() {
            if frame.depth > self.options.max_depth {
                warn!(
                    node_id = %frame.node.node_id,
                    max_depth = self.options.max_depth,
                    "Walk depth limit reached, subtree skipped"
                );
                continue;
            }

            match self.visited.get(&frame.node.node_id) {
                Some(true) => continue,
                Some(false) if !frame.active => continue,
                _ => {}
            }
            self.visited.insert(frame.node.node_id.clone(), frame.active);
            self.report.visited += 1;

            let mut children = self.visit(frame).await;
            children.reverse();
            stack.extend(children);
        }

        self.report.registered() - before
    }

    /// Consumes the engine and returns its report.
    pub fn finish(self) -> ResolutionReport {
        info!(
            registered = self.report.registered(),
            failed = self.report.failures.len(),
            visited = self.report.visited,
            rejected_filters = self.report.rejected_filters.len(),
            "Resolution pass complete"
        );
        self.report
    }

    async fn visit(&mut self, frame: Frame) -> Vec<Frame> {
        let node = &frame.node;
        debug!(
            node = %node.browse_name,
            node_id = %node.node_id,
            active = frame.active,
            "Resolving node"
        );

        if self.options.subscribe_by_id && node.is_variable() {
            let key = match self.transport.parent(&node.node_id).await {
                Ok(Some(parent)) => {
                    SubscriptionKey::new(node.browse_name.namespace_index, &parent.browse_name.name, &node.browse_name.name)
                }
                Ok(None) | Err(_) => {
                    warn!(
                        node = %node.browse_name,
                        "Failed to get parent browse name for a variable"
                    );
                    SubscriptionKey::without_parent(node.browse_name.namespace_index, &node.browse_name.name)
                }
            };
            if self.registry.mark(&key) {
                self.register(node, key, &frame.path).await;
            }
            return Vec::new();
        }

        let path = self.namer.descend(&frame.path, node);

        let variables = match self.transport.variables(&node.node_id).await {
            Ok(v) => v,
            Err(e) => {
                warn!(node_id = %node.node_id, error = %e, "Failed to list variables");
                Vec::new()
            }
        };
        if !variables.is_empty() {
            debug!(node = %node.browse_name, count = variables.len(), "Node has variables");
        }

        for variable in &variables {
            let key = SubscriptionKey::new(
                variable.browse_name.namespace_index,
                &node.browse_name.name,
                &variable.browse_name.name,
            );
            let matched = if self.options.subscribe_by_id {
                !self.raw_filters.is_empty()
            } else {
                self.filters.iter().any(|f| f.matches(&variable.browse_name))
            };

            if !(frame.active || matched) {
                continue;
            }
            if self.registry.mark(&key) {
                self.register(variable, key, &path).await;
            } else {
                debug!(key = %key, "Variable already registered in this pass");
            }
        }

        let objects = match self.transport.children(&node.node_id).await {
            Ok(c) => c,
            Err(e) => {
                warn!(node_id = %node.node_id, error = %e, "Failed to list children");
                Vec::new()
            }
        };

        objects
            .into_iter()
            .map(|child| {
                let child_active = frame.active || self.filters.iter().any(|f| f.matches(&child.browse_name));
                Frame {
                    node: child,
                    path: path.clone(),
                    active: child_active,
                    depth: frame.depth + 1,
                }
            })
            .collect()
    }

    async fn register(&mut self, variable: &NodeRef, key: SubscriptionKey, path: &str) {
        let asset_path = self.namer.asset_name(self.transport, variable, path).await;
        let binding = AssetBinding {
            asset_path: asset_path.clone(),
            datapoint: variable.browse_name.sanitized(),
        };

        // Bind before subscribing: the first notification may arrive at once.
        self.registry.bind(variable.node_id.clone(), binding);

        match self
            .transport
            .subscribe_data_change(self.subscription_id, &variable.node_id)
            .await
        {
            Ok(item_id) => {
                debug!(
                    key = %key,
                    node_id = %variable.node_id,
                    asset_path = %asset_path,
                    item_id,
                    "Subscribed to variable"
                );
                self.report.registrations.push(Registration {
                    node_id: variable.node_id.canonical(),
                    key: key.to_string(),
                    asset_path,
                });
            }
            Err(e) => {
                self.registry.unbind(&variable.node_id);
                warn!(key = %key, error = %e, "Subscription to variable failed");
                self.report.failures.push(RegistrationFailure {
                    node_id: variable.node_id.canonical(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
