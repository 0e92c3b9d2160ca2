// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Address-space types shared by every stage of the engine.
//!
//! - **NodeId**: namespaced node identity with the canonical `ns=<n>;i=<k>` /
//!   `ns=<n>;s=<str>` string form
//! - **ExpandedNodeId**: a NodeId as it arrives in browse references, with the
//!   server index that canonical formatting strips
//! - **QualifiedName**: namespaced browse name
//! - **NodeClass** / **NodeRef**: what a browse returns about a node
//! - **SubscriptionSettings**: server-side subscription parameters
//!
//! # Examples
//!
//! ```
//! use fieldtap_opcua::types::NodeId;
//!
//! let node: NodeId = "s=Random1;ns=5".parse().unwrap();
//! assert_eq!(node.canonical(), "ns=5;s=Random1");
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigurationError, OpcUaError};

// =============================================================================
// NodeId
// =============================================================================

/// A node's identity: namespace index plus identifier.
///
/// Equality is structural, the same comparison the protocol uses. Identities
/// read from the server are never modified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index; 0 is the standard namespace.
    pub namespace_index: u16,
    /// Identifier within the namespace.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// The absolute root of the address space (`ns=0;i=84`).
    pub const ROOT_FOLDER: NodeId = NodeId::standard(84);

    /// The Objects container (`ns=0;i=85`).
    pub const OBJECTS_FOLDER: NodeId = NodeId::standard(85);

    const fn standard(id: u32) -> Self {
        Self {
            namespace_index: 0,
            identifier: NodeIdentifier::Numeric(id),
        }
    }

    /// `ns=<namespace_index>;i=<value>`.
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        NodeIdentifier::Numeric(value).in_namespace(namespace_index)
    }

    /// `ns=<namespace_index>;s=<value>`.
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        NodeIdentifier::String(value.into()).in_namespace(namespace_index)
    }

    /// `ns=<namespace_index>;g=<value>`.
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        NodeIdentifier::Guid(value).in_namespace(namespace_index)
    }

    /// `ns=<namespace_index>;b=<base64 of value>`.
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        NodeIdentifier::Opaque(value).in_namespace(namespace_index)
    }

    /// Returns `true` if this is the Root or Objects folder.
    ///
    /// Neither container contributes a segment to an asset path.
    #[inline]
    pub fn is_container(&self) -> bool {
        *self == Self::ROOT_FOLDER || *self == Self::OBJECTS_FOLDER
    }

    /// Returns the canonical identity string.
    ///
    /// The namespace is always present and there is no trailing separator:
    /// `ns=<n>;i=<k>`, `ns=<n>;s=<str>`, `ns=<n>;g=<uuid>` or `ns=<n>;b=<base64>`.
    ///
    /// ```
    /// use fieldtap_opcua::types::NodeId;
    ///
    /// assert_eq!(NodeId::numeric(0, 85).canonical(), "ns=0;i=85");
    /// assert_eq!(NodeId::string(5, "Random1").canonical(), "ns=5;s=Random1");
    /// ```
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Parses an identity reference of the form `ns=<n>;s=<string>` or
    /// `ns=<n>;i=<number>`, with the two fields in either order.
    ///
    /// Unlike [`FromStr`], the namespace is mandatory and only string and
    /// numeric identifiers are accepted.
    pub fn parse_identity_ref(s: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::invalid_node_id(s, reason);

        let trimmed = s.trim();
        if !trimmed.contains("ns=") {
            return Err(invalid("must be of the form ns=...;s=... or ns=...;i=..."));
        }
        let node = parse_fields(trimmed).map_err(|reason| invalid(&reason))?;
        if matches!(node.identifier, NodeIdentifier::Guid(_) | NodeIdentifier::Opaque(_)) {
            return Err(invalid("only s= and i= identifiers are accepted"));
        }
        Ok(node)
    }
}

/// Splits `ns=..;<id>` or `<id>;ns=..` into its parts. A missing
/// namespace means namespace 0.
fn parse_fields(s: &str) -> Result<NodeId, String> {
    let (namespace, id) = match s.strip_prefix("ns=") {
        Some(rest) => rest
            .split_once(';')
            .map(|(ns, id)| (Some(ns), id))
            .ok_or_else(|| "missing identifier after namespace".to_string())?,
        None => match s.rsplit_once(";ns=") {
            Some((id, ns)) => (Some(ns), id),
            None => (None, s),
        },
    };

    let namespace_index = namespace
        .map(|ns| ns.trim().parse::<u16>().map_err(|_| format!("invalid namespace index '{}'", ns)))
        .transpose()?
        .unwrap_or(0);

    let id = id.trim_start();
    let (kind, value) = id
        .split_once('=')
        .ok_or_else(|| "unknown identifier type, expected i=, s=, g= or b=".to_string())?;
    let identifier = match kind {
        "i" => value
            .trim()
            .parse()
            .map(NodeIdentifier::Numeric)
            .map_err(|_| format!("invalid numeric identifier '{}'", value))?,
        "s" => NodeIdentifier::String(value.to_string()),
        "g" => Uuid::parse_str(value.trim())
            .map(NodeIdentifier::Guid)
            .map_err(|e| format!("invalid GUID: {}", e))?,
        "b" => BASE64
            .decode(value.trim())
            .map(NodeIdentifier::Opaque)
            .map_err(|e| format!("invalid base64: {}", e))?,
        _ => return Err("unknown identifier type, expected i=, s=, g= or b=".to_string()),
    };

    Ok(identifier.in_namespace(namespace_index))
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};{}", self.namespace_index, self.identifier)
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    /// Accepts `ns=2;i=1001`, `ns=2;s=Line1`, `ns=2;g=<uuid>`,
    /// `ns=2;b=<base64>`, the reversed `s=Line1;ns=2`, and `i=85`
    /// (namespace 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fields(s.trim()).map_err(|reason| ConfigurationError::invalid_node_id(s, reason).into())
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// The identifier half of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// `i=`
    Numeric(u32),
    /// `s=`
    String(String),
    /// `g=`
    Guid(Uuid),
    /// `b=`, base64 in the string form.
    Opaque(Vec<u8>),
}

impl NodeIdentifier {
    /// Places this identifier in `namespace_index`.
    pub fn in_namespace(self, namespace_index: u16) -> NodeId {
        NodeId {
            namespace_index,
            identifier: self,
        }
    }
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// ExpandedNodeId
// =============================================================================

/// A node reference as carried in browse results.
///
/// The server index and namespace URI are part of the wire encoding but not of
/// the node's identity; [`ExpandedNodeId::canonical`] drops them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedNodeId {
    /// The local node identity.
    pub node_id: NodeId,
    /// Namespace URI, when the server sent one instead of an index.
    pub namespace_uri: Option<String>,
    /// Index of the server holding the node (0 = this server).
    pub server_index: u32,
}

impl ExpandedNodeId {
    /// Wraps a local node id.
    pub fn local(node_id: NodeId) -> Self {
        Self {
            node_id,
            namespace_uri: None,
            server_index: 0,
        }
    }

    /// Sets the server index.
    pub fn with_server_index(mut self, server_index: u32) -> Self {
        self.server_index = server_index;
        self
    }

    /// True when the node lives on the server this session is connected to.
    pub fn is_local(&self) -> bool {
        self.server_index == 0
    }

    /// Returns the canonical identity string without the server index.
    pub fn canonical(&self) -> String {
        self.node_id.canonical()
    }
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.server_index != 0 {
            write!(f, "svr={};", self.server_index)?;
        }
        if let Some(uri) = &self.namespace_uri {
            write!(f, "nsu={};", uri)?;
        }
        write!(f, "{}", self.node_id)
    }
}

impl From<ExpandedNodeId> for NodeId {
    fn from(expanded: ExpandedNodeId) -> Self {
        expanded.node_id
    }
}

// =============================================================================
// QualifiedName
// =============================================================================

/// A namespace-qualified browse name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Namespace index.
    pub namespace_index: u16,
    /// Name part.
    pub name: String,
}

impl QualifiedName {
    /// Creates a new qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }

    /// Returns the name with double quotes removed.
    ///
    /// Some servers quote browse names; quotes are never carried into asset
    /// names or datapoint names.
    pub fn sanitized(&self) -> String {
        strip_quotes(&self.name)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace_index, self.name)
    }
}

/// Removes every double-quote character from `s`.
pub fn strip_quotes(s: &str) -> String {
    s.chars().filter(|c| *c != '"').collect()
}

// =============================================================================
// NodeClass
// =============================================================================

/// Node class, with its protocol bit-mask value as discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum NodeClass {
    /// Folders and other containers.
    Object = 1,
    /// Value-carrying leaves; the only class that is subscribed.
    Variable = 2,
    /// Callable methods.
    Method = 4,
    /// Object type definitions.
    ObjectType = 8,
    /// Variable type definitions.
    VariableType = 16,
    /// Reference type definitions.
    ReferenceType = 32,
    /// Data type definitions.
    DataType = 64,
    /// Views are walked like objects.
    View = 128,
}

impl NodeClass {
    const ALL: [NodeClass; 8] = [
        Self::Object,
        Self::Variable,
        Self::Method,
        Self::ObjectType,
        Self::VariableType,
        Self::ReferenceType,
        Self::DataType,
        Self::View,
    ];

    /// Returns the bit-mask value used in browse class filters.
    pub const fn value(&self) -> u32 {
        *self as u32
    }

    /// Looks up the class for a single-bit mask value.
    pub fn from_value(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.value() == value)
    }

    /// Returns `true` for the variable class.
    pub const fn is_variable(&self) -> bool {
        matches!(self, Self::Variable)
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// NodeRef
// =============================================================================

/// A node handle as returned by the directory capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// The node identity.
    pub node_id: NodeId,
    /// The node's browse name.
    pub browse_name: QualifiedName,
    /// The node class.
    pub node_class: NodeClass,
}

impl NodeRef {
    /// Creates a node handle.
    pub fn new(node_id: NodeId, browse_name: QualifiedName, node_class: NodeClass) -> Self {
        Self {
            node_id,
            browse_name,
            node_class,
        }
    }

    /// Returns `true` if this node is a variable.
    pub fn is_variable(&self) -> bool {
        self.node_class.is_variable()
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.browse_name, self.node_id)
    }
}

// =============================================================================
// SubscriptionSettings
// =============================================================================

/// Parameters of the one subscription a session creates.
///
/// Only the publishing interval follows configuration (`reportingInterval`);
/// the counts are values servers generally accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSettings {
    /// How often the server sends queued changes.
    pub publishing_interval: Duration,
    /// Publishing intervals without a publish request before the server drops the subscription.
    pub lifetime_count: u32,
    /// Empty publishing intervals before the server sends a keep-alive.
    pub keepalive_count: u32,
    /// 0 means unlimited on most servers; bounded here to keep publish responses small.
    pub max_notifications_per_publish: u32,
    /// Relative priority among this client's subscriptions.
    pub priority: u8,
    /// Server-side queue length of each monitored item.
    pub queue_size: u32,
}

impl SubscriptionSettings {
    /// Settings for a subscription publishing every `interval`.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            publishing_interval: interval,
            lifetime_count: 60,
            keepalive_count: 10,
            max_notifications_per_publish: 65_535,
            priority: 0,
            queue_size: 10,
        }
    }
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self::with_interval(Duration::from_millis(100))
    }
}

impl fmt::Display for SubscriptionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "every {} (lifetime {}, keep-alive {}, queue {})",
            humantime::format_duration(self.publishing_interval),
            self.lifetime_count,
            self.keepalive_count,
            self.queue_size
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
