// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Asset name resolution.
//!
//! Every registered variable gets an asset path according to one of six
//! policies:
//!
//! | Policy                            | Segment       | Asset path                         |
//! |-----------------------------------|---------------|------------------------------------|
//! | `NodeId`                          | canonical id  | segment of the variable            |
//! | `BrowseName`                      | browse name   | segment of the variable            |
//! | `Subscription Path with NodeId`   | canonical id  | walk path + variable segment       |
//! | `Subscription Path with BrowseName` | browse name | walk path + variable segment       |
//! | `Full Path with NodeId`           | canonical id  | ancestors below Objects + variable |
//! | `Full Path with BrowseName`       | browse name   | ancestors below Objects + variable |
//!
//! Full paths come from an upward walk over the hierarchical parents and do
//! not depend on which filter caused the variable to be visited. The walk is
//! bounded and memoized for the lifetime of one [`AssetNamer`], which the
//! resolution engine creates fresh for every pass.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::OpcUaTransport;
use crate::error::{BrowseError, ConfigurationError, OpcUaResult};
use crate::types::{NodeId, NodeRef};

/// Default bound on the upward walk.
pub const DEFAULT_MAX_DEPTH: usize = 64;

// =============================================================================
// AssetNameType
// =============================================================================

/// Asset naming policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AssetNameType {
    /// Canonical node identity.
    #[default]
    NodeId,
    /// Browse name.
    BrowseName,
    /// Walk path of canonical identities.
    SubscriptionPathWithNodeId,
    /// Walk path of browse names.
    SubscriptionPathWithBrowseName,
    /// Ancestor path of canonical identities.
    FullPathWithNodeId,
    /// Ancestor path of browse names.
    FullPathWithBrowseName,
}

impl AssetNameType {
    /// Every policy, in configuration order.
    pub const ALL: [AssetNameType; 6] = [
        Self::NodeId,
        Self::BrowseName,
        Self::SubscriptionPathWithNodeId,
        Self::SubscriptionPathWithBrowseName,
        Self::FullPathWithNodeId,
        Self::FullPathWithBrowseName,
    ];

    /// Returns the configuration string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NodeId => "NodeId",
            Self::BrowseName => "BrowseName",
            Self::SubscriptionPathWithNodeId => "Subscription Path with NodeId",
            Self::SubscriptionPathWithBrowseName => "Subscription Path with BrowseName",
            Self::FullPathWithNodeId => "Full Path with NodeId",
            Self::FullPathWithBrowseName => "Full Path with BrowseName",
        }
    }

    /// Returns `true` if segments are browse names rather than identities.
    pub const fn uses_browse_name(&self) -> bool {
        matches!(
            self,
            Self::BrowseName | Self::SubscriptionPathWithBrowseName | Self::FullPathWithBrowseName
        )
    }

    /// Returns `true` if the asset path is the accumulated walk path.
    pub const fn uses_subscription_path(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionPathWithNodeId | Self::SubscriptionPathWithBrowseName
        )
    }

    /// Returns `true` if the asset path is the ancestor path.
    pub const fn uses_full_path(&self) -> bool {
        matches!(self, Self::FullPathWithNodeId | Self::FullPathWithBrowseName)
    }
}

impl fmt::Display for AssetNameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetNameType {
    type Err = ConfigurationError;

    /// Parses a configuration string.
    ///
    /// Matching ignores case and whitespace, so `"Full Path with NodeId"` and
    /// `"fullpathwithnodeid"` are the same policy. An empty string selects
    /// the default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
        if wanted.is_empty() {
            return Ok(Self::default());
        }
        Self::ALL
            .into_iter()
            .find(|policy| {
                policy
                    .as_str()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_lowercase()
                    == wanted
            })
            .ok_or_else(|| ConfigurationError::invalid_value("assetNameType", s))
    }
}

impl TryFrom<String> for AssetNameType {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssetNameType> for String {
    fn from(value: AssetNameType) -> Self {
        value.as_str().to_string()
    }
}

// =============================================================================
// PathDelimiter
// =============================================================================

/// Single-character path delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PathDelimiter(char);

impl PathDelimiter {
    /// Builds the delimiter from a configured string.
    ///
    /// An empty string falls back to `/`; longer strings keep their first
    /// character.
    ///
    /// ```
    /// use fieldtap_opcua::naming::PathDelimiter;
    ///
    /// assert_eq!(PathDelimiter::from_config("").as_char(), '/');
    /// assert_eq!(PathDelimiter::from_config("::").as_char(), ':');
    /// ```
    pub fn from_config(s: &str) -> Self {
        Self(s.chars().next().unwrap_or('/'))
    }

    /// Returns the delimiter character.
    pub const fn as_char(&self) -> char {
        self.0
    }
}

impl Default for PathDelimiter {
    fn default() -> Self {
        Self('/')
    }
}

impl fmt::Display for PathDelimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PathDelimiter {
    fn from(value: String) -> Self {
        Self::from_config(&value)
    }
}

impl From<PathDelimiter> for String {
    fn from(value: PathDelimiter) -> Self {
        value.0.to_string()
    }
}

// =============================================================================
// AssetNamer
// =============================================================================

/// Computes segments and asset paths for one resolution pass.
#[derive(Debug)]
pub struct AssetNamer {
    policy: AssetNameType,
    delimiter: PathDelimiter,
    max_depth: usize,
    full_paths: HashMap<NodeId, String>,
}

impl AssetNamer {
    /// Creates a namer with an empty memo.
    pub fn new(policy: AssetNameType, delimiter: PathDelimiter) -> Self {
        Self {
            policy,
            delimiter,
            max_depth: DEFAULT_MAX_DEPTH,
            full_paths: HashMap::new(),
        }
    }

    /// Sets the bound on the upward walk.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Returns the policy.
    pub fn policy(&self) -> AssetNameType {
        self.policy
    }

    /// Returns the node's own segment.
    pub fn name(&self, node: &NodeRef) -> String {
        if self.policy.uses_browse_name() {
            node.browse_name.sanitized()
        } else {
            node.node_id.canonical()
        }
    }

    /// Appends `node`'s segment to a walk path.
    ///
    /// The path is only tracked for the subscription-path policies; the
    /// Root and Objects containers never contribute a segment.
    pub fn descend(&self, accumulated: &str, node: &NodeRef) -> String {
        if !self.policy.uses_subscription_path() || node.node_id.is_container() {
            return accumulated.to_string();
        }
        self.join(accumulated, &self.name(node))
    }

    /// Returns the ancestor path of `node`, from below the Objects container
    /// down to and including `node`.
    ///
    /// # Errors
    ///
    /// Fails if a parent lookup fails or the walk exceeds the depth bound.
    pub async fn full_path<T>(&mut self, transport: &T, node: &NodeRef) -> OpcUaResult<String>
    where
        T: OpcUaTransport + ?Sized,
    {
        let mut chain: Vec<NodeRef> = Vec::new();
        let mut prefix = String::new();
        let mut cursor = Some(node.clone());

        while let Some(current) = cursor {
            if current.node_id.is_container() {
                break;
            }
            if let Some(cached) = self.full_paths.get(&current.node_id) {
                prefix = cached.clone();
                break;
            }
            if chain.len() >= self.max_depth {
                return Err(BrowseError::path_too_deep(node.node_id.to_string(), self.max_depth).into());
            }
            cursor = transport.parent(&current.node_id).await?;
            chain.push(current);
        }

        let mut path = prefix;
        for ancestor in chain.iter().rev() {
            path = self.join(&path, &self.name(ancestor));
            self.full_paths.insert(ancestor.node_id.clone(), path.clone());
        }
        Ok(path)
    }

    /// Returns the asset path of a variable.
    ///
    /// `accumulated` is the walk path of the object being visited. A failed
    /// ancestor walk falls back to the variable's own segment.
    pub async fn asset_name<T>(&mut self, transport: &T, variable: &NodeRef, accumulated: &str) -> String
    where
        T: OpcUaTransport + ?Sized,
    {
        if self.policy.uses_subscription_path() {
            return self.join(accumulated, &self.name(variable));
        }
        if self.policy.uses_full_path() {
            return match self.full_path(transport, variable).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(
                        node_id = %variable.node_id,
                        error = %e,
                        "Failed to resolve full path, using node segment"
                    );
                    self.name(variable)
                }
            };
        }
        self.name(variable)
    }

    fn join(&self, path: &str, segment: &str) -> String {
        if path.is_empty() {
            segment.to_string()
        } else {
            format!("{}{}{}", path, self.delimiter, segment)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AddressSpace, MemoryTransport};
    use crate::types::{NodeClass, QualifiedName};

    fn plant() -> (MemoryTransport, NodeRef) {
        let plant = NodeId::string(2, "Plant");
        let line = NodeId::string(2, "Line1");
        let speed = NodeId::numeric(2, 1001);
        let space = AddressSpace::new()
            .with_object(&NodeId::OBJECTS_FOLDER, plant.clone(), QualifiedName::new(2, "Plant"))
            .with_object(&plant, line.clone(), QualifiedName::new(2, "\"Line1\""))
            .with_variable(&line, speed.clone(), QualifiedName::new(2, "Speed"));
        let node = NodeRef::new(speed, QualifiedName::new(2, "Speed"), NodeClass::Variable);
        (MemoryTransport::new(space), node)
    }

    async fn connected() -> (MemoryTransport, NodeRef) {
        let (mut transport, node) = plant();
        transport.connect("opc.tcp://localhost:4840").await.unwrap();
        (transport, node)
    }

    #[test]
    fn test_policy_strings() {
        for policy in AssetNameType::ALL {
            assert_eq!(policy.as_str().parse::<AssetNameType>().unwrap(), policy);
        }
        assert_eq!("".parse::<AssetNameType>().unwrap(), AssetNameType::NodeId);
        assert_eq!(
            "fullpathwithbrowsename".parse::<AssetNameType>().unwrap(),
            AssetNameType::FullPathWithBrowseName
        );
        assert!("Path".parse::<AssetNameType>().is_err());
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&AssetNameType::SubscriptionPathWithNodeId).unwrap();
        assert_eq!(json, "\"Subscription Path with NodeId\"");
        let back: AssetNameType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AssetNameType::SubscriptionPathWithNodeId);
    }

    #[test]
    fn test_delimiter_from_config() {
        assert_eq!(PathDelimiter::from_config("").as_char(), '/');
        assert_eq!(PathDelimiter::from_config("::").as_char(), ':');
        assert_eq!(PathDelimiter::from_config(".").as_char(), '.');
        assert_eq!(PathDelimiter::default().as_char(), '/');
    }

    #[test]
    fn test_short_names() {
        let node = NodeRef::new(
            NodeId::string(5, "Random1"),
            QualifiedName::new(5, "\"Random\""),
            NodeClass::Variable,
        );
        let by_id = AssetNamer::new(AssetNameType::NodeId, PathDelimiter::default());
        assert_eq!(by_id.name(&node), "ns=5;s=Random1");
        let by_name = AssetNamer::new(AssetNameType::BrowseName, PathDelimiter::default());
        assert_eq!(by_name.name(&node), "Random");
    }

    #[test]
    fn test_descend_tracks_walk_only_for_subscription_policies() {
        let objects = NodeRef::new(NodeId::OBJECTS_FOLDER, QualifiedName::new(0, "Objects"), NodeClass::Object);
        let sim = NodeRef::new(NodeId::string(5, "Sim"), QualifiedName::new(5, "Simulation"), NodeClass::Object);

        let namer = AssetNamer::new(AssetNameType::SubscriptionPathWithBrowseName, PathDelimiter::from_config("."));
        let path = namer.descend("", &objects);
        assert_eq!(path, "");
        assert_eq!(namer.descend(&path, &sim), "Simulation");
        assert_eq!(namer.descend("A", &sim), "A.Simulation");

        let plain = AssetNamer::new(AssetNameType::BrowseName, PathDelimiter::default());
        assert_eq!(plain.descend("", &sim), "");
    }

    #[tokio::test]
    async fn test_full_path_by_browse_name() {
        let (transport, node) = connected().await;
        let mut namer = AssetNamer::new(AssetNameType::FullPathWithBrowseName, PathDelimiter::default());
        assert_eq!(namer.full_path(&transport, &node).await.unwrap(), "Plant/Line1/Speed");
        assert_eq!(namer.asset_name(&transport, &node, "ignored").await, "Plant/Line1/Speed");
    }

    #[tokio::test]
    async fn test_full_path_by_node_id() {
        let (transport, node) = connected().await;
        let mut namer = AssetNamer::new(AssetNameType::FullPathWithNodeId, PathDelimiter::from_config("|"));
        assert_eq!(
            namer.full_path(&transport, &node).await.unwrap(),
            "ns=2;s=Plant|ns=2;s=Line1|ns=2;i=1001"
        );
    }

    #[tokio::test]
    async fn test_full_path_is_memoized() {
        let (transport, node) = connected().await;
        let mut namer = AssetNamer::new(AssetNameType::FullPathWithBrowseName, PathDelimiter::default());
        namer.full_path(&transport, &node).await.unwrap();
        let after_first = transport.parent_lookups();

        let sibling = NodeRef::new(NodeId::numeric(2, 1002), QualifiedName::new(2, "Torque"), NodeClass::Variable);
        transport.update_space(|space| {
            space.insert(&NodeId::string(2, "Line1"), sibling.clone());
        });
        assert_eq!(namer.full_path(&transport, &sibling).await.unwrap(), "Plant/Line1/Torque");
        assert_eq!(transport.parent_lookups(), after_first + 1);
    }

    #[tokio::test]
    async fn test_full_path_depth_bound() {
        let (transport, node) = connected().await;
        let mut namer = AssetNamer::new(AssetNameType::FullPathWithBrowseName, PathDelimiter::default())
            .with_max_depth(2);
        assert!(namer.full_path(&transport, &node).await.is_err());
        assert_eq!(namer.asset_name(&transport, &node, "").await, "Speed");
    }

    #[tokio::test]
    async fn test_subscription_path_asset_name() {
        let (transport, node) = connected().await;
        let mut namer = AssetNamer::new(AssetNameType::SubscriptionPathWithNodeId, PathDelimiter::default());
        assert_eq!(
            namer.asset_name(&transport, &node, "ns=2;s=Line1").await,
            "ns=2;s=Line1/ns=2;i=1001"
        );
        assert_eq!(namer.asset_name(&transport, &node, "").await, "ns=2;i=1001");
    }
}
