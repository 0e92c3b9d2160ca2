// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Test fixtures.
//!
//! Address spaces and configuration documents shared by the integration
//! tests.

use fieldtap_opcua::{AddressSpace, NodeId, QualifiedName, SessionSettings};

// =============================================================================
// Constants
// =============================================================================

/// Endpoint every fixture session connects to.
pub const ENDPOINT: &str = "opc.tcp://localhost:4840";

/// 2024-01-01T00:00:00.123456Z in ticks since 1601.
pub const SOURCE_TICKS: i64 = 133_485_408_001_234_560;

/// Unix seconds of [`SOURCE_TICKS`].
pub const SOURCE_UNIX_SECS: i64 = 1_704_067_200;

/// Sub-second microseconds of [`SOURCE_TICKS`].
pub const SOURCE_MICROS: i64 = 123_456;

/// Session settings for [`ENDPOINT`] resolving by browse name.
pub fn settings() -> SessionSettings {
    SessionSettings::new(ENDPOINT).with_subscribe_by_id(false)
}

/// Session settings for [`ENDPOINT`] resolving by identity reference.
pub fn settings_by_id() -> SessionSettings {
    SessionSettings::new(ENDPOINT).with_subscribe_by_id(true)
}

// =============================================================================
// Address Spaces
// =============================================================================

/// Pre-built address spaces.
pub struct SpaceFixtures;

impl SpaceFixtures {
    /// A small plant.
    ///
    /// ```text
    /// Objects
    /// ├── Plant                    ns=2;s=Plant
    /// │   ├── Line1                ns=2;s=Line1
    /// │   │   ├── Motor            ns=2;s=Line1.Motor
    /// │   │   │   ├── Speed        ns=2;s=Line1.Motor.Speed
    /// │   │   │   └── "Current"    ns=2;i=1101
    /// │   │   └── Status           ns=2;s=Line1.Status
    /// │   └── Line2                ns=2;s=Line2
    /// │       └── Motor            ns=2;s=Line2.Motor
    /// │           ├── Speed        ns=2;s=Line2.Motor.Speed
    /// │           └── Load         ns=2;s=Line2.Motor.Load
    /// └── Utilities                ns=3;i=1
    ///     └── Flow                 ns=3;i=1001
    /// ```
    ///
    /// Both `Speed` variables share the key `2:Motor:Speed`, so a full walk
    /// registers five variables.
    pub fn plant() -> AddressSpace {
        let plant = NodeId::string(2, "Plant");
        let line1 = NodeId::string(2, "Line1");
        let line2 = NodeId::string(2, "Line2");
        let motor1 = NodeId::string(2, "Line1.Motor");
        let motor2 = NodeId::string(2, "Line2.Motor");
        let utilities = Self::utilities();

        AddressSpace::new()
            .with_object(&NodeId::OBJECTS_FOLDER, plant.clone(), QualifiedName::new(2, "Plant"))
            .with_object(&plant, line1.clone(), QualifiedName::new(2, "Line1"))
            .with_object(&line1, motor1.clone(), QualifiedName::new(2, "Motor"))
            .with_variable(&motor1, Self::line1_speed(), QualifiedName::new(2, "Speed"))
            .with_variable(&motor1, Self::line1_current(), QualifiedName::new(2, "\"Current\""))
            .with_variable(&line1, Self::line1_status(), QualifiedName::new(2, "Status"))
            .with_object(&plant, line2.clone(), QualifiedName::new(2, "Line2"))
            .with_object(&line2, motor2.clone(), QualifiedName::new(2, "Motor"))
            .with_variable(&motor2, Self::line2_speed(), QualifiedName::new(2, "Speed"))
            .with_variable(&motor2, Self::line2_load(), QualifiedName::new(2, "Load"))
            .with_object(&NodeId::OBJECTS_FOLDER, utilities.clone(), QualifiedName::new(3, "Utilities"))
            .with_variable(&utilities, Self::flow(), QualifiedName::new(3, "Flow"))
    }

    /// An address space whose only variable hangs off the Root folder.
    pub fn root_only() -> AddressSpace {
        AddressSpace::new().with_variable(
            &NodeId::ROOT_FOLDER,
            Self::root_variable(),
            QualifiedName::new(1, "ServerTime"),
        )
    }

    /// Line 1 object.
    pub fn line1() -> NodeId {
        NodeId::string(2, "Line1")
    }

    /// Utilities object.
    pub fn utilities() -> NodeId {
        NodeId::numeric(3, 1)
    }

    /// `Plant/Line1/Motor/Speed`.
    pub fn line1_speed() -> NodeId {
        NodeId::string(2, "Line1.Motor.Speed")
    }

    /// `Plant/Line1/Motor/"Current"`.
    pub fn line1_current() -> NodeId {
        NodeId::numeric(2, 1101)
    }

    /// `Plant/Line1/Status`.
    pub fn line1_status() -> NodeId {
        NodeId::string(2, "Line1.Status")
    }

    /// `Plant/Line2/Motor/Speed`.
    pub fn line2_speed() -> NodeId {
        NodeId::string(2, "Line2.Motor.Speed")
    }

    /// `Plant/Line2/Motor/Load`.
    pub fn line2_load() -> NodeId {
        NodeId::string(2, "Line2.Motor.Load")
    }

    /// `Utilities/Flow`.
    pub fn flow() -> NodeId {
        NodeId::numeric(3, 1001)
    }

    /// The variable of [`SpaceFixtures::root_only`].
    pub fn root_variable() -> NodeId {
        NodeId::string(1, "ServerTime")
    }
}

// =============================================================================
// Configuration Documents
// =============================================================================

/// Configuration documents in every supported format.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// YAML configuration subscribing to line 1 by browse name.
    pub fn yaml() -> String {
        format!(
            r#"
asset: "line1/"
url: "{ENDPOINT}"
subscriptions:
  - "2:Line1"
subscribeById: false
assetNameType: SubscriptionPathWithBrowseName
reportingInterval: 250
logging:
  level: debug
  format: json
"#
        )
    }

    /// TOML configuration subscribing to the utilities by identity.
    pub fn toml() -> String {
        format!(
            r#"
asset = "utilities/"
url = "{ENDPOINT}"
subscriptions = ["ns=3;i=1"]
subscribeById = true
pathDelimiter = "."
assetNameType = "FullPathWithBrowseName"
"#
        )
    }

    /// JSON configuration carrying a subscription document.
    pub fn json() -> String {
        format!(
            r#"{{
  "asset": "plant/",
  "url": "{ENDPOINT}",
  "subscription": "{{\"subscriptions\":[\"Speed\",\"Flow\"]}}",
  "subscribeById": false,
  "zeroSubscriptionPolicy": "fail"
}}"#
        )
    }

    /// YAML configuration with `${VAR}` placeholders for the endpoint and
    /// asset.
    pub fn yaml_with_placeholders() -> String {
        r#"
asset: "${PLANT_ASSET:plant/}"
url: "${PLANT_URL}"
subscriptions:
  - "2:Line2"
subscribeById: false
"#
        .to_string()
    }

    /// A host configuration category for the plant endpoint.
    ///
    /// `subscriptions` are written into the escaped subscription document
    /// the host sends.
    pub fn category(asset: &str, by_id: bool, subscriptions: &[&str]) -> String {
        let filters = subscriptions
            .iter()
            .map(|s| format!("\\\"{}\\\"", s))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            r#"{{
  "asset": {{ "value": "{asset}" }},
  "url": {{ "value": "{ENDPOINT}" }},
  "subscription": {{ "value": "{{\"subscriptions\":[{filters}]}}" }},
  "subscribeById": {{ "value": "{by_id}" }},
  "reportingInterval": {{ "value": "100" }},
  "assetNameType": {{ "value": "NodeId" }}
}}"#
        )
    }
}
