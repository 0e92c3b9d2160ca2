// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA Integration Tests
//!
//! End-to-end runs of the session controller against the in-process
//! [`MemoryTransport`]: filters are resolved, monitored items created, and
//! published values followed through the pipeline into a channel sink.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fieldtap-opcua --test opcua_integration
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use fieldtap_opcua::{
    AddressSpace, AssetNameType, ChannelSink, IngestRecord, MemoryTransport, NodeId,
    NormalizedValue, PathDelimiter, QualifiedName, SessionController, SessionSettings,
    SessionState, UtcTimestamp, Variant, VariantArray, VariantType,
};

// =============================================================================
// Test Configuration
// =============================================================================

const ENDPOINT: &str = "opc.tcp://localhost:4840";

/// 2024-01-01T00:00:00.123456Z in ticks since 1601.
const SOURCE_TICKS: i64 = 133_485_408_001_234_560;

/// Objects
/// └── Simulation            (ns=5)
///     ├── Random1           variable
///     ├── Counter1          variable
///     └── Folder            (ns=5)
///         └── Sawtooth1     variable
/// Plant                     (ns=2, sibling of Simulation)
/// └── Speed                 variable
fn simulation_space() -> AddressSpace {
    let simulation = NodeId::string(5, "85/0:Simulation");
    let folder = NodeId::string(5, "Folder");
    let plant = NodeId::numeric(2, 1);

    AddressSpace::new()
        .with_object(&NodeId::OBJECTS_FOLDER, simulation.clone(), QualifiedName::new(5, "Simulation"))
        .with_variable(&simulation, NodeId::string(5, "Random1"), QualifiedName::new(5, "Random1"))
        .with_variable(&simulation, NodeId::string(5, "Counter1"), QualifiedName::new(5, "Counter1"))
        .with_object(&simulation, folder.clone(), QualifiedName::new(5, "Folder"))
        .with_variable(&folder, NodeId::string(5, "Sawtooth1"), QualifiedName::new(5, "Sawtooth1"))
        .with_object(&NodeId::OBJECTS_FOLDER, plant.clone(), QualifiedName::new(2, "Plant"))
        .with_variable(&plant, NodeId::numeric(2, 1001), QualifiedName::new(2, "Speed"))
}

fn session(
    settings: SessionSettings,
) -> (
    MemoryTransport,
    SessionController<MemoryTransport>,
    UnboundedReceiver<IngestRecord>,
) {
    let transport = MemoryTransport::new(simulation_space());
    let (sink, rx) = ChannelSink::new();
    let controller = SessionController::new(transport.clone(), settings, Arc::new(sink));
    (transport, controller, rx)
}

async fn next_record(rx: &mut UnboundedReceiver<IngestRecord>) -> IngestRecord {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("record within timeout")
        .expect("sink open")
}

// =============================================================================
// Resolution Scenarios
// =============================================================================

#[tokio::test]
async fn test_qualified_filter_subscribes_subtree() {
    let (transport, controller, mut rx) = session(SessionSettings::new(ENDPOINT));
    controller.add_subscription("5:Simulation").await;

    let report = controller.start().await.unwrap();

    assert_eq!(report.registered(), 3);
    let monitored = transport.monitored_nodes();
    assert!(monitored.contains(&NodeId::string(5, "Random1")));
    assert!(monitored.contains(&NodeId::string(5, "Sawtooth1")));
    assert!(!monitored.contains(&NodeId::numeric(2, 1001)));

    let binding = controller.registry().lookup(&NodeId::string(5, "Random1")).unwrap();
    assert_eq!(binding.asset_path, "ns=5;s=Random1");

    transport.publish(&NodeId::string(5, "Random1"), Variant::Double(0.25), Some(SOURCE_TICKS));
    let record = next_record(&mut rx).await;
    assert_eq!(record.asset, "ns=5;s=Random1");
    assert_eq!(record.readings[0].name, "Random1");
    assert_eq!(record.readings[0].value, NormalizedValue::Float(0.25));
    assert_eq!(record.timestamp, UtcTimestamp::new(1_704_067_200, 123_456));
}

#[tokio::test]
async fn test_identity_filter_registers_exactly_one() {
    let settings = SessionSettings::new(ENDPOINT).with_subscribe_by_id(true);
    let (transport, controller, _rx) = session(settings);
    controller.add_subscription("ns=5;s=Random1").await;

    let report = controller.start().await.unwrap();

    assert_eq!(report.registered(), 1);
    assert_eq!(report.visited, 1);
    assert_eq!(transport.monitored_nodes(), vec![NodeId::string(5, "Random1")]);
}

#[tokio::test]
async fn test_no_filters_subscribes_everything() {
    let (transport, controller, _rx) = session(SessionSettings::new(ENDPOINT));

    let report = controller.start().await.unwrap();

    assert_eq!(report.registered(), 4);
    assert_eq!(transport.monitored_nodes().len(), 4);
}

#[tokio::test]
async fn test_bare_variable_filter() {
    let (transport, controller, _rx) = session(SessionSettings::new(ENDPOINT));
    controller.add_subscription("Speed").await;

    controller.start().await.unwrap();

    assert_eq!(transport.monitored_nodes(), vec![NodeId::numeric(2, 1001)]);
}

// =============================================================================
// Naming Scenarios
// =============================================================================

#[tokio::test]
async fn test_subscription_path_with_browse_name() {
    let settings = SessionSettings::new(ENDPOINT)
        .with_asset_name("opcua/")
        .with_asset_name_type(AssetNameType::SubscriptionPathWithBrowseName);
    let (transport, controller, mut rx) = session(settings);
    controller.add_subscription("5:Simulation").await;
    controller.start().await.unwrap();

    transport.publish(&NodeId::string(5, "Sawtooth1"), Variant::Int32(-4), None);
    let record = next_record(&mut rx).await;

    assert_eq!(record.asset, "opcua/Simulation/Folder/Sawtooth1");
    assert_eq!(record.readings[0].value, NormalizedValue::Integer(-4));
}

#[tokio::test]
async fn test_full_path_with_custom_delimiter() {
    let settings = SessionSettings::new(ENDPOINT)
        .with_asset_name_type(AssetNameType::FullPathWithBrowseName)
        .with_path_delimiter(PathDelimiter::from_config("."));
    let (transport, controller, mut rx) = session(settings);
    controller.add_subscription("Sawtooth1").await;
    controller.start().await.unwrap();

    transport.publish(&NodeId::string(5, "Sawtooth1"), Variant::Boolean(true), None);
    let record = next_record(&mut rx).await;

    assert_eq!(record.asset, "Simulation.Folder.Sawtooth1");
    assert_eq!(record.readings[0].value, NormalizedValue::String("true".into()));
}

// =============================================================================
// Value Scenarios
// =============================================================================

#[tokio::test]
async fn test_dropped_values_are_counted() {
    let (transport, controller, mut rx) = session(SessionSettings::new(ENDPOINT));
    controller.add_subscription("Counter1").await;
    controller.start().await.unwrap();

    let counter = NodeId::string(5, "Counter1");
    transport.publish(&counter, Variant::Empty, None);
    transport.publish(
        &counter,
        Variant::Array(VariantArray::new(VariantType::String, vec![Variant::String("a".into())])),
        None,
    );
    transport.publish(&counter, Variant::double_array([1.0, 2.5]), None);

    let record = next_record(&mut rx).await;
    assert_eq!(record.readings[0].value, NormalizedValue::FloatArray(vec![1.0, 2.5]));

    let stats = controller.stats();
    assert_eq!(stats.received, 3);
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.emitted, 1);
}

#[tokio::test]
async fn test_byte_values_are_escaped() {
    let (transport, controller, mut rx) = session(SessionSettings::new(ENDPOINT));
    controller.add_subscription("Random1").await;
    controller.start().await.unwrap();

    let random = NodeId::string(5, "Random1");
    transport.publish(&random, Variant::SByte(7), None);
    transport.publish(&random, Variant::Byte(b'A'), None);

    assert_eq!(next_record(&mut rx).await.readings[0].value, NormalizedValue::String("\\u0007".into()));
    assert_eq!(next_record(&mut rx).await.readings[0].value, NormalizedValue::String("A".into()));
}

// =============================================================================
// Lifecycle Scenarios
// =============================================================================

#[tokio::test]
async fn test_stop_silences_pipeline() {
    let (transport, controller, _rx) = session(SessionSettings::new(ENDPOINT));
    controller.start().await.unwrap();
    controller.stop().await.unwrap();

    assert_eq!(controller.state(), SessionState::Disconnected);
    assert_eq!(transport.publish(&NodeId::string(5, "Random1"), Variant::Double(1.0), None), 0);
}

#[tokio::test]
async fn test_reconfigure_swaps_filters() {
    let (transport, controller, _rx) = session(SessionSettings::new(ENDPOINT));
    controller.add_subscription("5:Simulation").await;
    controller.start().await.unwrap();

    let report = controller
        .reconfigure(SessionSettings::new(ENDPOINT), Some(vec!["Speed".to_string()]))
        .await
        .unwrap();

    assert_eq!(report.registered(), 1);
    assert_eq!(transport.monitored_nodes(), vec![NodeId::numeric(2, 1001)]);
    assert_eq!(controller.subscriptions().await, vec!["Speed".to_string()]);
    assert_eq!(controller.state(), SessionState::Subscribed);
}
