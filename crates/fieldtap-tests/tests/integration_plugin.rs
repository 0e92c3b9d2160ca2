// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Plugin facade tests over the simulation address space.

use std::sync::Arc;

use fieldtap_bin::output::encode_record;
use fieldtap_bin::{BinError, Simulation, SouthPlugin};
use fieldtap_config::PluginConfig;
use fieldtap_opcua::{IngestSink, MemoryTransport, NormalizedValue, SessionState};
use fieldtap_tests::prelude::*;

async fn simulation_plugin(config: PluginConfig) -> (SouthPlugin<MemoryTransport>, Simulation, Arc<RecordingSink>) {
    let transport = MemoryTransport::new(Simulation::address_space());
    let sink = Arc::new(RecordingSink::new());
    let ingest: Arc<dyn IngestSink> = sink.clone();
    let simulation = Simulation::new(transport.clone());
    let plugin = SouthPlugin::init(config, transport, ingest).await.unwrap();
    (plugin, simulation, sink)
}

#[tokio::test]
async fn test_default_config_streams_simulation() {
    init_test_logging();
    let (plugin, mut simulation, sink) = simulation_plugin(PluginConfig::default()).await;

    let report = plugin.start().await.unwrap();
    assert_eq!(report.registered(), 5);

    assert_eq!(simulation.step(), 5);
    assert_eq!(sink.len(), 5);

    let counter = sink
        .records()
        .into_iter()
        .find(|r| r.readings[0].name == "Counter1")
        .unwrap();
    assert_eq!(counter.asset, "opcuans=5;s=Counter1");
    assert_eq!(counter.readings[0].value, NormalizedValue::Integer(0));

    let line = encode_record(&counter).unwrap();
    let json: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(json["asset"], "opcuans=5;s=Counter1");
    assert_eq!(json["readings"]["Counter1"], 0);

    let stats = plugin.stats();
    assert_eq!(stats.received, 5);
    assert_eq!(stats.emitted, 5);
}

#[tokio::test]
async fn test_reconfigure_switches_to_browse_names() {
    let (plugin, mut simulation, sink) = simulation_plugin(PluginConfig::default()).await;
    plugin.start().await.unwrap();

    let category = r#"{
        "asset": { "value": "sim/" },
        "url": { "value": "opc.tcp://localhost:4840" },
        "subscription": { "value": "{\"subscriptions\":[\"Sawtooth1\"]}" },
        "subscribeById": { "value": "false" },
        "assetNameType": { "value": "Subscription Path with BrowseName" }
    }"#;
    let report = plugin.reconfigure(category).await.unwrap();

    assert_eq!(report.registered(), 1);
    assert_eq!(plugin.state(), SessionState::Subscribed);
    assert_eq!(plugin.config().asset, "sim/");

    sink.clear();
    assert_eq!(simulation.step(), 1);
    assert_eq!(sink.assets(), vec!["sim/Simulation/Sawtooth1".to_string()]);
}

#[tokio::test]
async fn test_shutdown_stops_delivery() {
    let (plugin, mut simulation, sink) = simulation_plugin(PluginConfig::default()).await;
    plugin.start().await.unwrap();
    plugin.shutdown().await.unwrap();

    assert_eq!(simulation.step(), 0);
    assert!(sink.is_empty());
    assert_eq!(plugin.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_category_without_url_value_is_rejected() {
    let transport = MemoryTransport::new(Simulation::address_space());
    let sink: Arc<dyn IngestSink> = Arc::new(RecordingSink::new());

    let result = SouthPlugin::init_from_category(r#"{ "url": { "value": "" } }"#, transport, sink).await;

    assert!(matches!(result, Err(BinError::Configuration(_))));
}
