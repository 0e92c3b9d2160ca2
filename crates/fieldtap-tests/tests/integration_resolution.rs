// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Resolution and delivery tests over the plant address space.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fieldtap-tests --test integration_resolution
//! ```

use fieldtap_opcua::{
    AssetNameType, DecoderOptions, IntegerOverflow, NormalizedValue, OpcUaError, SessionError,
    SessionState, UtcTimestamp, Variant, ZeroSubscriptionPolicy,
};
use fieldtap_tests::prelude::*;

// =============================================================================
// Walk Scenarios
// =============================================================================

#[tokio::test]
async fn test_same_key_registers_once() {
    init_test_logging();
    let harness = SessionHarness::new(SpaceFixtures::plant(), settings(), &[]).await;

    let report = harness.controller.start().await.unwrap();

    assert_eq!(report.registered(), 5);
    assert!(harness.is_monitored(&SpaceFixtures::line1_speed()));
    assert!(!harness.is_monitored(&SpaceFixtures::line2_speed()));
    assert!(harness.is_monitored(&SpaceFixtures::line2_load()));

    let speed_keys = report
        .registrations
        .iter()
        .filter(|r| r.key == "2:Motor:Speed")
        .count();
    assert_eq!(speed_keys, 1);
}

#[tokio::test]
async fn test_walk_depth_is_bounded() {
    let mut bounded = settings();
    bounded.max_walk_depth = 2;
    let harness = SessionHarness::new(SpaceFixtures::plant(), bounded, &[]).await;

    let report = harness.controller.start().await.unwrap();

    assert_eq!(report.registered(), 2);
    assert!(harness.is_monitored(&SpaceFixtures::line1_status()));
    assert!(harness.is_monitored(&SpaceFixtures::flow()));
    assert!(!harness.is_monitored(&SpaceFixtures::line1_speed()));
}

#[tokio::test]
async fn test_empty_objects_falls_back_to_root() {
    let harness = SessionHarness::new(SpaceFixtures::root_only(), settings(), &[]).await;

    let report = harness.controller.start().await.unwrap();

    assert_eq!(report.registered(), 1);
    assert_eq!(harness.transport.monitored_nodes(), vec![SpaceFixtures::root_variable()]);
}

#[tokio::test]
async fn test_qualified_filter_selects_one_line() {
    let policy = settings().with_asset_name_type(AssetNameType::SubscriptionPathWithBrowseName);
    let harness = SessionHarness::new(SpaceFixtures::plant(), policy, &["2:Line1"]).await;

    let report = harness.controller.start().await.unwrap();

    assert_eq!(report.registered(), 3);
    assert!(!harness.is_monitored(&SpaceFixtures::line2_load()));

    harness.publish(&SpaceFixtures::line1_current(), Variant::Float(1.5));
    let record = harness.sink.last().unwrap();
    assert_eq!(record.asset, "Plant/Line1/Motor/Current");
    assert_eq!(record.readings[0].name, "Current");
    assert_eq!(record.readings[0].value, NormalizedValue::Float(1.5));
}

#[tokio::test]
async fn test_malformed_filter_is_removed() {
    let harness = SessionHarness::new(SpaceFixtures::plant(), settings(), &["x:Speed", "Flow"]).await;

    let report = harness.controller.start().await.unwrap();

    assert_eq!(report.rejected_filters, vec!["x:Speed".to_string()]);
    assert_eq!(harness.transport.monitored_nodes(), vec![SpaceFixtures::flow()]);
    assert_eq!(harness.controller.subscriptions().await, vec!["Flow".to_string()]);
}

#[tokio::test]
async fn test_failed_item_is_reported_and_skipped() {
    let harness = SessionHarness::new(SpaceFixtures::plant(), settings(), &[]).await;
    harness.transport.fail_monitored_item(SpaceFixtures::line1_status());

    let report = harness.controller.start().await.unwrap();

    assert_eq!(report.registered(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].node_id, "ns=2;s=Line1.Status");
    assert!(harness.controller.registry().lookup(&SpaceFixtures::line1_status()).is_none());
    assert_eq!(harness.publish(&SpaceFixtures::line1_status(), Variant::Boolean(true)), 0);
}

// =============================================================================
// Zero-Registration Policy
// =============================================================================

#[tokio::test]
async fn test_no_match_keeps_running_by_default() {
    let harness = SessionHarness::new(SpaceFixtures::plant(), settings(), &["Pressure"]).await;

    let report = harness.controller.start().await.unwrap();

    assert_eq!(report.registered(), 0);
    assert_eq!(harness.controller.state(), SessionState::Subscribed);
}

#[tokio::test]
async fn test_no_match_fails_under_fail_policy() {
    let strict = settings().with_zero_subscription_policy(ZeroSubscriptionPolicy::Fail);
    let harness = SessionHarness::new(SpaceFixtures::plant(), strict, &["Pressure"]).await;

    let result = harness.controller.start().await;

    assert!(matches!(result, Err(OpcUaError::Session(SessionError::NoSubscriptions))));
    assert_eq!(harness.controller.state(), SessionState::Disconnected);
    assert_eq!(harness.transport.subscription_count(), 0);
}

// =============================================================================
// Identity References
// =============================================================================

#[tokio::test]
async fn test_identity_to_object_walks_subtree() {
    let harness = SessionHarness::new(SpaceFixtures::plant(), settings_by_id(), &["ns=3;i=1"]).await;

    let report = harness.controller.start().await.unwrap();

    assert_eq!(report.registered(), 1);
    assert_eq!(harness.transport.monitored_nodes(), vec![SpaceFixtures::flow()]);
}

#[tokio::test]
async fn test_unknown_identity_is_skipped() {
    let harness = SessionHarness::new(
        SpaceFixtures::plant(),
        settings_by_id(),
        &["ns=9;s=Missing", "Speed", "ns=2;s=Line2.Motor.Load"],
    )
    .await;

    let report = harness.controller.start().await.unwrap();

    assert_eq!(report.registered(), 1);
    assert_eq!(harness.transport.monitored_nodes(), vec![SpaceFixtures::line2_load()]);
    assert_eq!(harness.controller.subscriptions().await.len(), 3);
}

#[tokio::test]
async fn test_repeated_identity_registers_once() {
    let harness = SessionHarness::new(
        SpaceFixtures::plant(),
        settings_by_id(),
        &["ns=2;s=Line1.Motor.Speed", "ns=2;s=Line1.Motor.Speed"],
    )
    .await;

    let report = harness.controller.start().await.unwrap();

    assert_eq!(report.registered(), 1);
    assert_eq!(harness.transport.monitored_nodes().len(), 1);
}

#[tokio::test]
async fn test_parent_lookup_failure_still_registers() {
    let harness =
        SessionHarness::new(SpaceFixtures::plant(), settings_by_id(), &["ns=2;s=Line1.Motor.Speed"]).await;
    harness.transport.fail_parent_lookup(SpaceFixtures::line1_speed());

    let report = harness.controller.start().await.unwrap();

    assert_eq!(report.registered(), 1);
    assert_eq!(report.registrations[0].key, "2:_:Speed");

    harness.publish(&SpaceFixtures::line1_speed(), Variant::Double(1480.0));
    let record = harness.sink.last().unwrap();
    assert_eq!(record.asset, "ns=2;s=Line1.Motor.Speed");
    assert_eq!(record.readings[0].name, "Speed");
}

// =============================================================================
// Naming And Delivery
// =============================================================================

#[tokio::test]
async fn test_full_path_naming_with_prefix() {
    let named = settings()
        .with_asset_name("plant/")
        .with_asset_name_type(AssetNameType::FullPathWithBrowseName);
    let harness = SessionHarness::new(SpaceFixtures::plant(), named, &["Load"]).await;
    harness.controller.start().await.unwrap();

    harness.publish(&SpaceFixtures::line2_load(), Variant::UInt16(73));

    assert_eq!(harness.sink.assets(), vec!["plant/Plant/Line2/Motor/Load".to_string()]);
    assert_eq!(harness.sink.last_value(), Some(NormalizedValue::Integer(73)));
}

#[tokio::test]
async fn test_node_id_naming_by_default() {
    let harness = SessionHarness::new(SpaceFixtures::plant(), settings().with_asset_name("opcua/"), &["Flow"]).await;
    harness.controller.start().await.unwrap();

    harness.publish_at(&SpaceFixtures::flow(), Variant::Double(12.5), SOURCE_TICKS);

    let record = harness.sink.last().unwrap();
    assert_eq!(record.asset, "opcua/ns=3;i=1001");
    assert_eq!(record.readings[0].name, "Flow");
    assert_eq!(record.timestamp, UtcTimestamp::new(SOURCE_UNIX_SECS, SOURCE_MICROS));
}

#[tokio::test]
async fn test_missing_source_timestamp_uses_local_clock() {
    let harness = SessionHarness::new(SpaceFixtures::plant(), settings(), &["Flow"]).await;
    harness.controller.start().await.unwrap();

    let before = UtcTimestamp::now();
    harness.publish(&SpaceFixtures::flow(), Variant::Int32(3));
    let after = UtcTimestamp::now();

    let stamped = harness.sink.last().unwrap().timestamp;
    assert!(before <= stamped && stamped <= after);
}

#[tokio::test]
async fn test_unsigned_overflow_policies() {
    let cases = [
        (IntegerOverflow::Wrap, Some(NormalizedValue::Integer(-1))),
        (IntegerOverflow::Saturate, Some(NormalizedValue::Integer(i64::MAX))),
        (IntegerOverflow::Drop, None),
    ];

    for (policy, expected) in cases {
        let decoding = settings().with_decoder(DecoderOptions {
            integer_overflow: policy,
        });
        let harness = SessionHarness::new(SpaceFixtures::plant(), decoding, &["Flow"]).await;
        harness.controller.start().await.unwrap();

        harness.publish(&SpaceFixtures::flow(), Variant::UInt64(u64::MAX));

        assert_eq!(harness.sink.last_value(), expected, "policy {:?}", policy);
        assert_eq!(harness.controller.stats().dropped, u64::from(expected.is_none()));
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_second_start_is_rejected() {
    let harness = SessionHarness::new(SpaceFixtures::plant(), settings(), &["Flow"]).await;
    harness.controller.start().await.unwrap();

    let result = harness.controller.start().await;

    assert!(matches!(
        result,
        Err(OpcUaError::Session(SessionError::AlreadyStarted { .. }))
    ));
    assert_eq!(harness.transport.connect_count(), 1);
}

#[tokio::test]
async fn test_restart_resubscribes() {
    let harness = SessionHarness::new(SpaceFixtures::plant(), settings(), &["2:Line1"]).await;
    harness.controller.start().await.unwrap();

    let report = harness.controller.restart().await.unwrap();

    assert_eq!(report.registered(), 3);
    assert_eq!(harness.transport.connect_count(), 2);
    assert_eq!(harness.transport.subscription_count(), 1);
    assert_eq!(harness.transport.monitored_nodes().len(), 3);
}

#[tokio::test]
async fn test_values_after_stop_are_not_delivered() {
    let harness = SessionHarness::new(SpaceFixtures::plant(), settings(), &[]).await;
    harness.controller.start().await.unwrap();
    harness.publish(&SpaceFixtures::flow(), Variant::Double(1.0));
    harness.controller.stop().await.unwrap();

    assert_eq!(harness.publish(&SpaceFixtures::flow(), Variant::Double(2.0)), 0);
    assert_eq!(harness.sink.len(), 1);
    assert!(harness.controller.registry().is_empty());
}
