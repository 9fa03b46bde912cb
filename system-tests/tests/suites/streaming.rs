// system-tests/tests/suites/streaming.rs
// ============================================================================
// Module: Streaming Scenarios
// Description: Versioned stream updates observed through the reference SDK.
// Purpose: Ensure enqueue-order delivery makes version rules testable.
// Dependencies: system-tests helpers, sdk-harness-mocks
// ============================================================================

//! ## Overview
//! The streaming mock delivers frames in push order, so an SDK applying an
//! update iff its version is newer ends in a deterministic state.

use std::time::Duration;

use sdk_harness_core::ScopeResult;
use sdk_harness_core::TestScope;
use sdk_harness_mocks::ApplicationTags;
use sdk_harness_mocks::DataKind;
use sdk_harness_mocks::FlagBuilder;
use sdk_harness_mocks::Harness;
use sdk_harness_mocks::PollingService;
use sdk_harness_mocks::SdkData;
use sdk_harness_mocks::SdkKind;
use sdk_harness_mocks::ServerSdkData;
use sdk_harness_mocks::StreamingService;
use serde_json::Value;
use serde_json::json;
use system_tests::FlagStore;
use system_tests::PollingClient;
use system_tests::StreamClient;

use crate::helpers::harness::POLL_INTERVAL;
use crate::helpers::harness::assert_passed;
use crate::helpers::harness::run_scenario;
use crate::helpers::harness::sdk_config;

/// Bound for a pushed update to become visible.
const UPDATE_VISIBLE: Duration = Duration::from_secs(1);

fn single_flag(version: u64, value: &str) -> SdkData {
    SdkData::Server(ServerSdkData::new().with_flag(FlagBuilder::single_value("f", version, json!(value))))
}

/// Connects the reference SDK and waits for the initial snapshot.
fn connect(scope: &TestScope, harness: &Harness, stream: &StreamingService) -> ScopeResult<StreamClient> {
    let client = StreamClient::connect(stream.base_url(), &sdk_config(), FlagStore::new())
        .map_err(|err| scope.fail_now(format!("stream connect: {err}")))?;
    stream.require_connection(scope, harness.timeouts().connection())?;
    let store = client.store().clone();
    scope.require_eventually(harness.timeouts().connection(), POLL_INTERVAL, "initial snapshot", || {
        store.is_initialized()
    })?;
    Ok(client)
}

/// Waits until the SDK has consumed `count` stream events.
fn await_events(scope: &TestScope, client: &StreamClient, count: usize) -> ScopeResult {
    scope.require_eventually(UPDATE_VISIBLE, POLL_INTERVAL, "stream events consumed", || client.events_seen() >= count)
}

#[test]
fn newer_update_applies_and_stale_update_is_ignored() {
    let report = run_scenario("stream_versioning", &[], |scope, harness| {
        let stream = StreamingService::start(scope, harness.router(), SdkKind::ServerSide, single_flag(1, "a"))?;
        let client = connect(scope, harness, &stream)?;
        let store = client.store().clone();
        scope.require_eq(&Some(json!("a")), &store.evaluate("f"), "initial evaluation")?;

        stream
            .push_update(DataKind::Flags, "f", &FlagBuilder::single_value("f", 2, json!("b")))
            .map_err(|err| scope.fail_now(err.to_string()))?;
        scope.require_eventually(UPDATE_VISIBLE, POLL_INTERVAL, "evaluation becomes b", || {
            store.evaluate("f") == Some(json!("b"))
        })?;

        stream
            .push_update(DataKind::Flags, "f", &FlagBuilder::single_value("f", 1, json!("a")))
            .map_err(|err| scope.fail_now(err.to_string()))?;
        await_events(scope, &client, 3)?;
        scope.require_eq(&Some(json!("b")), &store.evaluate("f"), "evaluation after stale update")
    });
    assert_passed(&report);
}

#[test]
fn delete_wins_over_older_patch() {
    let report = run_scenario("stream_delete", &[], |scope, harness| {
        let stream = StreamingService::start(scope, harness.router(), SdkKind::ServerSide, single_flag(1, "a"))?;
        let client = connect(scope, harness, &stream)?;
        let store = client.store().clone();

        stream.push_delete(DataKind::Flags, "f", 3).map_err(|err| scope.fail_now(err.to_string()))?;
        stream
            .push_update(DataKind::Flags, "f", &FlagBuilder::single_value("f", 2, json!("c")))
            .map_err(|err| scope.fail_now(err.to_string()))?;
        await_events(scope, &client, 3)?;
        scope.require_eq(&None::<Value>, &store.evaluate("f"), "evaluation after delete")
    });
    assert_passed(&report);
}

#[test]
fn reconnect_receives_replaced_snapshot() {
    let report = run_scenario("stream_reinit", &[], |scope, harness| {
        let stream = StreamingService::start(scope, harness.router(), SdkKind::ServerSide, single_flag(1, "a"))?;
        let first = connect(scope, harness, &stream)?;
        stream.set_initial_data(single_flag(5, "z")).map_err(|err| scope.fail_now(err.to_string()))?;
        scope.require_eq(&Some(json!("a")), &first.store().evaluate("f"), "open stream keeps old snapshot")?;

        let second = connect(scope, harness, &stream)?;
        scope.require_eq(&Some(json!("z")), &second.store().evaluate("f"), "new stream gets new snapshot")?;
        scope.require_eq(&2, &stream.open_connections(), "open connections")
    });
    assert_passed(&report);
}

#[test]
fn polling_serves_the_stream_snapshot() {
    let report = run_scenario("polling_shared_source", &[], |scope, harness| {
        let stream = StreamingService::start(scope, harness.router(), SdkKind::ServerSide, single_flag(1, "a"))?;
        let polling = PollingService::start_with_source(scope, harness.router(), SdkKind::ServerSide, stream.data_source())?;
        let poller = PollingClient::new(polling.base_url(), sdk_config()).map_err(|err| scope.fail_now(err.to_string()))?;
        let store = FlagStore::new();

        poller.poll(&store).map_err(|err| scope.fail_now(err.to_string()))?;
        scope.require_eq(&Some(json!("a")), &store.evaluate("f"), "first poll")?;
        stream.set_initial_data(single_flag(2, "b")).map_err(|err| scope.fail_now(err.to_string()))?;
        poller.poll(&store).map_err(|err| scope.fail_now(err.to_string()))?;
        scope.require_eq(&Some(json!("b")), &store.evaluate("f"), "second poll")?;
        scope.require_eq(&2, &polling.endpoint().take_requests().len(), "poll requests")
    });
    assert_passed(&report);
}

#[test]
fn stream_request_carries_expected_headers() {
    let report = run_scenario("stream_headers", &[], |scope, harness| {
        let tags = ApplicationTags {
            application_id: Some("system-tests".to_string()),
            application_version: Some("bad version".to_string()),
        };
        let stream = StreamingService::start(scope, harness.router(), SdkKind::ServerSide, single_flag(1, "a"))?;
        let config = sdk_config().with_tags_header(tags.expected_tags_header());
        let _client = StreamClient::connect(stream.base_url(), &config, FlagStore::new())
            .map_err(|err| scope.fail_now(format!("stream connect: {err}")))?;
        let request = stream.require_connection(scope, harness.timeouts().connection())?;
        scope.require_eq(&Some(config.sdk_key.as_str()), &request.header("authorization"), "authorization")?;
        tags.require_tags_header(scope, &request)
    });
    assert_passed(&report);
}
