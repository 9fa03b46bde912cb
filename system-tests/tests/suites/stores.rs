// system-tests/tests/suites/stores.rs
// ============================================================================
// Module: Store Scenarios
// Description: Big-segment store calls observed through the store mock.
// Purpose: Ensure membership lookups are deduplicated per evaluation.
// Dependencies: system-tests helpers, sdk-harness-mocks
// ============================================================================

//! ## Overview
//! The big-segment mock audits every store call in arrival order, so a
//! repeated lookup for one context within an evaluation is observable.

use std::collections::BTreeMap;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use sdk_harness_core::capabilities::capability;
use sdk_harness_mocks::BigSegmentQuery;
use sdk_harness_mocks::BigSegmentStoreService;
use sdk_harness_mocks::big_segments::context_hash;
use sdk_harness_mocks::big_segments::membership_map;
use sdk_harness_mocks::big_segments::metadata_error;
use sdk_harness_mocks::big_segments::metadata_stale;
use system_tests::BigSegmentClient;
use system_tests::SdkError;
use system_tests::big_segments::hash_context_key;

use crate::helpers::harness::assert_passed;
use crate::helpers::harness::run_scenario;

#[test]
fn membership_is_queried_once_per_evaluation() {
    let report = run_scenario("big_segment_dedup", &[capability::BIG_SEGMENTS], |scope, harness| {
        scope.require_capability(capability::BIG_SEGMENTS)?;
        let store = BigSegmentStoreService::start(scope, harness.router())?;
        let hash = context_hash("ctx-1");
        scope.require_eq(&hash, &hash_context_key("ctx-1"), "context hash encoding")?;
        let memberships = BTreeMap::from([(
            hash.clone(),
            BTreeMap::from([("seg.g1".to_string(), true), ("other.g2".to_string(), false)]),
        )]);
        store.set_membership(membership_map(memberships));

        let client = BigSegmentClient::new(store.base_url()).map_err(|err| scope.fail_now(err.to_string()))?;
        let results = client
            .evaluate("ctx-1", &["seg.g1", "other.g2", "missing.g1", "seg.g1"])
            .map_err(|err| scope.fail_now(err.to_string()))?;
        scope.require_eq(&vec![Some(true), Some(false), None, Some(true)], &results, "memberships")?;

        let queried = store.expect_membership_query(scope, harness.timeouts().connection())?;
        scope.require_eq(&hash, &queried, "queried hash")?;
        scope.require_eq(&1, &store.membership_query_count(&hash), "membership lookups for one evaluation")?;
        store.expect_no_membership_query(scope, harness.timeouts().no_events())
    });
    assert_passed(&report);
}

#[test]
fn metadata_reflects_configured_staleness() {
    let report = run_scenario("big_segment_metadata", &[capability::BIG_SEGMENTS], |scope, harness| {
        let store = BigSegmentStoreService::start(scope, harness.router())?;
        let client = BigSegmentClient::new(store.base_url()).map_err(|err| scope.fail_now(err.to_string()))?;
        store.set_metadata(metadata_stale(Duration::from_secs(60)));

        let at = client.last_up_to_date().map_err(|err| scope.fail_now(err.to_string()))?;
        let at = scope.require_some(at, "last up-to-date time")?;
        let now = u64::try_from(SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis()).unwrap();
        scope.require(now.saturating_sub(at) >= 59_000, "metadata is at least a minute old")?;
        store.expect_metadata_poll(scope, harness.timeouts().connection())?;
        scope.require_eq(&vec![BigSegmentQuery::Metadata], &store.take_queries(), "audit log")
    });
    assert_passed(&report);
}

#[test]
fn injected_store_errors_reach_the_sdk() {
    let report = run_scenario("big_segment_store_error", &[capability::BIG_SEGMENTS], |scope, harness| {
        let store = BigSegmentStoreService::start(scope, harness.router())?;
        store.set_metadata(metadata_error("store unavailable"));
        let client = BigSegmentClient::new(store.base_url()).map_err(|err| scope.fail_now(err.to_string()))?;
        let result = client.last_up_to_date();
        scope.require(matches!(result, Err(SdkError::Status { status: 500, .. })), "metadata call fails with 500")?;
        store.expect_metadata_poll(scope, harness.timeouts().connection())
    });
    assert_passed(&report);
}
