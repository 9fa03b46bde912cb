// system-tests/tests/suites/events.rs
// ============================================================================
// Module: Events Scenarios
// Description: Analytics delivery observed through the events mock.
// Purpose: Ensure decoding, payload-id uniqueness, and absence checks hold.
// Dependencies: system-tests helpers, sdk-harness-mocks
// ============================================================================

//! ## Overview
//! The reference SDK buffers events and posts one payload per flush; the
//! events mock decodes each post into exactly one queued payload.

use sdk_harness_core::ScopeStatus;
use sdk_harness_core::capabilities::capability;
use sdk_harness_mocks::EventsService;
use sdk_harness_mocks::SdkKind;
use system_tests::EventProcessor;

use crate::helpers::harness::assert_passed;
use crate::helpers::harness::run_scenario;
use crate::helpers::harness::sdk_config;

/// Flushes performed by the payload-id scenario.
const FLUSHES: usize = 5;

#[test]
fn gzip_batch_decodes_to_identify_events() {
    let report = run_scenario("events_gzip", &[capability::SERVER_SIDE, capability::EVENT_GZIP], |scope, harness| {
        scope.require_capability(capability::EVENT_GZIP)?;
        let events = EventsService::start(scope, harness.router(), SdkKind::ServerSide)?;
        let processor =
            EventProcessor::new(events.base_url(), sdk_config(), true).map_err(|err| scope.fail_now(err.to_string()))?;
        for key in ["a", "b", "c"] {
            processor.identify(key);
        }
        processor.flush().map_err(|err| scope.fail_now(err.to_string()))?;

        let payload = events.expect_analytics_events(scope, harness.timeouts().events())?;
        scope.require_eq(&vec!["identify"; 3], &payload.kinds(), "event kinds")?;
        scope.require_eq(&Some("4"), &payload.schema.as_deref(), "event schema header")?;
        scope.require_eq(&Some(sdk_config().sdk_key), &payload.credential, "credential")
    });
    assert_passed(&report);
}

#[test]
fn payload_ids_are_distinct_across_flushes() {
    let report = run_scenario("events_payload_ids", &[capability::SERVER_SIDE], |scope, harness| {
        let events = EventsService::start(scope, harness.router(), SdkKind::ServerSide)?;
        let processor =
            EventProcessor::new(events.base_url(), sdk_config(), false).map_err(|err| scope.fail_now(err.to_string()))?;
        let mut sent = Vec::with_capacity(FLUSHES);
        for index in 0 .. FLUSHES {
            processor.custom("ctx", &format!("event-{index}"));
            let id = processor.flush().map_err(|err| scope.fail_now(err.to_string()))?;
            sent.push(id);
        }
        for _ in 0 .. FLUSHES {
            events.expect_analytics_events(scope, harness.timeouts().events())?;
        }
        events.check_payload_ids_distinct(scope)?;
        scope.require_eq(&sent, &events.payload_ids(), "payload ids in receipt order")
    });
    assert_passed(&report);
}

#[test]
fn empty_flush_posts_nothing() {
    let report = run_scenario("events_empty_flush", &[capability::SERVER_SIDE], |scope, harness| {
        let events = EventsService::start(scope, harness.router(), SdkKind::ServerSide)?;
        let processor =
            EventProcessor::new(events.base_url(), sdk_config(), false).map_err(|err| scope.fail_now(err.to_string()))?;
        let id = processor.flush().map_err(|err| scope.fail_now(err.to_string()))?;
        scope.require_eq(&None, &id, "payload id of empty flush")?;
        events.expect_no_analytics_events(scope, harness.timeouts().no_events())
    });
    assert_passed(&report);
}

#[test]
fn absence_check_fails_when_a_payload_arrives() {
    let report = run_scenario("events_absence", &[capability::SERVER_SIDE], |scope, harness| {
        let events = EventsService::start(scope, harness.router(), SdkKind::ServerSide)?;
        let processor =
            EventProcessor::new(events.base_url(), sdk_config(), false).map_err(|err| scope.fail_now(err.to_string()))?;
        scope.run("flushed", |scope| {
            processor.identify("late");
            processor.flush().map_err(|err| scope.fail_now(err.to_string()))?;
            events.expect_no_analytics_events(scope, harness.timeouts().no_events())
        });
        Ok(())
    });
    assert_eq!(report.status(), ScopeStatus::Failed);
    let flushed = report.find("flushed").unwrap();
    assert_eq!(flushed.status, ScopeStatus::Failed);
    assert!(flushed.failures[0].message.contains("expected no analytics events, got 1 (identify)"));
}
