// system-tests/tests/suites/lifecycle.rs
// ============================================================================
// Module: Lifecycle Scenarios
// Description: Endpoint release and failure roll-up across sibling scopes.
// Purpose: Ensure a closed scope frees its routes and hides no findings.
// Dependencies: system-tests helpers, sdk-harness-mocks
// ============================================================================

//! ## Overview
//! Fixtures register cleanup on their scope, so their routes disappear when
//! the scope exits and siblings start from a clean router.

use std::cell::RefCell;
use std::time::Duration;

use sdk_harness_core::FailureKind;
use sdk_harness_core::ScopeStatus;
use sdk_harness_mocks::EventsService;
use sdk_harness_mocks::SdkData;
use sdk_harness_mocks::SdkKind;
use sdk_harness_mocks::StreamingService;
use system_tests::FlagStore;
use system_tests::StreamClient;

use crate::helpers::harness::assert_passed;
use crate::helpers::harness::run_scenario;
use crate::helpers::harness::sdk_config;

/// Short bound for expectations that are meant to time out.
const SHORT_WAIT: Duration = Duration::from_millis(50);

#[test]
fn closing_a_scope_releases_its_endpoint() {
    let first_url = RefCell::new(String::new());
    let report = run_scenario("endpoint_release", &[], |scope, harness| {
        let router = harness.router();
        scope.run("first", |scope| {
            let stream =
                StreamingService::start(scope, router, SdkKind::ServerSide, SdkData::empty(SdkKind::ServerSide))?;
            first_url.borrow_mut().push_str(stream.base_url());
            scope.require_eq(&1, &router.open_endpoints(), "open endpoints inside scope")
        });
        scope.require_eq(&0, &router.open_endpoints(), "open endpoints after scope exit")?;

        let released = StreamClient::connect(&first_url.borrow(), &sdk_config(), FlagStore::new());
        scope.require(
            matches!(released, Err(system_tests::SdkError::Status { status: 404, .. })),
            "released route answers 404",
        )?;

        scope.run("second", |scope| {
            let stream =
                StreamingService::start(scope, router, SdkKind::ServerSide, SdkData::empty(SdkKind::ServerSide))?;
            scope.require(stream.base_url() != first_url.borrow().as_str(), "sibling gets a fresh base URL")?;
            let client = StreamClient::connect(stream.base_url(), &sdk_config(), FlagStore::new())
                .map_err(|err| scope.fail_now(err.to_string()))?;
            stream.require_connection(scope, harness.timeouts().connection())?;
            drop(client);
            Ok(())
        });
        Ok(())
    });
    assert_passed(&report);
}

#[test]
fn failures_roll_up_without_aborting_siblings() {
    let report = run_scenario("failure_rollup", &[], |scope, harness| {
        let router = harness.router();
        scope.run("optional", |scope| {
            scope.non_critical("diagnostics are optional for this SDK");
            let events = EventsService::start(scope, router, SdkKind::ServerSide)?;
            events.expect_diagnostic_event(scope, SHORT_WAIT).map(|_| ())
        });
        scope.run("required", |scope| {
            let events = EventsService::start(scope, router, SdkKind::ServerSide)?;
            events.expect_analytics_events(scope, SHORT_WAIT).map(|_| ())
        });
        scope.run("after", |_| Ok(()));
        Ok(())
    });

    assert_eq!(report.status(), ScopeStatus::Failed);
    let optional = report.find("optional").unwrap();
    assert_eq!(optional.status, ScopeStatus::NonCriticalFailed);
    assert_eq!(optional.failures[0].kind, FailureKind::Timeout);
    let required = report.find("required").unwrap();
    assert_eq!(required.status, ScopeStatus::Failed);
    assert_eq!(required.failures[0].kind, FailureKind::Timeout);
    assert_eq!(report.find("after").unwrap().status, ScopeStatus::Passed);
    let counts = report.counts();
    assert_eq!((counts.passed, counts.failed, counts.non_critical_failed), (1, 1, 1));
}
