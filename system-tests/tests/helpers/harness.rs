// system-tests/tests/helpers/harness.rs
// ============================================================================
// Module: Scenario Harness
// Description: Helpers for running one scenario against fresh mocks.
// Purpose: Provide deterministic harness startup and report placement.
// Dependencies: sdk-harness-config, sdk-harness-core, sdk-harness-mocks
// ============================================================================

use std::time::Duration;

use sdk_harness_config::HarnessConfig;
use sdk_harness_core::CapabilitySet;
use sdk_harness_core::ScopeResult;
use sdk_harness_core::ScopeStatus;
use sdk_harness_core::TestReport;
use sdk_harness_core::TestScope;
use sdk_harness_core::telemetry::init_test_tracing;
use sdk_harness_mocks::Harness;
use system_tests::SdkConfig;

use super::artifacts::TestArtifacts;

/// SDK key configured on the reference SDK.
pub const SDK_KEY: &str = "sdk-system-test-key";

/// Poll interval for eventually-consistent SDK state.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `body` as a suite on a fresh harness and writes its artifacts.
pub fn run_scenario<F>(test_name: &str, capabilities: &[&str], body: F) -> TestReport
where
    F: FnOnce(&TestScope, &Harness) -> ScopeResult,
{
    init_test_tracing();
    let artifacts = TestArtifacts::new(test_name).expect("artifact root");
    let mut config = HarnessConfig::load(None).expect("harness config");
    config.report.json_path = Some(artifacts.root().join("report.json"));
    config.report.markdown_path = Some(artifacts.root().join("report.md"));
    config.report.events_path = Some(artifacts.root().join("scope_events.jsonl"));
    let harness = Harness::start(config, CapabilitySet::new(capabilities.iter().copied())).expect("harness start");
    let report = harness.run_suite(test_name, body).expect("suite run");
    artifacts.write_summary(&report, Vec::new()).expect("summary");
    report
}

/// Asserts the scenario passed, printing its report otherwise.
pub fn assert_passed(report: &TestReport) {
    assert_eq!(report.status(), ScopeStatus::Passed, "{}", report.render_text());
}

/// Reference SDK configuration used by scenarios.
pub fn sdk_config() -> SdkConfig {
    SdkConfig::new(SDK_KEY)
}
