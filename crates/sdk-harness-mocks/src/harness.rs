// crates/sdk-harness-mocks/src/harness.rs
// ============================================================================
// Module: Harness Wiring
// Description: Config-driven assembly of router, runner, sinks, and reports.
// Purpose: Run a contract suite end to end from one `HarnessConfig`.
// Dependencies: sdk-harness-config, sdk-harness-core
// ============================================================================

//! ## Overview
//! [`Harness`] owns the mock router for a run. [`Harness::run_suite`] runs a
//! root scope with the configured filters, mirrors scope events to tracing
//! and the optional JSON-lines file, then writes the configured reports.

use std::fs;
use std::sync::Arc;

use sdk_harness_config::ConfigError;
use sdk_harness_config::HarnessConfig;
use sdk_harness_config::TimeoutConfig;
use sdk_harness_core::CapabilitySet;
use sdk_harness_core::FanoutScopeSink;
use sdk_harness_core::JsonLinesScopeSink;
use sdk_harness_core::ReportError;
use sdk_harness_core::ReportWriter;
use sdk_harness_core::ScopeEventSink;
use sdk_harness_core::ScopeResult;
use sdk_harness_core::TestReport;
use sdk_harness_core::TestRunner;
use sdk_harness_core::TestScope;
use sdk_harness_core::TracingScopeSink;
use sdk_harness_core::telemetry::init_tracing;
use thiserror::Error;

use crate::router::MockEndpointRouter;
use crate::router::RouterError;

/// Harness assembly errors.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Router failed to start.
    #[error(transparent)]
    Router(#[from] RouterError),
    /// Scope event file could not be opened.
    #[error("scope event sink error: {0}")]
    Sink(String),
    /// Report could not be written.
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// A configured harness run.
pub struct Harness {
    /// Validated configuration.
    config: HarnessConfig,
    /// Capabilities of the SDK under test.
    capabilities: CapabilitySet,
    /// Router shared by every fixture of the run.
    router: MockEndpointRouter,
}

impl Harness {
    /// Validates `config`, installs tracing, and starts the router.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the config is invalid or the router
    /// cannot bind.
    pub fn start(config: HarnessConfig, capabilities: CapabilitySet) -> Result<Self, HarnessError> {
        config.validate()?;
        init_tracing(&config.logging.filter);
        let router = MockEndpointRouter::start(&config.server)?;
        tracing::info!(
            capabilities = capabilities.len(),
            local_addr = %router.local_addr(),
            "harness started"
        );
        Ok(Self {
            config,
            capabilities,
            router,
        })
    }

    /// Router for creating fixtures.
    #[must_use]
    pub const fn router(&self) -> &MockEndpointRouter {
        &self.router
    }

    /// Capabilities of the SDK under test.
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Blocking-wait bounds.
    #[must_use]
    pub const fn timeouts(&self) -> &TimeoutConfig {
        &self.config.timeouts
    }

    /// Runs a suite as the root scope and writes the configured reports.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the filters, event file, or reports fail.
    /// Scenario failures are reported in the returned [`TestReport`].
    pub fn run_suite<F>(&self, name: &str, body: F) -> Result<TestReport, HarnessError>
    where
        F: FnOnce(&TestScope, &Self) -> ScopeResult,
    {
        let filter = self.config.filters.to_filter()?;
        let runner = TestRunner::new(self.capabilities.clone()).with_filter(filter).with_sink(self.scope_sink()?);
        let report = runner.run(name, |scope| body(scope, self));

        let mut writer = ReportWriter::new();
        if let Some(path) = &self.config.report.json_path {
            writer = writer.with_json(path);
        }
        if let Some(path) = &self.config.report.markdown_path {
            writer = writer.with_markdown(path);
        }
        let written = writer.write(&report)?;
        let counts = report.counts();
        tracing::info!(
            suite = name,
            status = report.status().label(),
            passed = counts.passed,
            failed = counts.failed,
            skipped = counts.skipped,
            non_critical_failed = counts.non_critical_failed,
            reports = written.len(),
            "suite finished"
        );
        Ok(report)
    }

    /// Builds the scope event sink from the report config.
    fn scope_sink(&self) -> Result<Arc<dyn ScopeEventSink>, HarnessError> {
        let Some(path) = &self.config.report.events_path else {
            return Ok(Arc::new(TracingScopeSink));
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| HarnessError::Sink(format!("{}: {err}", parent.display())))?;
        }
        let file = JsonLinesScopeSink::new(path).map_err(|err| HarnessError::Sink(format!("{}: {err}", path.display())))?;
        let sinks: Vec<Arc<dyn ScopeEventSink>> = vec![Arc::new(TracingScopeSink), Arc::new(file)];
        Ok(Arc::new(FanoutScopeSink::new(sinks)))
    }
}
