// crates/sdk-harness-core/src/lib.rs
// ============================================================================
// Module: SDK Harness Core
// Description: Capability gating and the hierarchical test-scope runtime.
// Purpose: Organize parameterized SDK contract checks and report outcomes.
// Dependencies: serde, serde_jcs, thiserror, tracing
// ============================================================================

//! ## Overview
//! The harness core owns everything that is independent of the wire
//! protocols: the immutable [`CapabilitySet`] declared by the SDK under test,
//! the [`TestScope`] tree executed by [`TestRunner`], the failure taxonomy,
//! timeout-bounded polling helpers, and the report model that records
//! pass/fail/skip/non-critical outcomes.
//!
//! Mock backend services live in `sdk-harness-mocks` and attach themselves to
//! scopes through [`TestScope::defer`] and [`FailureHandle`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod capabilities;
pub mod failure;
pub mod poll;
pub mod report;
pub mod scope;
pub mod sink;
pub mod telemetry;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use capabilities::CapabilitySet;
pub use failure::Failure;
pub use failure::FailureKind;
pub use poll::poll_for_value;
pub use poll::poll_until;
pub use report::ReportCounts;
pub use report::ReportError;
pub use report::ReportWriter;
pub use report::ScopeReport;
pub use report::render_markdown;
pub use report::TestReport;
pub use scope::FailureHandle;
pub use scope::PatternError;
pub use scope::ScopeExit;
pub use scope::ScopeResult;
pub use scope::ScopeStatus;
pub use scope::TestFilter;
pub use scope::TestId;
pub use scope::TestIdPattern;
pub use scope::TestRunner;
pub use scope::TestScope;
pub use sink::FanoutScopeSink;
pub use sink::JsonLinesScopeSink;
pub use sink::NoopScopeSink;
pub use sink::ScopeEvent;
pub use sink::ScopeEventSink;
pub use sink::TracingScopeSink;
