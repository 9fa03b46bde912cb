// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for SDK harness system-tests.
// Purpose: Provide harness startup, artifact roots, and SDK fixtures.
// Dependencies: system-tests, sdk-harness-mocks, sdk-harness-config
// ============================================================================

//! ## Overview
//! Shared helpers for SDK harness system-tests.
//! Invariants:
//! - Every scenario runs against its own harness and mock endpoints.
//! - Reports for each scenario land under its own artifact root.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod artifacts;
pub mod harness;
