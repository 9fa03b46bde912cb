// crates/sdk-harness-core/src/scope/mod.rs
// ============================================================================
// Module: Test Scope Tree
// Description: Scope identity, status aggregation, and the scope executor.
// Purpose: Organize capability-gated checks into a reportable tree.
// Dependencies: sdk-harness-core
// ============================================================================

//! ## Overview
//! Scenario code receives a [`TestScope`] and nests further scopes with
//! [`TestScope::run`]. Capability gates, cleanup registration, and failure
//! recording all happen through the scope handle.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod id;
mod runtime;
mod status;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use id::PatternError;
pub use id::TestFilter;
pub use id::TestId;
pub use id::TestIdPattern;
pub use runtime::FailureHandle;
pub use runtime::ScopeExit;
pub use runtime::ScopeResult;
pub use runtime::TestRunner;
pub use runtime::TestScope;
pub use status::ScopeStatus;
