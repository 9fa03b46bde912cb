// crates/sdk-harness-core/src/failure.rs
// ============================================================================
// Module: Failure Taxonomy
// Description: Classified assertion failures recorded against scopes.
// Purpose: Distinguish protocol violations, timeouts, and mismatches.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every failure recorded in a scope carries a [`FailureKind`]. Injected
//! backend errors configured by a scenario are expected behavior and are
//! never represented here.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Failure classification.
///
/// # Invariants
/// - Variants are stable for report labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An unconfigured or unexpected mock operation was invoked.
    ProtocolViolation,
    /// An expected interaction did not occur within its bound.
    Timeout,
    /// Captured data did not match the expectation.
    AssertionMismatch,
    /// Scenario or cleanup code panicked.
    Panic,
}

impl FailureKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProtocolViolation => "protocol_violation",
            Self::Timeout => "timeout",
            Self::AssertionMismatch => "assertion_mismatch",
            Self::Panic => "panic",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Diagnostic message.
    pub message: String,
    /// Reason from `non_critical` when the failure was downgraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_critical: Option<String>,
}

impl Failure {
    /// Returns true when the failure was downgraded to non-fatal.
    #[must_use]
    pub const fn is_non_critical(&self) -> bool {
        self.non_critical.is_some()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.non_critical {
            Some(reason) => write!(f, "{}: {} (non-critical: {reason})", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}
