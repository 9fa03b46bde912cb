// crates/sdk-harness-core/src/scope/status.rs
// ============================================================================
// Module: Scope Status
// Description: Scope outcomes and worst-of aggregation.
// Purpose: Roll child outcomes up without letting skips mask failures.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

/// Outcome of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStatus {
    /// Every assertion held.
    Passed,
    /// At least one critical failure was recorded.
    Failed,
    /// The scope did not run to completion by choice.
    Skipped,
    /// Only downgraded failures were recorded.
    NonCriticalFailed,
}

impl ScopeStatus {
    /// Returns a stable label for reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::NonCriticalFailed => "non_critical_failed",
        }
    }

    /// Severity rank used for worst-of aggregation.
    const fn rank(self) -> u8 {
        match self {
            Self::Skipped => 0,
            Self::Passed => 1,
            Self::NonCriticalFailed => 2,
            Self::Failed => 3,
        }
    }

    /// Returns true for the critical failure status.
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Combines a scope's own status with its children's statuses.
    ///
    /// A skipped scope stays skipped unless a child failed. A child skip
    /// counts as passed for a scope that ran.
    #[must_use]
    pub fn aggregate<I>(own: Self, children: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let worst_child = children.into_iter().max_by_key(|status| status.rank());
        match (own, worst_child) {
            (Self::Skipped, Some(child)) if child.rank() > Self::Passed.rank() => child,
            (Self::Skipped, _) => Self::Skipped,
            (own, Some(child)) if child.rank() > own.rank() => child,
            (own, _) => own,
        }
    }
}
