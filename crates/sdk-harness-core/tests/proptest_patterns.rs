// crates/sdk-harness-core/tests/proptest_patterns.rs
// ============================================================================
// Module: Test-ID Pattern Property Tests
// Description: Property tests for run/skip pattern matching.
// Purpose: Check select/cover relationships across arbitrary scope paths.
// ============================================================================

//! Property-based tests for test-ID pattern invariants.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use sdk_harness_core::TestFilter;
use sdk_harness_core::TestId;
use sdk_harness_core::TestIdPattern;

fn path_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,6}", 1 .. 6)
}

proptest! {
    #[test]
    fn literal_pattern_covers_itself_and_descendants(path in path_strategy(), suffix in path_strategy()) {
        let pattern: TestIdPattern = path.join("/").parse().unwrap();
        let id: TestId = path.iter().cloned().collect();
        let descendant: TestId = path.iter().chain(suffix.iter()).cloned().collect();
        prop_assert!(pattern.covers(&id));
        prop_assert!(pattern.covers(&descendant));
        prop_assert!(pattern.selects(&descendant));
    }

    #[test]
    fn pattern_selects_every_ancestor(path in path_strategy()) {
        let pattern: TestIdPattern = path.join("/").parse().unwrap();
        for len in 1 ..= path.len() {
            let ancestor: TestId = path[.. len].iter().cloned().collect();
            prop_assert!(pattern.selects(&ancestor));
            prop_assert_eq!(pattern.covers(&ancestor), len == path.len());
        }
    }

    #[test]
    fn wildcards_match_any_segment(path in path_strategy()) {
        let wildcard = vec!["*"; path.len()].join("/");
        let pattern: TestIdPattern = wildcard.parse().unwrap();
        let id: TestId = path.iter().cloned().collect();
        prop_assert!(pattern.covers(&id));
    }

    #[test]
    fn skip_wins_over_run(path in path_strategy()) {
        let raw = path.join("/");
        let filter = TestFilter::from_patterns([raw.as_str()], [raw.as_str()]).unwrap();
        let id: TestId = path.iter().cloned().collect();
        prop_assert!(filter.excludes(&id));
    }

    #[test]
    fn differing_first_segment_is_not_selected(path in path_strategy()) {
        let pattern: TestIdPattern = path.join("/").parse().unwrap();
        let other: TestId = std::iter::once(format!("{}x", path[0])).collect();
        prop_assert!(!pattern.selects(&other));
        let filter = TestFilter::from_patterns([path.join("/")], Vec::<String>::new()).unwrap();
        prop_assert!(filter.excludes(&other));
    }
}
