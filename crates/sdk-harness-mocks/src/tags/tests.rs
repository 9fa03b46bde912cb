// crates/sdk-harness-mocks/src/tags/tests.rs
// ============================================================================
// Module: Application Tags Tests
// Description: Unit tests for tag rendering and header parsing.
// Purpose: Ensure invalid values are omitted and malformed headers rejected.
// Dependencies: sdk-harness-mocks
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use super::ApplicationTags;
use super::MAX_TAG_VALUE_LENGTH;
use super::TagRejection;
use super::TagsError;
use super::parse_tags_header;
use super::validate_tag_value;

fn tags(id: Option<&str>, version: Option<&str>) -> ApplicationTags {
    ApplicationTags {
        application_id: id.map(str::to_string),
        application_version: version.map(str::to_string),
    }
}

#[test]
fn header_lists_valid_tags_sorted_by_key() {
    assert_eq!(
        tags(Some("my-app"), Some("1.0.2")).expected_tags_header().as_deref(),
        Some("application-id/my-app application-version/1.0.2")
    );
    assert_eq!(tags(None, Some("2")).expected_tags_header().as_deref(), Some("application-version/2"));
    assert_eq!(tags(None, None).expected_tags_header(), None);
}

#[test]
fn invalid_values_are_omitted() {
    assert_eq!(tags(Some("bad value"), Some("ok")).expected_tags_header().as_deref(), Some("application-version/ok"));
    let long = "x".repeat(MAX_TAG_VALUE_LENGTH + 1);
    assert_eq!(tags(Some(&long), Some("")).expected_tags_header(), None);
}

#[test]
fn value_rules_are_enforced() {
    assert_eq!(validate_tag_value(""), Err(TagRejection::Empty));
    assert_eq!(validate_tag_value("a/b"), Err(TagRejection::ContainsDisallowedChar));
    assert_eq!(validate_tag_value(&"a".repeat(MAX_TAG_VALUE_LENGTH)), Ok(()));
    assert_eq!(validate_tag_value(&"a".repeat(MAX_TAG_VALUE_LENGTH + 1)), Err(TagRejection::TooLong));
    assert_eq!(TagRejection::TooLong.to_string(), "too_long");
}

#[test]
fn parse_collects_values_per_key() {
    let parsed = parse_tags_header("application-id/a application-version/1 application-id/b").unwrap();
    assert_eq!(parsed["application-id"], vec!["a", "b"]);
    assert_eq!(parsed["application-version"], vec!["1"]);
}

#[test]
fn parse_rejects_offending_pairs() {
    assert_eq!(parse_tags_header("application-id"), Err(TagsError::MalformedPair("application-id".to_string())));
    assert_eq!(
        parse_tags_header("application-id/ok application-version/b@d"),
        Err(TagsError::InvalidPair {
            pair: "application-version/b@d".to_string(),
            reason: TagRejection::ContainsDisallowedChar,
        })
    );
}
