// crates/sdk-harness-mocks/src/tags.rs
// ============================================================================
// Module: Application Tags
// Description: Expected rendering and strict parsing of the tags header.
// Purpose: Check the tags header an SDK sends against its configuration.
// Dependencies: thiserror, sdk-harness-core
// ============================================================================

//! ## Overview
//! SDKs send configured application metadata as one header of
//! space-delimited `key/value` pairs sorted by key. Values are limited to
//! [`MAX_TAG_VALUE_LENGTH`] characters of `[A-Za-z0-9._-]`; an SDK must omit
//! an invalid value rather than send it. The header is untrusted input and is
//! parsed fail-closed.

use std::collections::BTreeMap;
use std::fmt;

use sdk_harness_core::ScopeResult;
use sdk_harness_core::TestScope;
use thiserror::Error;

use crate::headers::TAGS_HEADER;
use crate::router::CapturedRequest;

/// Maximum allowed length of a tag value.
pub const MAX_TAG_VALUE_LENGTH: usize = 64;
/// Tag key for the application identifier.
pub const APPLICATION_ID_KEY: &str = "application-id";
/// Tag key for the application version.
pub const APPLICATION_VERSION_KEY: &str = "application-version";

/// Rejection reason for a tag key or value.
///
/// # Invariants
/// - Labels are stable for failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRejection {
    /// The value was empty.
    Empty,
    /// The value exceeded [`MAX_TAG_VALUE_LENGTH`].
    TooLong,
    /// The value contained a character outside `[A-Za-z0-9._-]`.
    ContainsDisallowedChar,
}

impl TagRejection {
    /// Returns a stable label for this rejection reason.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooLong => "too_long",
            Self::ContainsDisallowedChar => "contains_disallowed_char",
        }
    }
}

impl fmt::Display for TagRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tags header parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagsError {
    /// A pair had no `/` separator.
    #[error("malformed tag pair: {0}")]
    MalformedPair(String),
    /// A pair had an invalid key or value.
    #[error("invalid tag pair {pair}: {reason}")]
    InvalidPair {
        /// Offending pair as sent.
        pair: String,
        /// Rejection reason.
        reason: TagRejection,
    },
}

/// Validates a tag key or value.
///
/// # Errors
///
/// Returns [`TagRejection`] naming the first rule broken.
pub fn validate_tag_value(value: &str) -> Result<(), TagRejection> {
    if value.is_empty() {
        return Err(TagRejection::Empty);
    }
    if value.chars().any(|ch| !is_tag_char(ch)) {
        return Err(TagRejection::ContainsDisallowedChar);
    }
    if value.len() > MAX_TAG_VALUE_LENGTH {
        return Err(TagRejection::TooLong);
    }
    Ok(())
}

/// Returns true when the character may appear in a tag.
const fn is_tag_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-')
}

/// Application metadata configured on the SDK under test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationTags {
    /// Application identifier.
    pub application_id: Option<String>,
    /// Application version.
    pub application_version: Option<String>,
}

impl ApplicationTags {
    /// Header value a conforming SDK sends, or `None` when nothing is valid.
    #[must_use]
    pub fn expected_tags_header(&self) -> Option<String> {
        let pairs: Vec<String> = [
            (APPLICATION_ID_KEY, self.application_id.as_deref()),
            (APPLICATION_VERSION_KEY, self.application_version.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.filter(|value| validate_tag_value(value).is_ok()).map(|value| (key, value)))
        .map(|(key, value)| format!("{key}/{value}"))
        .collect();
        if pairs.is_empty() { None } else { Some(pairs.join(" ")) }
    }

    /// Fails the scope unless `request` carries exactly the expected header.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] on a mismatch.
    pub fn require_tags_header(&self, scope: &TestScope, request: &CapturedRequest) -> ScopeResult {
        let expected = self.expected_tags_header();
        let actual = request.header(TAGS_HEADER);
        if actual.is_some_and(|header| parse_tags_header(header).is_err()) {
            return Err(scope.fail_now(format!("tags header is malformed: {}", actual.unwrap_or_default())));
        }
        scope.require_eq(&expected.as_deref(), &actual, "tags header")
    }
}

/// Parses a tags header into its keys and values.
///
/// # Errors
///
/// Returns [`TagsError`] naming the first malformed or invalid pair.
pub fn parse_tags_header(header: &str) -> Result<BTreeMap<String, Vec<String>>, TagsError> {
    let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in header.split(' ').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('/').ok_or_else(|| TagsError::MalformedPair(pair.to_string()))?;
        for part in [key, value] {
            validate_tag_value(part).map_err(|reason| TagsError::InvalidPair {
                pair: pair.to_string(),
                reason,
            })?;
        }
        tags.entry(key.to_string()).or_default().push(value.to_string());
    }
    Ok(tags)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
