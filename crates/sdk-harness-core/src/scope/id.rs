// crates/sdk-harness-core/src/scope/id.rs
// ============================================================================
// Module: Test Identity
// Description: Scope paths, path patterns, and run/skip filters.
// Purpose: Name scopes stably and select subsets of the scope tree.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`TestId`] is the ordered list of scope names from the root to a scope,
//! rendered as `a/b/c`. Patterns use the same separator; `*` matches exactly
//! one segment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

// ============================================================================
// SECTION: Test Id
// ============================================================================

/// Path of scope names from the root scope.
///
/// # Invariants
/// - The root scope has an empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TestId {
    /// Scope names, outermost first.
    segments: Vec<String>,
}

impl TestId {
    /// Returns the root identifier.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Returns the identifier of a named child scope.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self {
            segments,
        }
    }

    /// Returns the scope names, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the innermost scope name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns true for the root identifier.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl Serialize for TestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<S: Into<String>> FromIterator<S> for TestId {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Test-ID pattern parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Pattern string was empty.
    #[error("test id pattern is empty")]
    Empty,
    /// Pattern contained an empty segment.
    #[error("test id pattern has an empty segment: {0}")]
    EmptySegment(String),
}

/// Slash-separated scope path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIdPattern {
    /// Pattern segments; `*` is a single-segment wildcard.
    segments: Vec<String>,
}

impl TestIdPattern {
    /// Returns true when every positionally shared segment matches.
    ///
    /// Ancestors and descendants of a matching ID are selected too, so the
    /// scopes enclosing a selected test still execute.
    #[must_use]
    pub fn selects(&self, id: &TestId) -> bool {
        self.segments.iter().zip(id.segments()).all(|(pattern, name)| segment_matches(pattern, name))
    }

    /// Returns true when the ID is the pattern itself or lies beneath it.
    #[must_use]
    pub fn covers(&self, id: &TestId) -> bool {
        id.segments().len() >= self.segments.len() && self.selects(id)
    }
}

impl FromStr for TestIdPattern {
    type Err = PatternError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }
        let segments: Vec<String> = raw.split('/').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PatternError::EmptySegment(raw.to_string()));
        }
        Ok(Self {
            segments,
        })
    }
}

impl fmt::Display for TestIdPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Returns true when a pattern segment matches a scope name.
fn segment_matches(pattern: &str, name: &str) -> bool {
    pattern == "*" || pattern == name
}

// ============================================================================
// SECTION: Filter
// ============================================================================

/// Run/skip selection applied before a scope body executes.
#[derive(Debug, Clone, Default)]
pub struct TestFilter {
    /// When non-empty, only selected scopes run.
    run: Vec<TestIdPattern>,
    /// Scopes covered by any of these are skipped.
    skip: Vec<TestIdPattern>,
}

impl TestFilter {
    /// Returns a filter that runs everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses run and skip pattern strings.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] for the first invalid pattern.
    pub fn from_patterns<R, S>(run: R, skip: S) -> Result<Self, PatternError>
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Ok(Self {
            run: run.into_iter().map(|raw| raw.as_ref().parse()).collect::<Result<_, _>>()?,
            skip: skip.into_iter().map(|raw| raw.as_ref().parse()).collect::<Result<_, _>>()?,
        })
    }

    /// Adds a run pattern.
    #[must_use]
    pub fn with_run(mut self, pattern: TestIdPattern) -> Self {
        self.run.push(pattern);
        self
    }

    /// Adds a skip pattern.
    #[must_use]
    pub fn with_skip(mut self, pattern: TestIdPattern) -> Self {
        self.skip.push(pattern);
        self
    }

    /// Returns true when the scope must be reported as filtered.
    #[must_use]
    pub fn excludes(&self, id: &TestId) -> bool {
        if id.is_root() {
            return false;
        }
        let unselected = !self.run.is_empty() && !self.run.iter().any(|pattern| pattern.selects(id));
        unselected || self.skip.iter().any(|pattern| pattern.covers(id))
    }
}
