// crates/sdk-harness-core/src/report.rs
// ============================================================================
// Module: Test Reports
// Description: Scope report tree, outcome counts, and report writers.
// Purpose: Enumerate scope outcomes with diagnostics for humans and tools.
// Dependencies: serde, serde_jcs, thiserror
// ============================================================================

//! ## Overview
//! A [`TestReport`] mirrors the executed scope tree. Counts are taken over
//! leaf scopes, since a parent's status is derived from its children.
//! [`ReportWriter`] persists a canonical JSON summary and a Markdown summary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::failure::Failure;
use crate::scope::ScopeStatus;
use crate::scope::TestId;

// ============================================================================
// SECTION: Report Model
// ============================================================================

/// Outcome of one executed scope and its descendants.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    /// Full scope path.
    pub id: TestId,
    /// Scope name as given to `run`.
    pub name: String,
    /// Aggregated status.
    pub status: ScopeStatus,
    /// Reason when the scope itself was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Failures recorded directly against the scope.
    pub failures: Vec<Failure>,
    /// Debug lines attached with `debug`.
    pub logs: Vec<String>,
    /// Wall-clock duration including cleanups.
    pub duration_ms: u64,
    /// Child scope reports in execution order.
    pub children: Vec<ScopeReport>,
}

impl ScopeReport {
    /// Finds a descendant (or this scope) by rendered ID.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Self> {
        if self.id.to_string() == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Visits this scope and all descendants depth-first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Leaf-scope outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    /// Leaves that passed.
    pub passed: usize,
    /// Leaves with a critical failure.
    pub failed: usize,
    /// Leaves that were skipped.
    pub skipped: usize,
    /// Leaves with only downgraded failures.
    pub non_critical_failed: usize,
}

impl ReportCounts {
    /// Total leaves counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.non_critical_failed
    }
}

/// Report for one suite run.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    /// Suite name.
    pub name: String,
    /// Capabilities declared for the run, sorted.
    pub capabilities: Vec<String>,
    /// Run start (milliseconds since epoch).
    pub started_at_ms: u64,
    /// Root scope report.
    pub root: ScopeReport,
}

impl TestReport {
    /// Returns the aggregated status of the whole run.
    #[must_use]
    pub const fn status(&self) -> ScopeStatus {
        self.root.status
    }

    /// Finds a scope report by rendered ID (`a/b/c`).
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&ScopeReport> {
        self.root.find(id)
    }

    /// Counts leaf scopes by status.
    #[must_use]
    pub fn counts(&self) -> ReportCounts {
        let mut counts = ReportCounts::default();
        self.root.walk(&mut |scope| {
            if !scope.children.is_empty() || scope.id.is_root() {
                return;
            }
            match scope.status {
                ScopeStatus::Passed => counts.passed += 1,
                ScopeStatus::Failed => counts.failed += 1,
                ScopeStatus::Skipped => counts.skipped += 1,
                ScopeStatus::NonCriticalFailed => counts.non_critical_failed += 1,
            }
        });
        counts
    }

    /// Renders an indented plain-text outline of the scope tree.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} [{}]", self.name, self.status().label());
        for child in &self.root.children {
            render_scope(&mut out, child, 1);
        }
        let counts = self.counts();
        let _ = writeln!(
            out,
            "passed: {}, failed: {}, non-critical: {}, skipped: {}",
            counts.passed, counts.failed, counts.non_critical_failed, counts.skipped
        );
        out
    }
}

/// Appends one scope and its children to the text outline.
fn render_scope(out: &mut String, scope: &ScopeReport, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{indent}{} [{}]", scope.name, scope.status.label());
    if let Some(reason) = &scope.skip_reason {
        let _ = write!(out, " ({reason})");
    }
    out.push('\n');
    for failure in &scope.failures {
        let _ = writeln!(out, "{indent}  ! {failure}");
    }
    for line in &scope.logs {
        let _ = writeln!(out, "{indent}  > {line}");
    }
    for child in &scope.children {
        render_scope(out, child, depth + 1);
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Report persistence errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Report file could not be written.
    #[error("report io error: {0}")]
    Io(String),
    /// Report could not be serialized.
    #[error("report serialization error: {0}")]
    Serialize(String),
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Writes JSON and Markdown report files.
#[derive(Debug, Clone, Default)]
pub struct ReportWriter {
    /// Canonical JSON output path.
    json_path: Option<PathBuf>,
    /// Markdown output path.
    markdown_path: Option<PathBuf>,
}

impl ReportWriter {
    /// Creates a writer with no outputs configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the JSON output path.
    #[must_use]
    pub fn with_json(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_path = Some(path.into());
        self
    }

    /// Sets the Markdown output path.
    #[must_use]
    pub fn with_markdown(mut self, path: impl Into<PathBuf>) -> Self {
        self.markdown_path = Some(path.into());
        self
    }

    /// Writes every configured output and returns the paths written.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when serialization or file IO fails.
    pub fn write(&self, report: &TestReport) -> Result<Vec<PathBuf>, ReportError> {
        let mut written = Vec::new();
        if let Some(path) = &self.json_path {
            let bytes =
                serde_jcs::to_vec(report).map_err(|err| ReportError::Serialize(err.to_string()))?;
            write_file(path, &bytes)?;
            written.push(path.clone());
        }
        if let Some(path) = &self.markdown_path {
            write_file(path, render_markdown(report).as_bytes())?;
            written.push(path.clone());
        }
        Ok(written)
    }
}

/// Writes bytes, creating parent directories first.
fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ReportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| ReportError::Io(err.to_string()))?;
    }
    fs::write(path, bytes).map_err(|err| ReportError::Io(err.to_string()))
}

/// Renders the Markdown summary.
#[must_use]
pub fn render_markdown(report: &TestReport) -> String {
    let counts = report.counts();
    let mut out = String::new();
    out.push_str("# SDK Harness Summary\n\n");
    out.push_str("## Status\n\n");
    let _ = writeln!(out, "- Suite: {}", report.name);
    let _ = writeln!(out, "- Status: {}", report.status().label());
    let _ = writeln!(out, "- Duration (ms): {}", report.root.duration_ms);
    let _ = writeln!(
        out,
        "- Leaves: {} passed, {} failed, {} non-critical, {} skipped",
        counts.passed, counts.failed, counts.non_critical_failed, counts.skipped
    );
    out.push_str("\n## Capabilities\n\n");
    if report.capabilities.is_empty() {
        out.push_str("- None\n");
    } else {
        for capability in &report.capabilities {
            let _ = writeln!(out, "- {capability}");
        }
    }
    out.push_str("\n## Failures\n\n");
    let mut any = false;
    report.root.walk(&mut |scope| {
        for failure in &scope.failures {
            any = true;
            let _ = writeln!(out, "- `{}`: {failure}", scope.id);
        }
    });
    if !any {
        out.push_str("- None\n");
    }
    out.push_str("\n## Skipped\n\n");
    let mut skipped = false;
    report.root.walk(&mut |scope| {
        if let Some(reason) = &scope.skip_reason {
            skipped = true;
            let _ = writeln!(out, "- `{}`: {reason}", scope.id);
        }
    });
    if !skipped {
        out.push_str("- None\n");
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
