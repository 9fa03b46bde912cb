// crates/sdk-harness-core/src/scope/runtime.rs
// ============================================================================
// Module: Scope Runtime
// Description: Hierarchical scope executor with deferred cleanup.
// Purpose: Run nested scenario functions and aggregate their outcomes.
// Dependencies: sdk-harness-core
// ============================================================================

//! ## Overview
//! [`TestScope::run`] creates a child scope, executes its body synchronously,
//! drains its deferred cleanups in LIFO order, and stores the resulting
//! [`ScopeReport`] on the parent. Scenario code returns [`ScopeResult`] so
//! `?` ends the remainder of a scope after a fatal failure or a skip.
//!
//! Mock services record failures from HTTP worker threads through a
//! [`FailureHandle`] cloned from the scope that created them.
//!
//! Security posture: scenario bodies are trusted harness code; panics are
//! contained at the scope boundary and recorded as failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::cell::RefCell;
use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use super::id::TestFilter;
use super::id::TestId;
use super::status::ScopeStatus;
use crate::capabilities::CapabilitySet;
use crate::failure::Failure;
use crate::failure::FailureKind;
use crate::poll::poll_until;
use crate::report::ScopeReport;
use crate::report::TestReport;
use crate::sink::ScopeEvent;
use crate::sink::ScopeEventSink;
use crate::sink::TracingScopeSink;
use crate::sink::now_millis;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Early exit from a scope body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeExit {
    /// A fatal failure has been recorded.
    Failed,
    /// The remainder of the scope is skipped for the given reason.
    Skipped(String),
}

/// Result type returned by scope bodies and assertion helpers.
pub type ScopeResult<T = ()> = Result<T, ScopeExit>;

/// Scope state shared with worker threads.
#[derive(Default)]
struct ScopeShared {
    /// Failures recorded against the scope, in order.
    failures: Mutex<Vec<Failure>>,
    /// Active non-critical reason, if any.
    non_critical: Mutex<Option<String>>,
}

impl ScopeShared {
    /// Creates shared state with an inherited non-critical reason.
    fn with_non_critical(reason: Option<String>) -> Self {
        Self {
            failures: Mutex::new(Vec::new()),
            non_critical: Mutex::new(reason),
        }
    }

    /// Returns the active non-critical reason.
    fn non_critical(&self) -> Option<String> {
        self.non_critical.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Appends a failure and returns the stored copy.
    fn push(&self, kind: FailureKind, message: String) -> Failure {
        let failure = Failure {
            kind,
            message,
            non_critical: self.non_critical(),
        };
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).push(failure.clone());
        failure
    }

    /// Returns a copy of all recorded failures.
    fn failures(&self) -> Vec<Failure> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Thread-safe failure recorder bound to one scope.
///
/// # Invariants
/// - Failures recorded after the scope finished are still logged but no
///   longer affect its report.
#[derive(Clone)]
pub struct FailureHandle {
    /// Identifier of the owning scope.
    id: TestId,
    /// Owning scope state.
    shared: Arc<ScopeShared>,
    /// Event sink for failure records.
    sink: Arc<dyn ScopeEventSink>,
}

impl FailureHandle {
    /// Records a failure of the given kind.
    pub fn record(&self, kind: FailureKind, message: impl Into<String>) {
        let failure = self.shared.push(kind, message.into());
        self.sink.record(&ScopeEvent::failure(&self.id, &failure));
    }

    /// Records a protocol violation.
    pub fn protocol_violation(&self, message: impl Into<String>) {
        self.record(FailureKind::ProtocolViolation, message);
    }

    /// Returns the owning scope identifier.
    #[must_use]
    pub const fn test_id(&self) -> &TestId {
        &self.id
    }

    /// Returns true when the owning scope has recorded any failure.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.shared.failures.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

/// Settings shared by every scope of one run.
struct RunContext {
    /// Capabilities declared by the SDK under test.
    capabilities: CapabilitySet,
    /// Run/skip selection.
    filter: TestFilter,
    /// Lifecycle event sink.
    sink: Arc<dyn ScopeEventSink>,
}

/// Deferred cleanup action.
type Deferred = Box<dyn FnOnce()>;

/// One node of the scope tree.
pub struct TestScope {
    /// Scope identifier.
    id: TestId,
    /// Run-wide settings.
    context: Arc<RunContext>,
    /// State shared with failure handles.
    shared: Arc<ScopeShared>,
    /// Cleanup stack; popped on exit.
    deferred: RefCell<Vec<Deferred>>,
    /// Reports of finished child scopes.
    children: RefCell<Vec<ScopeReport>>,
    /// Skip reason once the scope is skipped.
    skip_reason: RefCell<Option<String>>,
    /// Debug lines attached to the report.
    logs: RefCell<Vec<String>>,
}

// ============================================================================
// SECTION: Scope API
// ============================================================================

impl TestScope {
    /// Creates a scope that has not started.
    fn new(id: TestId, context: Arc<RunContext>, non_critical: Option<String>) -> Self {
        Self {
            id,
            context,
            shared: Arc::new(ScopeShared::with_non_critical(non_critical)),
            deferred: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            skip_reason: RefCell::new(None),
            logs: RefCell::new(Vec::new()),
        }
    }

    /// Returns the scope identifier.
    #[must_use]
    pub const fn id(&self) -> &TestId {
        &self.id
    }

    /// Returns the capabilities declared by the SDK under test.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.context.capabilities
    }

    /// Returns true when the SDK declared the capability.
    #[must_use]
    pub fn has_capability(&self, tag: &str) -> bool {
        self.context.capabilities.has(tag)
    }

    /// Runs a named child scope and returns its aggregated status.
    ///
    /// The child inherits the current non-critical reason.
    pub fn run<F>(&self, name: &str, body: F) -> ScopeStatus
    where
        F: FnOnce(&Self) -> ScopeResult,
    {
        let child = Self::new(self.id.child(name), Arc::clone(&self.context), self.shared.non_critical());
        let report = child.execute(name, body);
        let status = report.status;
        self.children.borrow_mut().push(report);
        status
    }

    /// Skips the remainder of the scope unless the capability is declared.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeExit::Skipped`] when the capability is missing.
    pub fn require_capability(&self, tag: &str) -> ScopeResult {
        self.require_capabilities(&[tag])
    }

    /// Skips the remainder of the scope unless every capability is declared.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeExit::Skipped`] naming the first missing capability.
    pub fn require_capabilities(&self, tags: &[&str]) -> ScopeResult {
        match self.context.capabilities.first_missing(tags) {
            Some(missing) => Err(self.skip(&format!("requires capability \"{missing}\""))),
            None => Ok(()),
        }
    }

    /// Downgrades failures recorded from now on to non-critical.
    pub fn non_critical(&self, reason: &str) {
        *self.shared.non_critical.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(reason.to_string());
    }

    /// Registers a cleanup that runs when the scope exits.
    ///
    /// Cleanups run last-registered first, whatever the outcome.
    pub fn defer<F>(&self, cleanup: F)
    where
        F: FnOnce() + 'static,
    {
        self.deferred.borrow_mut().push(Box::new(cleanup));
    }

    /// Records a non-fatal assertion failure.
    pub fn error(&self, message: impl Into<String>) {
        self.error_kind(FailureKind::AssertionMismatch, message);
    }

    /// Records a non-fatal failure of the given kind.
    pub fn error_kind(&self, kind: FailureKind, message: impl Into<String>) {
        self.failure_handle().record(kind, message);
    }

    /// Records a fatal assertion failure; return the result to end the scope.
    #[must_use]
    pub fn fail_now(&self, message: impl Into<String>) -> ScopeExit {
        self.fail_now_kind(FailureKind::AssertionMismatch, message)
    }

    /// Records a fatal failure of the given kind.
    #[must_use]
    pub fn fail_now_kind(&self, kind: FailureKind, message: impl Into<String>) -> ScopeExit {
        self.error_kind(kind, message);
        ScopeExit::Failed
    }

    /// Marks the scope skipped; return the result to end the scope.
    #[must_use]
    pub fn skip(&self, reason: &str) -> ScopeExit {
        ScopeExit::Skipped(reason.to_string())
    }

    /// Returns true when this scope or a finished child has failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        !self.shared.failures().is_empty()
            || self
                .children
                .borrow()
                .iter()
                .any(|child| matches!(child.status, ScopeStatus::Failed | ScopeStatus::NonCriticalFailed))
    }

    /// Fails the scope unless `condition` holds.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeExit::Failed`] when the condition is false.
    pub fn require(&self, condition: bool, message: &str) -> ScopeResult {
        if condition { Ok(()) } else { Err(self.fail_now(message)) }
    }

    /// Fails the scope unless `expected == actual`.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeExit::Failed`] when the values differ.
    #[allow(clippy::use_debug, reason = "Mismatch diagnostics render both values.")]
    pub fn require_eq<T>(&self, expected: &T, actual: &T, what: &str) -> ScopeResult
    where
        T: PartialEq + Debug + ?Sized,
    {
        if expected == actual {
            return Ok(());
        }
        Err(self.fail_now(format!("{what}: expected {expected:?}, got {actual:?}")))
    }

    /// Fails the scope when the option is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeExit::Failed`] when `value` is `None`.
    pub fn require_some<T>(&self, value: Option<T>, what: &str) -> ScopeResult<T> {
        value.ok_or_else(|| self.fail_now(format!("{what}: no value")))
    }

    /// Fails the scope with a timeout unless `condition` holds before the deadline.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeExit::Failed`] when the deadline passes.
    pub fn require_eventually<F>(
        &self,
        timeout: Duration,
        interval: Duration,
        what: &str,
        condition: F,
    ) -> ScopeResult
    where
        F: FnMut() -> bool,
    {
        if poll_until(timeout, interval, condition) {
            return Ok(());
        }
        Err(self.fail_now_kind(
            FailureKind::Timeout,
            format!("{what}: condition not met within {}ms", timeout.as_millis()),
        ))
    }

    /// Attaches a debug line to the scope report.
    pub fn debug(&self, line: impl Into<String>) {
        let line = line.into();
        self.context.sink.record(&ScopeEvent::debug(&self.id, &line));
        self.logs.borrow_mut().push(line);
    }

    /// Returns a thread-safe failure recorder bound to this scope.
    #[must_use]
    pub fn failure_handle(&self) -> FailureHandle {
        FailureHandle {
            id: self.id.clone(),
            shared: Arc::clone(&self.shared),
            sink: Arc::clone(&self.context.sink),
        }
    }
}

// ============================================================================
// SECTION: Execution
// ============================================================================

impl TestScope {
    /// Executes the body, drains cleanups, and builds the report.
    fn execute<F>(self, name: &str, body: F) -> ScopeReport
    where
        F: FnOnce(&Self) -> ScopeResult,
    {
        let started = Instant::now();
        self.context.sink.record(&ScopeEvent::started(&self.id));
        if self.context.filter.excludes(&self.id) {
            self.mark_skipped("filtered");
        } else {
            match catch_unwind(AssertUnwindSafe(|| body(&self))) {
                Ok(Ok(())) => {}
                Ok(Err(ScopeExit::Failed)) => {
                    if self.shared.failures().is_empty() {
                        self.error("scope exited as failed without recording a failure");
                    }
                }
                Ok(Err(ScopeExit::Skipped(reason))) => self.mark_skipped(&reason),
                Err(payload) => {
                    self.error_kind(FailureKind::Panic, format!("panicked: {}", panic_message(&*payload)));
                }
            }
        }
        self.run_deferred();

        let failures = self.shared.failures();
        let own = if failures.iter().any(|failure| !failure.is_non_critical()) {
            ScopeStatus::Failed
        } else if !failures.is_empty() {
            ScopeStatus::NonCriticalFailed
        } else if self.skip_reason.borrow().is_some() {
            ScopeStatus::Skipped
        } else {
            ScopeStatus::Passed
        };
        let children = self.children.take();
        let status = ScopeStatus::aggregate(own, children.iter().map(|child| child.status));
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.context.sink.record(&ScopeEvent::finished(&self.id, status, duration_ms));
        ScopeReport {
            id: self.id.clone(),
            name: name.to_string(),
            status,
            skip_reason: self.skip_reason.take(),
            failures,
            logs: self.logs.take(),
            duration_ms,
            children,
        }
    }

    /// Records the skip reason once.
    fn mark_skipped(&self, reason: &str) {
        self.context.sink.record(&ScopeEvent::skipped(&self.id, reason));
        self.skip_reason.borrow_mut().get_or_insert_with(|| reason.to_string());
    }

    /// Pops and runs every deferred cleanup, containing panics.
    fn run_deferred(&self) {
        loop {
            let next = self.deferred.borrow_mut().pop();
            let Some(cleanup) = next else {
                break;
            };
            if let Err(payload) = catch_unwind(AssertUnwindSafe(cleanup)) {
                self.error_kind(
                    FailureKind::Panic,
                    format!("deferred cleanup panicked: {}", panic_message(&*payload)),
                );
            }
        }
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Executes a root scope and produces a [`TestReport`].
pub struct TestRunner {
    /// Capabilities declared by the SDK under test.
    capabilities: CapabilitySet,
    /// Run/skip selection.
    filter: TestFilter,
    /// Lifecycle event sink.
    sink: Arc<dyn ScopeEventSink>,
}

impl TestRunner {
    /// Creates a runner that logs scope events through `tracing`.
    #[must_use]
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            capabilities,
            filter: TestFilter::new(),
            sink: Arc::new(TracingScopeSink),
        }
    }

    /// Replaces the run/skip filter.
    #[must_use]
    pub fn with_filter(mut self, filter: TestFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Replaces the scope event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ScopeEventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs the suite body as the root scope.
    pub fn run<F>(self, suite: &str, body: F) -> TestReport
    where
        F: FnOnce(&TestScope) -> ScopeResult,
    {
        let started_at_ms = now_millis();
        let capabilities = self.capabilities.iter().map(str::to_string).collect();
        let context = Arc::new(RunContext {
            capabilities: self.capabilities,
            filter: self.filter,
            sink: self.sink,
        });
        let root = TestScope::new(TestId::root(), context, None).execute(suite, body);
        TestReport {
            name: suite.to_string(),
            capabilities,
            started_at_ms,
            root,
        }
    }
}
