// crates/sdk-harness-core/src/sink.rs
// ============================================================================
// Module: Scope Event Sinks
// Description: Structured lifecycle events for test scopes.
// Purpose: Emit scope start/finish/failure records without hard deps.
// Dependencies: serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! The scope runtime emits a [`ScopeEvent`] whenever a scope starts,
//! finishes, records a failure, or attaches a debug line. Sinks decide where
//! those records go: the `tracing` pipeline, an append-only JSON-lines file,
//! or nowhere.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::failure::Failure;
use crate::failure::FailureKind;
use crate::scope::ScopeStatus;
use crate::scope::TestId;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Scope lifecycle event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Rendered test identifier.
    pub test_id: String,
    /// Final status for `scope_finished` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ScopeStatus>,
    /// Failure kind for `failure` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    /// Message, skip reason, or debug line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Scope duration for `scope_finished` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ScopeEvent {
    /// Builds a `scope_started` event.
    #[must_use]
    pub fn started(id: &TestId) -> Self {
        Self::base("scope_started", id)
    }

    /// Builds a `scope_finished` event.
    #[must_use]
    pub fn finished(id: &TestId, status: ScopeStatus, duration_ms: u64) -> Self {
        Self {
            status: Some(status),
            duration_ms: Some(duration_ms),
            ..Self::base("scope_finished", id)
        }
    }

    /// Builds a `failure` event.
    #[must_use]
    pub fn failure(id: &TestId, failure: &Failure) -> Self {
        Self {
            kind: Some(failure.kind),
            message: Some(failure.to_string()),
            ..Self::base("failure", id)
        }
    }

    /// Builds a `skip` event.
    #[must_use]
    pub fn skipped(id: &TestId, reason: &str) -> Self {
        Self {
            message: Some(reason.to_string()),
            ..Self::base("skip", id)
        }
    }

    /// Builds a `debug` event.
    #[must_use]
    pub fn debug(id: &TestId, line: &str) -> Self {
        Self {
            message: Some(line.to_string()),
            ..Self::base("debug", id)
        }
    }

    /// Builds an event with only the common fields populated.
    fn base(event: &'static str, id: &TestId) -> Self {
        Self {
            event,
            timestamp_ms: now_millis(),
            test_id: id.to_string(),
            status: None,
            kind: None,
            message: None,
            duration_ms: None,
        }
    }
}

/// Returns wall-clock milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for scope lifecycle events.
pub trait ScopeEventSink: Send + Sync {
    /// Record a scope event.
    fn record(&self, event: &ScopeEvent);
}

/// Sink that forwards scope events to `tracing`.
pub struct TracingScopeSink;

impl ScopeEventSink for TracingScopeSink {
    fn record(&self, event: &ScopeEvent) {
        let message = event.message.as_deref().unwrap_or("");
        match event.event {
            "failure" => tracing::warn!(test_id = %event.test_id, %message, "scope failure"),
            "scope_finished" => tracing::info!(
                test_id = %event.test_id,
                status = event.status.map_or("", ScopeStatus::label),
                duration_ms = event.duration_ms.unwrap_or_default(),
                "scope finished"
            ),
            "skip" => tracing::info!(test_id = %event.test_id, %message, "scope skipped"),
            _ => tracing::debug!(test_id = %event.test_id, event = event.event, %message),
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct JsonLinesScopeSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl JsonLinesScopeSink {
    /// Opens the event log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl ScopeEventSink for JsonLinesScopeSink {
    fn record(&self, event: &ScopeEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op scope sink.
pub struct NoopScopeSink;

impl ScopeEventSink for NoopScopeSink {
    fn record(&self, _event: &ScopeEvent) {}
}

/// Sink that fans events out to several sinks in order.
pub struct FanoutScopeSink {
    /// Downstream sinks.
    sinks: Vec<Arc<dyn ScopeEventSink>>,
}

impl FanoutScopeSink {
    /// Creates a fan-out sink.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn ScopeEventSink>>) -> Self {
        Self {
            sinks,
        }
    }
}

impl ScopeEventSink for FanoutScopeSink {
    fn record(&self, event: &ScopeEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}
