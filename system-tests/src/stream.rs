// system-tests/src/stream.rs
// ============================================================================
// Module: Reference SDK Stream Client
// Description: Blocking SSE consumer feeding the versioned store.
// Purpose: Receive put/patch/delete events the way an SDK does.
// Dependencies: reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`StreamClient::connect`] opens the stream synchronously so connection
//! errors surface to the caller, then reads frames on a worker thread until
//! the server ends the stream or the client is stopped. Malformed frames are
//! logged and skipped.

use std::io::BufRead;
use std::io::BufReader;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use serde_json::Value;

use crate::SdkConfig;
use crate::error::SdkError;
use crate::store::FlagStore;

// ============================================================================
// SECTION: Frame Parsing
// ============================================================================

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; `message` when the frame had none.
    pub name: String,
    /// Data lines joined by `\n`.
    pub data: String,
}

/// Incremental line-oriented SSE parser.
#[derive(Debug, Default)]
pub struct SseParser {
    /// Pending event name.
    name: Option<String>,
    /// Pending data lines.
    data: Vec<String>,
}

impl SseParser {
    /// Feeds one line without its terminator; returns an event on dispatch.
    pub fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            let name = self.name.take();
            if self.data.is_empty() {
                return None;
            }
            let data = std::mem::take(&mut self.data).join("\n");
            return Some(SseEvent {
                name: name.unwrap_or_else(|| "message".to_string()),
                data,
            });
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = line.split_once(':').map_or((line, ""), |(field, value)| {
            (field, value.strip_prefix(' ').unwrap_or(value))
        });
        match field {
            "event" => self.name = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Running stream consumer.
pub struct StreamClient {
    /// Store fed by the stream.
    store: FlagStore,
    /// Stop request for the worker.
    stop: Arc<AtomicBool>,
    /// Number of events applied or rejected so far.
    events_seen: Arc<AtomicUsize>,
}

impl StreamClient {
    /// Connects to `{base_url}/all` and starts applying events to `store`.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError`] when the stream cannot be opened.
    pub fn connect(base_url: &str, config: &SdkConfig, store: FlagStore) -> Result<Self, SdkError> {
        let url = format!("{}/all", base_url.trim_end_matches('/'));
        let client = reqwest::blocking::Client::builder().timeout(None::<Duration>).build()?;
        let response = config.decorate(client.get(&url)).header("accept", "text/event-stream").send()?;
        if !response.status().is_success() {
            return Err(SdkError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        let stop = Arc::new(AtomicBool::new(false));
        let events_seen = Arc::new(AtomicUsize::new(0));
        let worker_store = store.clone();
        let worker_stop = Arc::clone(&stop);
        let worker_seen = Arc::clone(&events_seen);
        thread::spawn(move || {
            let mut parser = SseParser::default();
            for line in BufReader::new(response).lines() {
                if worker_stop.load(Ordering::Acquire) {
                    break;
                }
                let Ok(line) = line else {
                    break;
                };
                if let Some(event) = parser.push_line(&line) {
                    if let Err(err) = apply_event(&worker_store, &event) {
                        tracing::warn!(event = %event.name, error = %err, "stream event ignored");
                    }
                    worker_seen.fetch_add(1, Ordering::AcqRel);
                }
            }
            tracing::debug!("stream ended");
        });
        Ok(Self {
            store,
            stop,
            events_seen,
        })
    }

    /// Store fed by this stream.
    #[must_use]
    pub const fn store(&self) -> &FlagStore {
        &self.store
    }

    /// Number of events received so far.
    #[must_use]
    pub fn events_seen(&self) -> usize {
        self.events_seen.load(Ordering::Acquire)
    }

    /// Stops applying events; the worker exits on its next frame.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Applies one event to the store.
fn apply_event(store: &FlagStore, event: &SseEvent) -> Result<(), SdkError> {
    let payload: Value =
        serde_json::from_str(&event.data).map_err(|err| SdkError::Protocol(format!("{}: {err}", event.name)))?;
    match event.name.as_str() {
        "put" => {
            let data = payload.get("data").ok_or_else(|| SdkError::Protocol("put without data".to_string()))?;
            store.init(data)
        }
        "patch" => store.apply_patch(&payload).map(|_| ()),
        "delete" => store.apply_delete(&payload).map(|_| ()),
        other => Err(SdkError::Protocol(format!("unknown event: {other}"))),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
