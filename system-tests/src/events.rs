// system-tests/src/events.rs
// ============================================================================
// Module: Reference SDK Event Processor
// Description: Buffered analytics event delivery.
// Purpose: Post event batches with unique payload ids and optional gzip.
// Dependencies: reqwest, flate2, serde_json
// ============================================================================

//! ## Overview
//! Events are buffered until [`EventProcessor::flush`]. Each flush of a
//! non-empty buffer posts one payload carrying a payload id that is unique
//! for the processor's lifetime; an empty flush posts nothing.

use std::io::Write;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::Value;
use serde_json::json;

use crate::SdkConfig;
use crate::error::SdkError;

/// Event schema version sent with every payload.
pub const EVENT_SCHEMA_VERSION: &str = "4";

/// Buffered event sender.
pub struct EventProcessor {
    /// HTTP client.
    client: reqwest::blocking::Client,
    /// Bulk events URL.
    url: String,
    /// Request headers.
    config: SdkConfig,
    /// Whether payloads are gzip-encoded.
    gzip: bool,
    /// Events awaiting the next flush.
    buffer: Mutex<Vec<Value>>,
    /// Prefix distinguishing this processor's payload ids.
    payload_prefix: String,
    /// Payloads posted so far.
    flushes: AtomicU64,
}

impl EventProcessor {
    /// Creates a processor posting to `{base_url}/bulk`.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Http`] when the HTTP client cannot be built.
    pub fn new(base_url: &str, config: SdkConfig, gzip: bool) -> Result<Self, SdkError> {
        let started = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Ok(Self {
            client: reqwest::blocking::Client::builder().timeout(config.request_timeout).build()?,
            url: format!("{}/bulk", base_url.trim_end_matches('/')),
            config,
            gzip,
            buffer: Mutex::new(Vec::new()),
            payload_prefix: format!("{:x}-{:x}", started.as_secs(), started.subsec_nanos()),
            flushes: AtomicU64::new(0),
        })
    }

    /// Buffers an `identify` event.
    pub fn identify(&self, context_key: &str) {
        self.push(json!({
            "kind": "identify",
            "creationDate": now_millis(),
            "context": { "kind": "user", "key": context_key },
        }));
    }

    /// Buffers a `custom` event.
    pub fn custom(&self, context_key: &str, event_key: &str) {
        self.push(json!({
            "kind": "custom",
            "creationDate": now_millis(),
            "key": event_key,
            "contextKeys": { "user": context_key },
        }));
    }

    /// Number of buffered events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Posts buffered events; returns the payload id, or `None` when empty.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError`] on encode, transport, or status failures. The
    /// batch is dropped either way.
    pub fn flush(&self) -> Result<Option<String>, SdkError> {
        let events = std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner));
        if events.is_empty() {
            return Ok(None);
        }
        let sequence = self.flushes.fetch_add(1, Ordering::AcqRel);
        let payload_id = format!("{}-{sequence:08}", self.payload_prefix);
        let body = serde_json::to_vec(&events).map_err(|err| SdkError::Encode(err.to_string()))?;
        let mut request = self
            .config
            .decorate(self.client.post(&self.url))
            .header("content-type", "application/json")
            .header("x-launchdarkly-event-schema", EVENT_SCHEMA_VERSION)
            .header("x-launchdarkly-payload-id", &payload_id);
        let body = if self.gzip {
            request = request.header("content-encoding", "gzip");
            gzip(&body)?
        } else {
            body
        };
        let response = request.body(body).send()?;
        let status = response.status();
        tracing::debug!(payload_id = %payload_id, events = events.len(), status = status.as_u16(), "events flushed");
        if !status.is_success() {
            return Err(SdkError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(Some(payload_id))
    }

    /// Appends one event to the buffer.
    fn push(&self, event: Value) {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

/// Gzip-encodes a payload.
fn gzip(bytes: &[u8]) -> Result<Vec<u8>, SdkError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).map_err(|err| SdkError::Encode(err.to_string()))?;
    encoder.finish().map_err(|err| SdkError::Encode(err.to_string()))
}

/// Current time in epoch milliseconds.
fn now_millis() -> u64 {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}
