// crates/sdk-harness-mocks/src/events.rs
// ============================================================================
// Module: Events Mock
// Description: Analytics and diagnostic event collector.
// Purpose: Decode posted event batches and hand them to test code in order.
// Dependencies: axum, flate2, time, sdk-harness-core
// ============================================================================

//! ## Overview
//! Each accepted POST becomes exactly one [`EventPayload`] on a bounded
//! queue. When the queue is full the HTTP worker waits for test code to
//! drain it instead of dropping the payload. Analytics batches and
//! diagnostic events are kept on separate queues.
//!
//! Gzip bodies are accepted only when the SDK declares the `event-gzip`
//! capability; anything else that does not decode is a protocol violation
//! answered with `400`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::SystemTime;

use async_trait::async_trait;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::DATE;
use axum::response::IntoResponse;
use axum::response::Response;
use flate2::read::GzDecoder;
use sdk_harness_core::FailureHandle;
use sdk_harness_core::FailureKind;
use sdk_harness_core::ScopeResult;
use sdk_harness_core::TestScope;
use sdk_harness_core::capabilities::capability;
use serde_json::Value;
use time::OffsetDateTime;
use time::UtcOffset;

use crate::capture::CaptureError;
use crate::capture::CaptureQueue;
use crate::capture::CaptureSender;
use crate::headers::AUTHORIZATION_HEADER;
use crate::headers::CONTENT_ENCODING_HEADER;
use crate::headers::EVENT_SCHEMA_HEADER;
use crate::headers::PAYLOAD_ID_HEADER;
use crate::router::CapturedRequest;
use crate::router::EndpointHandler;
use crate::router::MockEndpoint;
use crate::router::MockEndpointRouter;
use crate::sdk_data::SdkKind;

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// One decoded event POST.
#[derive(Debug, Clone)]
pub struct EventPayload {
    /// Decoded event objects; diagnostic posts carry exactly one.
    pub events: Vec<Value>,
    /// Value of the payload identifier header.
    pub payload_id: Option<String>,
    /// Value of the event schema header.
    pub schema: Option<String>,
    /// Credential from the `Authorization` header or the path.
    pub credential: Option<String>,
    /// Request path relative to the endpoint.
    pub path: String,
    /// Receipt time.
    pub received_at: SystemTime,
}

impl EventPayload {
    /// Returns the `kind` of every event in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.events.iter().map(|event| event.get("kind").and_then(Value::as_str).unwrap_or_default()).collect()
    }
}

/// Event stream a request posts to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EventRoute {
    /// Analytics batch, with an optional credential from the path.
    Analytics(Option<String>),
    /// Diagnostic event, with an optional credential from the path.
    Diagnostic(Option<String>),
}

/// Resolves an event POST path for the SDK kind.
fn resolve_event_route(sdk: SdkKind, path: &str) -> Option<EventRoute> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (sdk, segments.as_slice()) {
        (SdkKind::ServerSide, ["bulk"])
        | (SdkKind::Mobile, ["mobile"] | ["mobile", "events"] | ["mobile", "events", "bulk"]) => {
            Some(EventRoute::Analytics(None))
        }
        (SdkKind::ServerSide, ["diagnostic"]) | (SdkKind::Mobile, ["mobile", "events", "diagnostic"]) => {
            Some(EventRoute::Diagnostic(None))
        }
        (SdkKind::JsClientSide, ["events", "bulk", env]) => Some(EventRoute::Analytics(Some((*env).to_string()))),
        (SdkKind::JsClientSide, ["events", "diagnostic", env]) => {
            Some(EventRoute::Diagnostic(Some((*env).to_string())))
        }
        _ => None,
    }
}

/// Formats a time as an HTTP `Date` header value.
fn http_date(at: SystemTime) -> String {
    let at = OffsetDateTime::from(at).to_offset(UtcOffset::UTC);
    let weekday = at.weekday().to_string();
    let month = at.month().to_string();
    format!(
        "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
        weekday.get(.. 3).unwrap_or_default(),
        at.day(),
        month.get(.. 3).unwrap_or_default(),
        at.year(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

// ============================================================================
// SECTION: Handler State
// ============================================================================

/// Events handler state.
struct EventsState {
    /// SDK kind served.
    sdk: SdkKind,
    /// Whether gzip bodies are allowed.
    gzip_allowed: bool,
    /// Analytics payload producer.
    analytics: CaptureSender<EventPayload>,
    /// Diagnostic payload producer.
    diagnostics: CaptureSender<EventPayload>,
    /// Every payload identifier seen, in receipt order.
    payload_ids: Mutex<Vec<Option<String>>>,
    /// `Date` header value returned to the SDK.
    host_time: Mutex<Option<SystemTime>>,
    /// Failure recorder of the creating scope.
    failures: FailureHandle,
}

impl EventsState {
    /// Records a protocol violation and builds the rejection.
    fn reject(&self, status: StatusCode, message: String) -> Response {
        self.failures.protocol_violation(format!("events mock: {message}"));
        status.into_response()
    }

    /// Returns the body bytes, inflating gzip when permitted.
    fn decode_body(&self, request: &CapturedRequest) -> Result<Vec<u8>, String> {
        let encoding = request.header(CONTENT_ENCODING_HEADER).map(str::trim);
        match encoding {
            None | Some("" | "identity") => Ok(request.body.to_vec()),
            Some(value) if value.eq_ignore_ascii_case("gzip") => {
                if !self.gzip_allowed {
                    return Err("gzip body sent without event-gzip capability".to_string());
                }
                let mut inflated = Vec::new();
                GzDecoder::new(&request.body[..])
                    .read_to_end(&mut inflated)
                    .map_err(|err| format!("gzip body did not inflate: {err}"))?;
                Ok(inflated)
            }
            Some(other) => Err(format!("unsupported content-encoding: {other}")),
        }
    }

    /// Builds the accepted response.
    fn accepted(&self) -> Response {
        let host_time = *self.host_time.lock().unwrap_or_else(PoisonError::into_inner);
        let mut response = StatusCode::ACCEPTED.into_response();
        if let Some(at) = host_time
            && let Ok(value) = HeaderValue::from_str(&http_date(at))
        {
            response.headers_mut().insert(DATE, value);
        }
        response
    }
}

#[async_trait]
impl EndpointHandler for EventsState {
    async fn handle(&self, request: CapturedRequest) -> Response {
        if request.method != Method::POST {
            return self.reject(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("{} {} is not an event post", request.method, request.path),
            );
        }
        let Some(route) = resolve_event_route(self.sdk, &request.path) else {
            return self.reject(StatusCode::NOT_FOUND, format!("no event route for {}", request.path));
        };
        let body = match self.decode_body(&request) {
            Ok(body) => body,
            Err(message) => return self.reject(StatusCode::BAD_REQUEST, message),
        };
        let parsed: Value = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(err) => return self.reject(StatusCode::BAD_REQUEST, format!("body is not JSON: {err}")),
        };
        let (credential, events, sender) = match (route, parsed) {
            (EventRoute::Analytics(path_credential), Value::Array(events)) => {
                (path_credential, events, &self.analytics)
            }
            (EventRoute::Diagnostic(path_credential), event @ Value::Object(_)) => {
                (path_credential, vec![event], &self.diagnostics)
            }
            (EventRoute::Analytics(_), _) => {
                return self.reject(StatusCode::BAD_REQUEST, "analytics body must be a JSON array".to_string());
            }
            (EventRoute::Diagnostic(_), _) => {
                return self.reject(StatusCode::BAD_REQUEST, "diagnostic body must be a JSON object".to_string());
            }
        };
        let payload = EventPayload {
            events,
            payload_id: request.header(PAYLOAD_ID_HEADER).map(str::to_string),
            schema: request.header(EVENT_SCHEMA_HEADER).map(str::to_string),
            credential: credential.or_else(|| request.header(AUTHORIZATION_HEADER).map(str::to_string)),
            path: request.path.clone(),
            received_at: request.received_at,
        };
        tracing::debug!(
            path = %payload.path,
            payload_id = payload.payload_id.as_deref().unwrap_or("-"),
            events = payload.events.len(),
            "event payload received"
        );
        self.payload_ids.lock().unwrap_or_else(PoisonError::into_inner).push(payload.payload_id.clone());
        if let Err(err) = sender.record(payload).await {
            tracing::debug!(error = %err, "event payload discarded after close");
        }
        self.accepted()
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Event collector bound to one scope.
///
/// # Invariants
/// - One accepted POST yields exactly one payload, read in receipt order.
/// - Unread payloads are kept until read or the scope closes.
#[derive(Clone)]
pub struct EventsService {
    /// Route receiving posts.
    endpoint: MockEndpoint,
    /// Handler state.
    state: Arc<EventsState>,
    /// Analytics payload queue.
    analytics: Arc<CaptureQueue<EventPayload>>,
    /// Diagnostic payload queue.
    diagnostics: Arc<CaptureQueue<EventPayload>>,
}

impl EventsService {
    /// Starts an event collector for SDKs of kind `sdk`.
    ///
    /// # Errors
    ///
    /// Fails the scope when no route can be allocated.
    pub fn start(scope: &TestScope, router: &MockEndpointRouter, sdk: SdkKind) -> ScopeResult<Self> {
        let runtime = router
            .runtime_handle()
            .map_err(|err| scope.fail_now(format!("events mock unavailable: {err}")))?;
        let capacity = router.payload_queue_capacity();
        let analytics = Arc::new(CaptureQueue::new(capacity, runtime.clone()));
        let diagnostics = Arc::new(CaptureQueue::new(capacity, runtime));
        let state = Arc::new(EventsState {
            sdk,
            gzip_allowed: scope.has_capability(capability::EVENT_GZIP),
            analytics: analytics.sender(),
            diagnostics: diagnostics.sender(),
            payload_ids: Mutex::new(Vec::new()),
            host_time: Mutex::new(None),
            failures: scope.failure_handle(),
        });
        let endpoint = router.open_in_scope(scope, Arc::clone(&state) as Arc<dyn EndpointHandler>)?;
        let (closing_analytics, closing_diagnostics) = (Arc::clone(&analytics), Arc::clone(&diagnostics));
        scope.defer(move || {
            closing_analytics.close();
            closing_diagnostics.close();
        });
        Ok(Self {
            endpoint,
            state,
            analytics,
            diagnostics,
        })
    }

    /// Underlying endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &MockEndpoint {
        &self.endpoint
    }

    /// Events base URL for the SDK configuration.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.endpoint.base_url()
    }

    /// Blocks for the next analytics payload, failing the scope on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] when nothing arrives.
    pub fn expect_analytics_events(&self, scope: &TestScope, timeout: Duration) -> ScopeResult<EventPayload> {
        self.analytics.await_next(timeout).map_err(|err| {
            scope.fail_now_kind(FailureKind::Timeout, format!("expected analytics events: {err}"))
        })
    }

    /// Fails the scope if an analytics payload arrives within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] when a payload arrived.
    pub fn expect_no_analytics_events(&self, scope: &TestScope, timeout: Duration) -> ScopeResult {
        match self.analytics.await_next(timeout) {
            Ok(payload) => Err(scope.fail_now(format!(
                "expected no analytics events, got {} ({})",
                payload.events.len(),
                payload.kinds().join(", ")
            ))),
            Err(CaptureError::Timeout(_) | CaptureError::Closed | CaptureError::Full) => Ok(()),
        }
    }

    /// Blocks for the next diagnostic event, failing the scope on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] when nothing arrives.
    pub fn expect_diagnostic_event(&self, scope: &TestScope, timeout: Duration) -> ScopeResult<Value> {
        let payload = self.diagnostics.await_next(timeout).map_err(|err| {
            scope.fail_now_kind(FailureKind::Timeout, format!("expected diagnostic event: {err}"))
        })?;
        scope.require_some(payload.events.into_iter().next(), "diagnostic event")
    }

    /// Returns every unread analytics payload.
    #[must_use]
    pub fn take_analytics_payloads(&self) -> Vec<EventPayload> {
        self.analytics.take_all()
    }

    /// Payload identifiers of every accepted post, in receipt order.
    #[must_use]
    pub fn payload_ids(&self) -> Vec<Option<String>> {
        self.state.payload_ids.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the first payload identifier seen more than once.
    #[must_use]
    pub fn first_duplicate_payload_id(&self) -> Option<String> {
        let mut seen = HashSet::new();
        self.payload_ids().into_iter().flatten().find(|id| !seen.insert(id.clone()))
    }

    /// Fails the scope unless every payload identifier is distinct.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] on a repeated id.
    pub fn check_payload_ids_distinct(&self, scope: &TestScope) -> ScopeResult {
        match self.first_duplicate_payload_id() {
            Some(id) => Err(scope.fail_now(format!("payload id {id} was sent more than once"))),
            None => Ok(()),
        }
    }

    /// Sets the `Date` header returned to the SDK; `None` uses the server clock.
    pub fn set_host_time_override(&self, at: Option<SystemTime>) {
        *self.state.host_time.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    /// Releases the route and closes the queues.
    pub fn close(&self) {
        self.endpoint.close();
        self.analytics.close();
        self.diagnostics.close();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
