// crates/sdk-harness-mocks/src/streaming.rs
// ============================================================================
// Module: Streaming Mock
// Description: Server-sent events flag-data stream with per-event pushes.
// Purpose: Control exact stream event ordering seen by the SDK under test.
// Dependencies: axum, tokio, tokio-stream, sdk-harness-core
// ============================================================================

//! ## Overview
//! Each SSE connection owns an unbounded outbound mailbox. On connect the
//! service enqueues a `put` event built from the current snapshot before the
//! connection becomes visible to pushes, so the snapshot is always the first
//! frame. Pushes fan out to every open mailbox in call order; mailboxes whose
//! client went away are pruned on the next push.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use sdk_harness_core::FailureHandle;
use sdk_harness_core::ScopeResult;
use sdk_harness_core::TestScope;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::router::CapturedRequest;
use crate::router::EndpointHandler;
use crate::router::MockEndpoint;
use crate::router::MockEndpointRouter;
use crate::sdk_data::DataKind;
use crate::sdk_data::SdkData;
use crate::sdk_data::SdkDataError;
use crate::sdk_data::SdkDataSource;
use crate::sdk_data::SdkKind;
use crate::sdk_data::Transport;
use crate::sdk_data::resolve_sdk_route;
use crate::sdk_data::stream_delete_payload;
use crate::sdk_data::stream_patch_payload;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Full snapshot event name.
pub const PUT_EVENT: &str = "put";
/// Single item update event name.
pub const PATCH_EVENT: &str = "patch";
/// Single item deletion event name.
pub const DELETE_EVENT: &str = "delete";

// ============================================================================
// SECTION: Connections
// ============================================================================

/// Outbound frame sender of one open stream.
type Mailbox = mpsc::UnboundedSender<Result<Event, Infallible>>;

/// One open SSE connection.
struct StreamConnection {
    /// Connection identifier for logs.
    id: u64,
    /// Outbound frame mailbox.
    mailbox: Mailbox,
}

/// Builds one SSE frame; carriage returns cannot be framed and are dropped.
fn frame(name: &str, data: &str) -> Event {
    let name: String = name.chars().filter(|ch| !matches!(ch, '\r' | '\n')).collect();
    let data: String = data.chars().filter(|ch| *ch != '\r').collect();
    Event::default().event(name).data(data)
}

// ============================================================================
// SECTION: Handler State
// ============================================================================

/// State shared between the service handle and its HTTP workers.
struct StreamingState {
    /// SDK kind served.
    sdk: SdkKind,
    /// Snapshot sent to new connections.
    source: SdkDataSource,
    /// Open connections in accept order.
    connections: Mutex<Vec<StreamConnection>>,
    /// Next connection identifier.
    next_connection: AtomicU64,
    /// Failure recorder of the creating scope.
    failures: FailureHandle,
}

impl StreamingState {
    /// Registers a connection whose first frame is the current snapshot.
    fn open_connection(&self) -> mpsc::UnboundedReceiver<Result<Event, Infallible>> {
        let (mailbox, receiver) = mpsc::unbounded_channel();
        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let put = self.source.get().stream_put_payload().to_string();
        let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = mailbox.send(Ok(frame(PUT_EVENT, &put)));
        connections.push(StreamConnection {
            id,
            mailbox,
        });
        tracing::debug!(connection_id = id, open = connections.len(), "stream connection opened");
        receiver
    }

    /// Enqueues a frame on every open connection; returns how many got it.
    fn fan_out(&self, name: &str, data: &str) -> usize {
        let event = frame(name, data);
        let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        connections.retain(|connection| {
            let delivered = connection.mailbox.send(Ok(event.clone())).is_ok();
            if !delivered {
                tracing::debug!(connection_id = connection.id, "stream connection pruned");
            }
            delivered
        });
        tracing::debug!(event = name, delivered = connections.len(), "stream event pushed");
        connections.len()
    }

    /// Drops every mailbox, ending the open streams.
    fn close_all(&self) {
        let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        if !connections.is_empty() {
            tracing::debug!(closed = connections.len(), "stream connections closed");
        }
        connections.clear();
    }
}

#[async_trait]
impl EndpointHandler for StreamingState {
    async fn handle(&self, request: CapturedRequest) -> Response {
        match resolve_sdk_route(
            self.sdk,
            Transport::Streaming,
            request.method.as_str(),
            &request.path,
            &request.body,
        ) {
            Ok(Some(context)) => tracing::debug!(%context, "stream context"),
            Ok(None) => {}
            Err(err @ SdkDataError::UnknownRoute(_)) => {
                self.failures.protocol_violation(format!("streaming mock: {err}"));
                return StatusCode::NOT_FOUND.into_response();
            }
            Err(err) => {
                self.failures.protocol_violation(format!("streaming mock: {err}"));
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
        let receiver = self.open_connection();
        Sse::new(UnboundedReceiverStream::new(receiver)).keep_alive(KeepAlive::default()).into_response()
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Streaming flag-data service bound to one scope.
///
/// # Invariants
/// - Every connection receives a `put` frame before any pushed frame.
/// - Frames pushed to one connection arrive in push order.
#[derive(Clone)]
pub struct StreamingService {
    /// Route serving the stream.
    endpoint: MockEndpoint,
    /// Connection state.
    state: Arc<StreamingState>,
}

impl StreamingService {
    /// Starts a stream serving `data` to SDKs of kind `sdk`.
    ///
    /// # Errors
    ///
    /// Fails the scope when the data shape does not fit the SDK kind or no
    /// route can be allocated.
    pub fn start(
        scope: &TestScope,
        router: &MockEndpointRouter,
        sdk: SdkKind,
        data: SdkData,
    ) -> ScopeResult<Self> {
        if !data.fits(sdk) {
            return Err(scope.fail_now(format!("streaming data shape does not fit {} SDKs", sdk.label())));
        }
        Self::start_with_source(scope, router, sdk, SdkDataSource::new(data))
    }

    /// Starts a stream serving a snapshot shared with other services.
    ///
    /// # Errors
    ///
    /// Fails the scope when no route can be allocated.
    pub fn start_with_source(
        scope: &TestScope,
        router: &MockEndpointRouter,
        sdk: SdkKind,
        source: SdkDataSource,
    ) -> ScopeResult<Self> {
        let state = Arc::new(StreamingState {
            sdk,
            source,
            connections: Mutex::new(Vec::new()),
            next_connection: AtomicU64::new(0),
            failures: scope.failure_handle(),
        });
        let endpoint = router.open_in_scope(scope, Arc::clone(&state) as Arc<dyn EndpointHandler>)?;
        let closer = Arc::clone(&state);
        scope.defer(move || closer.close_all());
        Ok(Self {
            endpoint,
            state,
        })
    }

    /// Underlying endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &MockEndpoint {
        &self.endpoint
    }

    /// Stream base URL for the SDK configuration.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.endpoint.base_url()
    }

    /// Snapshot source, for sharing with a polling service.
    #[must_use]
    pub fn data_source(&self) -> SdkDataSource {
        self.state.source.clone()
    }

    /// Blocks until the SDK opens a stream, failing the scope on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] on timeout.
    pub fn require_connection(&self, scope: &TestScope, timeout: Duration) -> ScopeResult<CapturedRequest> {
        self.endpoint.require_connection(scope, timeout)
    }

    /// Number of connections still open as of the last push.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.state.connections.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Replaces the snapshot served to future connections.
    ///
    /// # Errors
    ///
    /// Returns [`SdkDataError::KindMismatch`] when the shape does not fit.
    pub fn set_initial_data(&self, data: SdkData) -> Result<(), SdkDataError> {
        self.check_fits(&data)?;
        self.state.source.set(data);
        Ok(())
    }

    /// Pushes a `patch` event; returns the number of connections reached.
    ///
    /// # Errors
    ///
    /// Returns [`SdkDataError::KindMismatch`] for segment pushes to
    /// client-side SDKs.
    pub fn push_update(&self, kind: DataKind, key: &str, item: &Value) -> Result<usize, SdkDataError> {
        let payload = stream_patch_payload(self.state.sdk, kind, key, item)?;
        Ok(self.state.fan_out(PATCH_EVENT, &payload.to_string()))
    }

    /// Pushes a `delete` event; returns the number of connections reached.
    ///
    /// # Errors
    ///
    /// Returns [`SdkDataError::KindMismatch`] for segment deletes to
    /// client-side SDKs.
    pub fn push_delete(&self, kind: DataKind, key: &str, version: u64) -> Result<usize, SdkDataError> {
        let payload = stream_delete_payload(self.state.sdk, kind, key, version)?;
        Ok(self.state.fan_out(DELETE_EVENT, &payload.to_string()))
    }

    /// Pushes a fresh `put` event to open connections only.
    ///
    /// # Errors
    ///
    /// Returns [`SdkDataError::KindMismatch`] when the shape does not fit.
    pub fn push_init(&self, data: &SdkData) -> Result<usize, SdkDataError> {
        self.check_fits(data)?;
        Ok(self.state.fan_out(PUT_EVENT, &data.stream_put_payload().to_string()))
    }

    /// Pushes an arbitrary, possibly malformed, frame.
    pub fn push_event(&self, name: &str, raw_data: &str) -> usize {
        self.state.fan_out(name, raw_data)
    }

    /// Ends every open stream and releases the route.
    pub fn close(&self) {
        self.state.close_all();
        self.endpoint.close();
    }

    /// Rejects data that does not fit the SDK kind.
    fn check_fits(&self, data: &SdkData) -> Result<(), SdkDataError> {
        if data.fits(self.state.sdk) {
            Ok(())
        } else {
            Err(SdkDataError::KindMismatch(format!("data shape does not fit {} SDKs", self.state.sdk.label())))
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
