// crates/sdk-harness-mocks/src/router.rs
// ============================================================================
// Module: Mock Endpoint Router
// Description: Shared HTTP listener minting per-fixture endpoint routes.
// Purpose: Route SDK requests to mock handlers and record request history.
// Dependencies: axum, async-trait, bytes, tokio, url
// ============================================================================

//! ## Overview
//! One listener serves every mock endpoint. Each endpoint owns a unique
//! prefix `/endpoints/{id}`; the router strips it, records the request into
//! the endpoint's history, and forwards it to the endpoint's handler. Every
//! request runs on its own runtime task, so a long-lived stream never blocks
//! later polling or event requests.
//!
//! Closing an endpoint removes its route; later requests to the prefix get
//! `404` and blocked readers of its history wake with a closure error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::net::SocketAddr;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::SystemTime;

use async_trait::async_trait;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::response::IntoResponse;
use axum::response::Response;
use bytes::Bytes;
use sdk_harness_config::ServerConfig;
use sdk_harness_core::FailureKind;
use sdk_harness_core::ScopeResult;
use sdk_harness_core::TestScope;
use thiserror::Error;
use tokio::runtime::Builder;
use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use url::Url;

use crate::capture::CaptureError;
use crate::capture::CaptureQueue;
use crate::capture::CaptureSender;
use crate::headers::header_str;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Path prefix under which endpoint routes are minted.
const ENDPOINT_PREFIX: &str = "endpoints";
/// Grace period for in-flight tasks when the router shuts down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Router errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Listener could not be bound or configured.
    #[error("router bind error: {0}")]
    Bind(String),
    /// Async runtime could not be started.
    #[error("router runtime error: {0}")]
    Runtime(String),
    /// Router has shut down.
    #[error("router is closed")]
    Closed,
}

// ============================================================================
// SECTION: Request Snapshot
// ============================================================================

/// Immutable snapshot of one inbound request.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the endpoint base URL, always starting with `/`.
    pub path: String,
    /// Raw query string.
    pub query: Option<String>,
    /// Case-insensitive header multimap.
    pub headers: HeaderMap,
    /// Body bytes as received.
    pub body: Bytes,
    /// Receipt time.
    pub received_at: SystemTime,
}

impl CapturedRequest {
    /// Returns the first UTF-8 value of a header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_str(&self.headers, name)
    }
}

// ============================================================================
// SECTION: Handler Trait
// ============================================================================

/// Request handler bound to one mock endpoint.
#[async_trait]
pub trait EndpointHandler: Send + Sync + 'static {
    /// Produces the response for a captured request.
    async fn handle(&self, request: CapturedRequest) -> Response;
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Route slot of one endpoint.
struct EndpointSlot {
    /// Bound handler.
    handler: Arc<dyn EndpointHandler>,
    /// Request history producer.
    history: CaptureSender<CapturedRequest>,
}

/// Endpoint table shared with the dispatcher.
#[derive(Default)]
struct Registry {
    /// Next endpoint identifier.
    next_id: AtomicU64,
    /// Live routes keyed by endpoint identifier.
    slots: Mutex<HashMap<u64, Arc<EndpointSlot>>>,
    /// Set once the router shuts down.
    closed: AtomicBool,
}

impl Registry {
    /// Looks up a live route.
    fn slot(&self, id: u64) -> Option<Arc<EndpointSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).get(&id).cloned()
    }

    /// Removes a route.
    fn remove(&self, id: u64) -> bool {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).remove(&id).is_some()
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Shared HTTP listener that mints mock endpoints.
///
/// # Invariants
/// - Endpoint identifiers are never reused within one router.
/// - Endpoints must be closed before the router is dropped; blocked reads on
///   a dropped router's endpoints return [`CaptureError::Closed`].
pub struct MockEndpointRouter {
    /// Endpoint table.
    registry: Arc<Registry>,
    /// Runtime driving the listener and handler tasks.
    runtime: Option<Runtime>,
    /// Base URL of the listener, ending in `/`.
    base_url: Url,
    /// Bound socket address.
    local_addr: SocketAddr,
    /// History capacity per endpoint.
    history_capacity: usize,
    /// Capacity of per-mock payload queues.
    payload_capacity: usize,
    /// Listener shutdown trigger.
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockEndpointRouter {
    /// Binds the listener and starts serving.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError`] when the runtime, bind, or advertised URL fails.
    pub fn start(config: &ServerConfig) -> Result<Self, RouterError> {
        let bind = config.bind_addr().map_err(|err| RouterError::Bind(err.to_string()))?;
        let runtime = Builder::new_multi_thread()
            .thread_name("sdk-harness-mocks")
            .enable_all()
            .build()
            .map_err(|err| RouterError::Runtime(err.to_string()))?;
        let listener =
            StdTcpListener::bind(bind).map_err(|err| RouterError::Bind(format!("{bind}: {err}")))?;
        listener
            .set_nonblocking(true)
            .map_err(|err| RouterError::Bind(format!("listener nonblocking failed: {err}")))?;
        let local_addr =
            listener.local_addr().map_err(|err| RouterError::Bind(format!("local addr failed: {err}")))?;
        let base_url = Url::parse(&format!("http://{}:{}/", config.advertised_host.trim(), local_addr.port()))
            .map_err(|err| RouterError::Bind(format!("advertised url invalid: {err}")))?;

        let registry = Arc::new(Registry::default());
        let app = Router::new()
            .fallback(dispatch)
            .layer(DefaultBodyLimit::disable())
            .with_state(Arc::clone(&registry));
        let listener = {
            let _guard = runtime.enter();
            tokio::net::TcpListener::from_std(listener)
                .map_err(|err| RouterError::Bind(format!("listener conversion failed: {err}")))?
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        runtime.spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = server.await {
                tracing::warn!(error = %err, "mock router stopped with error");
            }
        });
        tracing::info!(%local_addr, base_url = %base_url, "mock router listening");
        Ok(Self {
            registry,
            runtime: Some(runtime),
            base_url,
            local_addr,
            history_capacity: config.request_history_capacity,
            payload_capacity: config.payload_queue_capacity,
            shutdown: Some(shutdown_tx),
        })
    }

    /// Returns a handle to the runtime that drives handlers.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Closed`] after shutdown.
    pub fn runtime_handle(&self) -> Result<Handle, RouterError> {
        self.runtime.as_ref().map(|runtime| runtime.handle().clone()).ok_or(RouterError::Closed)
    }

    /// Capacity mocks use for captured payload and query queues.
    #[must_use]
    pub const fn payload_queue_capacity(&self) -> usize {
        self.payload_capacity
    }

    /// Returns the bound socket address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Allocates a unique route bound to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Closed`] after shutdown.
    pub fn new_endpoint(&self, handler: Arc<dyn EndpointHandler>) -> Result<MockEndpoint, RouterError> {
        if self.registry.closed.load(Ordering::Acquire) {
            return Err(RouterError::Closed);
        }
        let runtime = self.runtime_handle()?;
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let history = Arc::new(CaptureQueue::new(self.history_capacity, runtime));
        let slot = Arc::new(EndpointSlot {
            handler,
            history: history.sender(),
        });
        self.registry.slots.lock().unwrap_or_else(PoisonError::into_inner).insert(id, slot);
        let base_url = format!("{}{ENDPOINT_PREFIX}/{id}", self.base_url);
        tracing::debug!(endpoint_id = id, %base_url, "mock endpoint opened");
        Ok(MockEndpoint {
            inner: Arc::new(EndpointInner {
                id,
                base_url,
                registry: Arc::clone(&self.registry),
                history,
            }),
        })
    }

    /// Allocates a route whose lifetime is tied to `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] after recording the
    /// router error against the scope.
    pub fn open_in_scope(
        &self,
        scope: &TestScope,
        handler: Arc<dyn EndpointHandler>,
    ) -> ScopeResult<MockEndpoint> {
        let endpoint = self
            .new_endpoint(handler)
            .map_err(|err| scope.fail_now(format!("mock endpoint unavailable: {err}")))?;
        endpoint.close_on_exit(scope);
        Ok(endpoint)
    }

    /// Number of live endpoint routes.
    #[must_use]
    pub fn open_endpoints(&self) -> usize {
        self.registry.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for MockEndpointRouter {
    fn drop(&mut self) {
        self.registry.closed.store(true, Ordering::Release);
        self.registry.slots.lock().unwrap_or_else(PoisonError::into_inner).clear();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }
    }
}

// ============================================================================
// SECTION: Endpoint
// ============================================================================

/// Shared endpoint state.
struct EndpointInner {
    /// Endpoint identifier.
    id: u64,
    /// Base URL handed to the SDK.
    base_url: String,
    /// Endpoint table the route lives in.
    registry: Arc<Registry>,
    /// Captured request history.
    history: Arc<CaptureQueue<CapturedRequest>>,
}

impl EndpointInner {
    /// Removes the route and closes the history.
    fn close(&self) {
        if self.registry.remove(self.id) {
            tracing::debug!(endpoint_id = self.id, "mock endpoint closed");
        }
        self.history.close();
    }
}

impl Drop for EndpointInner {
    fn drop(&mut self) {
        self.close();
    }
}

/// Handle to one uniquely addressed mock endpoint.
#[derive(Clone)]
pub struct MockEndpoint {
    /// Shared state; the route closes when the last handle drops.
    inner: Arc<EndpointInner>,
}

impl MockEndpoint {
    /// Endpoint identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Base URL to hand to the SDK under test (no trailing slash).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Blocks until the next request arrives.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError`] on timeout or closure.
    pub fn await_connection(&self, timeout: Duration) -> Result<CapturedRequest, CaptureError> {
        if self.inner.registry.closed.load(Ordering::Acquire) {
            self.inner.history.close();
        }
        self.inner.history.await_next(timeout)
    }

    /// Blocks until the next request arrives, failing the scope on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] after recording a
    /// timeout failure.
    pub fn require_connection(&self, scope: &TestScope, timeout: Duration) -> ScopeResult<CapturedRequest> {
        self.await_connection(timeout).map_err(|err| {
            scope.fail_now_kind(
                FailureKind::Timeout,
                format!("no request to {} within {}ms: {err}", self.base_url(), timeout.as_millis()),
            )
        })
    }

    /// Returns every request captured and not yet consumed.
    #[must_use]
    pub fn take_requests(&self) -> Vec<CapturedRequest> {
        self.inner.history.take_all()
    }

    /// Stops routing requests and releases the route.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Returns true once the route has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.registry.slot(self.inner.id).is_none()
    }

    /// Closes the endpoint when `scope` exits.
    pub fn close_on_exit(&self, scope: &TestScope) {
        let endpoint = self.clone();
        scope.defer(move || endpoint.close());
    }
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Routes a request to its endpoint handler.
async fn dispatch(
    State(registry): State<Arc<Registry>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some((id, path)) = split_endpoint_path(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(slot) = registry.slot(id) else {
        tracing::debug!(endpoint_id = id, %method, path, "request to closed endpoint");
        return StatusCode::NOT_FOUND.into_response();
    };
    let request = CapturedRequest {
        method,
        path,
        query: uri.query().map(str::to_string),
        headers,
        body,
        received_at: SystemTime::now(),
    };
    tracing::debug!(endpoint_id = id, method = %request.method, path = %request.path, "request captured");
    if let Err(err) = slot.history.try_record(request.clone()) {
        tracing::warn!(endpoint_id = id, error = %err, "request history not recorded");
    }
    slot.handler.handle(request).await
}

/// Splits `/endpoints/{id}/rest` into the identifier and `/rest`.
fn split_endpoint_path(path: &str) -> Option<(u64, String)> {
    let rest = path.strip_prefix('/')?.strip_prefix(ENDPOINT_PREFIX)?.strip_prefix('/')?;
    let (id, tail) = rest.split_once('/').unwrap_or((rest, ""));
    let id = id.parse().ok()?;
    Some((id, format!("/{tail}")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
