// crates/sdk-harness-mocks/src/persistent_store.rs
// ============================================================================
// Module: Persistent Data-Store Mock
// Description: Init/Get/GetAll/IsInitialized callbacks for store integrations.
// Purpose: Verify an SDK's persistent-store traffic against test callbacks.
// Dependencies: axum, serde, serde_json, sdk-harness-core
// ============================================================================

//! ## Overview
//! Every operation is answered by a test-installed callback. An operation
//! with no callback is a protocol violation: the scope fails and the SDK gets
//! `500`. `IsInitialized` is the exception and answers `true` until replaced.
//! Callback errors are injected backend failures answered with `500`.
//!
//! [`PersistentStoreService::serve_data`] installs callbacks over an
//! in-memory [`PersistentStoreData`]. Every call is appended to an audit
//! queue whichever way it is answered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::http::Method;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use sdk_harness_core::FailureHandle;
use sdk_harness_core::FailureKind;
use sdk_harness_core::ScopeResult;
use sdk_harness_core::TestScope;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::capture::CaptureQueue;
use crate::capture::CaptureSender;
use crate::router::CapturedRequest;
use crate::router::EndpointHandler;
use crate::router::MockEndpoint;
use crate::router::MockEndpointRouter;
use crate::sdk_data::DataKind;
use crate::sdk_data::ServerSdkData;

// ============================================================================
// SECTION: Data
// ============================================================================

/// In-memory store contents keyed by data kind and item key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistentStoreData {
    /// Items per kind.
    collections: BTreeMap<DataKind, BTreeMap<String, Value>>,
}

impl PersistentStoreData {
    /// Creates an empty data set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item under its `key` property.
    #[must_use]
    pub fn with_item(mut self, kind: DataKind, item: Value) -> Self {
        let key = item.get("key").and_then(Value::as_str).unwrap_or_default().to_string();
        self.collections.entry(kind).or_default().insert(key, item);
        self
    }

    /// Returns one item.
    #[must_use]
    pub fn item(&self, kind: DataKind, key: &str) -> Option<&Value> {
        self.collections.get(&kind).and_then(|items| items.get(key))
    }

    /// Returns every item of a kind.
    #[must_use]
    pub fn items(&self, kind: DataKind) -> BTreeMap<String, Value> {
        self.collections.get(&kind).cloned().unwrap_or_default()
    }

    /// Wire form of `Init`: `[{"kind": .., "items": {..}}]`.
    #[must_use]
    pub fn to_all_data(&self) -> Value {
        Value::Array(
            self.collections
                .iter()
                .map(|(kind, items)| json!({ "kind": kind.store_kind(), "items": items }))
                .collect(),
        )
    }

    /// Parses the wire form of `Init`.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first malformed collection.
    pub fn from_all_data(all_data: &[Value]) -> Result<Self, String> {
        let mut data = Self::new();
        for collection in all_data {
            let raw_kind = collection.get("kind").and_then(Value::as_str).unwrap_or_default();
            let kind = DataKind::from_store_kind(raw_kind).ok_or_else(|| format!("unknown kind \"{raw_kind}\""))?;
            let items = collection
                .get("items")
                .and_then(Value::as_object)
                .ok_or_else(|| format!("collection {raw_kind} has no items object"))?;
            let entry = data.collections.entry(kind).or_default();
            for (key, item) in items {
                entry.insert(key.clone(), item.clone());
            }
        }
        Ok(data)
    }
}

impl From<&ServerSdkData> for PersistentStoreData {
    fn from(data: &ServerSdkData) -> Self {
        let mut collections = BTreeMap::new();
        collections.insert(DataKind::Flags, data.items(DataKind::Flags).clone());
        collections.insert(DataKind::Segments, data.items(DataKind::Segments).clone());
        Self {
            collections,
        }
    }
}

// ============================================================================
// SECTION: Callbacks
// ============================================================================

/// `Init` callback.
pub type InitFn = Arc<dyn Fn(&PersistentStoreData) -> Result<(), String> + Send + Sync>;
/// `Get` callback.
pub type GetFn = Arc<dyn Fn(DataKind, &str) -> Result<Option<Value>, String> + Send + Sync>;
/// `GetAll` callback.
pub type GetAllFn = Arc<dyn Fn(DataKind) -> Result<BTreeMap<String, Value>, String> + Send + Sync>;
/// `IsInitialized` callback.
pub type IsInitializedFn = Arc<dyn Fn() -> Result<bool, String> + Send + Sync>;

/// Installed callbacks; `None` means the operation is unexpected.
#[derive(Clone)]
struct Callbacks {
    /// `Init` callback.
    init: Option<InitFn>,
    /// `Get` callback.
    get: Option<GetFn>,
    /// `GetAll` callback.
    get_all: Option<GetAllFn>,
    /// `IsInitialized` callback.
    is_initialized: IsInitializedFn,
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// One store call made by the SDK.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistentStoreQuery {
    /// Full data replacement.
    Init(PersistentStoreData),
    /// Single item read.
    Get {
        /// Item kind.
        kind: DataKind,
        /// Item key.
        key: String,
    },
    /// Collection read.
    GetAll {
        /// Collection kind.
        kind: DataKind,
    },
    /// Initialization check.
    IsInitialized,
}

/// Request body shared by the store operations.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreRequest {
    /// Kind discriminator for `Get`/`GetAll`.
    #[serde(default)]
    kind: Option<String>,
    /// Item key for `Get`.
    #[serde(default)]
    key: Option<String>,
    /// Collections for `Init`.
    #[serde(default)]
    all_data: Option<Vec<Value>>,
}

// ============================================================================
// SECTION: Handler State
// ============================================================================

/// Persistent-store handler state.
struct StoreState {
    /// Installed callbacks.
    callbacks: Mutex<Callbacks>,
    /// Audit producer.
    queries: CaptureSender<PersistentStoreQuery>,
    /// Failure recorder of the creating scope.
    failures: FailureHandle,
}

/// Outcome of one store operation.
enum Outcome {
    /// Successful body.
    Body(Value),
    /// Injected backend error.
    Injected(String),
    /// Protocol violation with its status.
    Violation(StatusCode, String),
}

impl StoreState {
    /// Runs one operation against the installed callbacks.
    fn dispatch(&self, operation: &str, request: StoreRequest) -> Outcome {
        let callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match operation {
            "/init" => {
                let data = match PersistentStoreData::from_all_data(&request.all_data.unwrap_or_default()) {
                    Ok(data) => data,
                    Err(message) => return Outcome::Violation(StatusCode::BAD_REQUEST, message),
                };
                self.audit(PersistentStoreQuery::Init(data.clone()));
                let Some(init) = callbacks.init else {
                    return unconfigured("Init");
                };
                injected(init(&data).map(|()| json!({})))
            }
            "/get" => {
                let kind = match parse_kind(request.kind.as_deref()) {
                    Ok(kind) => kind,
                    Err(outcome) => return outcome,
                };
                let key = request.key.unwrap_or_default();
                self.audit(PersistentStoreQuery::Get {
                    kind,
                    key: key.clone(),
                });
                let Some(get) = callbacks.get else {
                    return unconfigured("Get");
                };
                injected(get(kind, &key).map(|item| json!({ "item": item })))
            }
            "/getAll" => {
                let kind = match parse_kind(request.kind.as_deref()) {
                    Ok(kind) => kind,
                    Err(outcome) => return outcome,
                };
                self.audit(PersistentStoreQuery::GetAll {
                    kind,
                });
                let Some(get_all) = callbacks.get_all else {
                    return unconfigured("GetAll");
                };
                injected(get_all(kind).map(|items| json!({ "items": items })))
            }
            "/isInitialized" => {
                self.audit(PersistentStoreQuery::IsInitialized);
                injected((callbacks.is_initialized)().map(|result| json!({ "result": result })))
            }
            other => Outcome::Violation(StatusCode::NOT_FOUND, format!("unknown store operation {other}")),
        }
    }

    /// Appends a call to the audit queue.
    fn audit(&self, query: PersistentStoreQuery) {
        if let Err(err) = self.queries.try_record(query) {
            tracing::warn!(error = %err, "persistent store query not audited");
        }
    }
}

/// Maps a callback result to an outcome.
fn injected(result: Result<Value, String>) -> Outcome {
    match result {
        Ok(body) => Outcome::Body(body),
        Err(message) => Outcome::Injected(message),
    }
}

/// Outcome for an operation the test did not configure.
fn unconfigured(operation: &str) -> Outcome {
    Outcome::Violation(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("unexpected {operation} call: no callback configured"),
    )
}

/// Parses the kind discriminator.
fn parse_kind(raw: Option<&str>) -> Result<DataKind, Outcome> {
    let raw = raw.unwrap_or_default();
    DataKind::from_store_kind(raw)
        .ok_or_else(|| Outcome::Violation(StatusCode::BAD_REQUEST, format!("unknown kind \"{raw}\"")))
}

#[async_trait]
impl EndpointHandler for StoreState {
    async fn handle(&self, request: CapturedRequest) -> Response {
        if request.method != Method::POST {
            self.failures.protocol_violation(format!(
                "persistent store mock: unexpected {} {}",
                request.method, request.path
            ));
            return StatusCode::METHOD_NOT_ALLOWED.into_response();
        }
        let body = if request.body.is_empty() {
            Ok(StoreRequest::default())
        } else {
            serde_json::from_slice::<StoreRequest>(&request.body)
        };
        let outcome = match body {
            Ok(body) => self.dispatch(&request.path, body),
            Err(err) => Outcome::Violation(StatusCode::BAD_REQUEST, format!("body is not a store request: {err}")),
        };
        match outcome {
            Outcome::Body(body) => (StatusCode::OK, Json(body)).into_response(),
            Outcome::Injected(message) => {
                tracing::debug!(path = %request.path, %message, "injected store error");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
            Outcome::Violation(status, message) => {
                self.failures.protocol_violation(format!("persistent store mock: {message}"));
                (status, message).into_response()
            }
        }
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Persistent data-store callback service bound to one scope.
#[derive(Clone)]
pub struct PersistentStoreService {
    /// Route receiving store calls.
    endpoint: MockEndpoint,
    /// Handler state.
    state: Arc<StoreState>,
    /// Audit of every call.
    queries: Arc<CaptureQueue<PersistentStoreQuery>>,
}

impl PersistentStoreService {
    /// Starts a store with no callbacks besides `IsInitialized = true`.
    ///
    /// # Errors
    ///
    /// Fails the scope when no route can be allocated.
    pub fn start(scope: &TestScope, router: &MockEndpointRouter) -> ScopeResult<Self> {
        let runtime = router
            .runtime_handle()
            .map_err(|err| scope.fail_now(format!("persistent store mock unavailable: {err}")))?;
        let queries = Arc::new(CaptureQueue::new(router.payload_queue_capacity(), runtime));
        let state = Arc::new(StoreState {
            callbacks: Mutex::new(Callbacks {
                init: None,
                get: None,
                get_all: None,
                is_initialized: Arc::new(|| -> Result<bool, String> { Ok(true) }),
            }),
            queries: queries.sender(),
            failures: scope.failure_handle(),
        });
        let endpoint = router.open_in_scope(scope, Arc::clone(&state) as Arc<dyn EndpointHandler>)?;
        let closing = Arc::clone(&queries);
        scope.defer(move || closing.close());
        Ok(Self {
            endpoint,
            state,
            queries,
        })
    }

    /// Underlying endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &MockEndpoint {
        &self.endpoint
    }

    /// Store base URL for the SDK configuration.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.endpoint.base_url()
    }

    /// Installs the `Init` callback.
    pub fn set_init<F>(&self, callback: F)
    where
        F: Fn(&PersistentStoreData) -> Result<(), String> + Send + Sync + 'static,
    {
        self.callbacks().init = Some(Arc::new(callback));
    }

    /// Installs the `Get` callback.
    pub fn set_get<F>(&self, callback: F)
    where
        F: Fn(DataKind, &str) -> Result<Option<Value>, String> + Send + Sync + 'static,
    {
        self.callbacks().get = Some(Arc::new(callback));
    }

    /// Installs the `GetAll` callback.
    pub fn set_get_all<F>(&self, callback: F)
    where
        F: Fn(DataKind) -> Result<BTreeMap<String, Value>, String> + Send + Sync + 'static,
    {
        self.callbacks().get_all = Some(Arc::new(callback));
    }

    /// Installs the `IsInitialized` callback.
    pub fn set_is_initialized<F>(&self, callback: F)
    where
        F: Fn() -> Result<bool, String> + Send + Sync + 'static,
    {
        self.callbacks().is_initialized = Arc::new(callback);
    }

    /// Serves `data` from memory; `Init` replaces it.
    ///
    /// Returns the shared data so tests can inspect what `Init` stored.
    pub fn serve_data(&self, data: PersistentStoreData) -> Arc<RwLock<PersistentStoreData>> {
        let shared = Arc::new(RwLock::new(data));
        let (for_init, for_get, for_get_all) = (Arc::clone(&shared), Arc::clone(&shared), Arc::clone(&shared));
        self.set_init(move |data| {
            *for_init.write().unwrap_or_else(PoisonError::into_inner) = data.clone();
            Ok(())
        });
        self.set_get(move |kind, key| {
            Ok(for_get.read().unwrap_or_else(PoisonError::into_inner).item(kind, key).cloned())
        });
        self.set_get_all(move |kind| Ok(for_get_all.read().unwrap_or_else(PoisonError::into_inner).items(kind)));
        self.set_is_initialized(|| Ok(true));
        shared
    }

    /// Blocks for the next audited call, failing the scope on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] on timeout.
    pub fn expect_query(&self, scope: &TestScope, timeout: Duration) -> ScopeResult<PersistentStoreQuery> {
        self.queries.await_next(timeout).map_err(|err| {
            scope.fail_now_kind(FailureKind::Timeout, format!("expected persistent store call: {err}"))
        })
    }

    /// Returns and clears the audit log.
    #[must_use]
    pub fn take_queries(&self) -> Vec<PersistentStoreQuery> {
        self.queries.take_all()
    }

    /// Releases the route and closes the audit queue.
    pub fn close(&self) {
        self.endpoint.close();
        self.queries.close();
    }

    /// Locks the callback table.
    fn callbacks(&self) -> MutexGuard<'_, Callbacks> {
        self.state.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
