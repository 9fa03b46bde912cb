// crates/sdk-harness-mocks/src/big_segments.rs
// ============================================================================
// Module: Big-Segment Store Mock
// Description: Metadata and membership callbacks for big-segment stores.
// Purpose: Audit exactly which store queries an SDK makes and when.
// Dependencies: axum, serde, sha2, base64, sdk-harness-core
// ============================================================================

//! ## Overview
//! The mock holds no segment state. Test code installs responder functions
//! for the two store operations; the mock answers with their result and
//! appends each call to an audit queue. Metadata polls also post a signal so
//! tests can wait for the SDK's background poller without racing it.
//!
//! Responder errors are injected backend failures and are answered with
//! `500`; they are not harness failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use axum::Json;
use axum::http::Method;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sdk_harness_core::FailureHandle;
use sdk_harness_core::FailureKind;
use sdk_harness_core::ScopeResult;
use sdk_harness_core::TestScope;
use serde::Deserialize;
use serde_json::json;
use sha2::Digest;
use sha2::Sha256;

use crate::capture::CaptureError;
use crate::capture::CaptureQueue;
use crate::capture::CaptureSender;
use crate::router::CapturedRequest;
use crate::router::EndpointHandler;
use crate::router::MockEndpoint;
use crate::router::MockEndpointRouter;

// ============================================================================
// SECTION: Responders
// ============================================================================

/// Metadata responder: last up-to-date time in epoch milliseconds.
pub type MetadataFn = Arc<dyn Fn() -> Result<Option<u64>, String> + Send + Sync>;

/// Membership responder: segment reference to inclusion for a context hash.
pub type MembershipFn = Arc<dyn Fn(&str) -> Result<BTreeMap<String, bool>, String> + Send + Sync>;

/// Wraps a closure as a metadata responder.
#[must_use]
pub fn metadata_fn<F>(responder: F) -> MetadataFn
where
    F: Fn() -> Result<Option<u64>, String> + Send + Sync + 'static,
{
    Arc::new(responder)
}

/// Wraps a closure as a membership responder.
#[must_use]
pub fn membership_fn<F>(responder: F) -> MembershipFn
where
    F: Fn(&str) -> Result<BTreeMap<String, bool>, String> + Send + Sync + 'static,
{
    Arc::new(responder)
}

/// Milliseconds since the Unix epoch for `at`.
fn epoch_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Reports the store as updated at the moment of each poll.
#[must_use]
pub fn metadata_up_to_date() -> MetadataFn {
    metadata_fn(|| Ok(Some(epoch_millis(SystemTime::now()))))
}

/// Reports the store as last updated `age` before each poll.
#[must_use]
pub fn metadata_stale(age: Duration) -> MetadataFn {
    metadata_fn(move || {
        let at = SystemTime::now().checked_sub(age).unwrap_or(UNIX_EPOCH);
        Ok(Some(epoch_millis(at)))
    })
}

/// Reports that the store has never been updated.
#[must_use]
pub fn metadata_unavailable() -> MetadataFn {
    metadata_fn(|| Ok(None))
}

/// Fails every metadata poll with `message`.
#[must_use]
pub fn metadata_error(message: &str) -> MetadataFn {
    let message = message.to_string();
    metadata_fn(move || Err(message.clone()))
}

/// Serves fixed memberships keyed by context hash; unknown hashes are empty.
#[must_use]
pub fn membership_map(memberships: BTreeMap<String, BTreeMap<String, bool>>) -> MembershipFn {
    membership_fn(move |hash| Ok(memberships.get(hash).cloned().unwrap_or_default()))
}

/// Hash under which an SDK queries memberships for a context key.
#[must_use]
pub fn context_hash(context_key: &str) -> String {
    STANDARD.encode(Sha256::digest(context_key.as_bytes()))
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// One store call made by the SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BigSegmentQuery {
    /// Metadata poll.
    Metadata,
    /// Membership lookup.
    Membership {
        /// Queried context hash.
        context_hash: String,
    },
}

/// Membership request body.
#[derive(Debug, Deserialize)]
struct MembershipRequest {
    /// Queried context hash.
    #[serde(rename = "contextHash")]
    context_hash: String,
}

// ============================================================================
// SECTION: Handler State
// ============================================================================

/// Big-segment handler state.
struct BigSegmentState {
    /// Current metadata responder.
    metadata: Mutex<MetadataFn>,
    /// Current membership responder.
    membership: Mutex<MembershipFn>,
    /// Audit producer.
    queries: CaptureSender<BigSegmentQuery>,
    /// Membership lookup producer.
    membership_queries: CaptureSender<String>,
    /// Metadata poll signal producer.
    metadata_polled: CaptureSender<()>,
    /// Failure recorder of the creating scope.
    failures: FailureHandle,
}

impl BigSegmentState {
    /// Appends a call to the audit queue.
    fn audit(&self, query: BigSegmentQuery) {
        if let Err(err) = self.queries.try_record(query) {
            tracing::warn!(error = %err, "big segment query not audited");
        }
    }

    /// Answers a metadata poll.
    fn get_metadata(&self) -> Response {
        self.audit(BigSegmentQuery::Metadata);
        let _ = self.metadata_polled.try_record(());
        let responder = Arc::clone(&self.metadata.lock().unwrap_or_else(PoisonError::into_inner));
        match responder() {
            Ok(last_up_to_date) => (StatusCode::OK, Json(json!({ "lastUpToDate": last_up_to_date }))).into_response(),
            Err(message) => {
                tracing::debug!(%message, "injected metadata error");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }

    /// Answers a membership lookup.
    fn get_membership(&self, request: &CapturedRequest) -> Response {
        let parsed: MembershipRequest = match serde_json::from_slice(&request.body) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.failures.protocol_violation(format!("big segment mock: membership body invalid: {err}"));
                return StatusCode::BAD_REQUEST.into_response();
            }
        };
        tracing::debug!(context_hash = %parsed.context_hash, "membership query");
        self.audit(BigSegmentQuery::Membership {
            context_hash: parsed.context_hash.clone(),
        });
        if let Err(err) = self.membership_queries.try_record(parsed.context_hash.clone()) {
            tracing::warn!(error = %err, "membership query not recorded");
        }
        let responder = Arc::clone(&self.membership.lock().unwrap_or_else(PoisonError::into_inner));
        match responder(&parsed.context_hash) {
            Ok(values) => (StatusCode::OK, Json(json!({ "values": values }))).into_response(),
            Err(message) => {
                tracing::debug!(%message, "injected membership error");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

#[async_trait]
impl EndpointHandler for BigSegmentState {
    async fn handle(&self, request: CapturedRequest) -> Response {
        match (&request.method, request.path.as_str()) {
            (&Method::POST, "/getMetadata") => self.get_metadata(),
            (&Method::POST, "/getMembership") => self.get_membership(&request),
            (method, path) => {
                self.failures.protocol_violation(format!("big segment mock: unexpected {method} {path}"));
                StatusCode::NOT_FOUND.into_response()
            }
        }
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Big-segment store callback service bound to one scope.
#[derive(Clone)]
pub struct BigSegmentStoreService {
    /// Route receiving store calls.
    endpoint: MockEndpoint,
    /// Handler state.
    state: Arc<BigSegmentState>,
    /// Audit of every call.
    queries: Arc<CaptureQueue<BigSegmentQuery>>,
    /// Membership lookups awaiting `expect_membership_query`.
    membership_queries: Arc<CaptureQueue<String>>,
    /// Metadata poll signals.
    metadata_polled: Arc<CaptureQueue<()>>,
}

impl BigSegmentStoreService {
    /// Starts a store reporting up-to-date metadata and empty memberships.
    ///
    /// # Errors
    ///
    /// Fails the scope when no route can be allocated.
    pub fn start(scope: &TestScope, router: &MockEndpointRouter) -> ScopeResult<Self> {
        let runtime = router
            .runtime_handle()
            .map_err(|err| scope.fail_now(format!("big segment mock unavailable: {err}")))?;
        let capacity = router.payload_queue_capacity();
        let queries = Arc::new(CaptureQueue::new(capacity, runtime.clone()));
        let membership_queries = Arc::new(CaptureQueue::new(capacity, runtime.clone()));
        let metadata_polled = Arc::new(CaptureQueue::new(capacity, runtime));
        let state = Arc::new(BigSegmentState {
            metadata: Mutex::new(metadata_up_to_date()),
            membership: Mutex::new(membership_map(BTreeMap::new())),
            queries: queries.sender(),
            membership_queries: membership_queries.sender(),
            metadata_polled: metadata_polled.sender(),
            failures: scope.failure_handle(),
        });
        let endpoint = router.open_in_scope(scope, Arc::clone(&state) as Arc<dyn EndpointHandler>)?;
        let closing = (Arc::clone(&queries), Arc::clone(&membership_queries), Arc::clone(&metadata_polled));
        scope.defer(move || {
            closing.0.close();
            closing.1.close();
            closing.2.close();
        });
        Ok(Self {
            endpoint,
            state,
            queries,
            membership_queries,
            metadata_polled,
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

    /// Replaces the metadata responder.
    pub fn set_metadata(&self, responder: MetadataFn) {
        *self.state.metadata.lock().unwrap_or_else(PoisonError::into_inner) = responder;
    }

    /// Replaces the membership responder.
    pub fn set_membership(&self, responder: MembershipFn) {
        *self.state.membership.lock().unwrap_or_else(PoisonError::into_inner) = responder;
    }

    /// Blocks until the SDK polls metadata, failing the scope on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] on timeout.
    pub fn expect_metadata_poll(&self, scope: &TestScope, timeout: Duration) -> ScopeResult {
        self.metadata_polled.await_next(timeout).map_err(|err| {
            scope.fail_now_kind(FailureKind::Timeout, format!("expected big segment metadata poll: {err}"))
        })
    }

    /// Blocks for the next membership lookup, failing the scope on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] on timeout.
    pub fn expect_membership_query(&self, scope: &TestScope, timeout: Duration) -> ScopeResult<String> {
        self.membership_queries.await_next(timeout).map_err(|err| {
            scope.fail_now_kind(FailureKind::Timeout, format!("expected big segment membership query: {err}"))
        })
    }

    /// Fails the scope if a membership lookup arrives within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] when a lookup arrived.
    pub fn expect_no_membership_query(&self, scope: &TestScope, timeout: Duration) -> ScopeResult {
        match self.membership_queries.await_next(timeout) {
            Ok(hash) => Err(scope.fail_now(format!("unexpected big segment membership query for {hash}"))),
            Err(CaptureError::Timeout(_) | CaptureError::Closed | CaptureError::Full) => Ok(()),
        }
    }

    /// Number of unread audited membership lookups for `context_hash`.
    #[must_use]
    pub fn membership_query_count(&self, context_hash: &str) -> usize {
        self.queries
            .peek_all()
            .iter()
            .filter(|query| {
                matches!(query, BigSegmentQuery::Membership { context_hash: hash } if hash == context_hash)
            })
            .count()
    }

    /// Returns and clears the audit log.
    #[must_use]
    pub fn take_queries(&self) -> Vec<BigSegmentQuery> {
        self.queries.take_all()
    }

    /// Releases the route and closes the audit queues.
    pub fn close(&self) {
        self.endpoint.close();
        self.queries.close();
        self.membership_queries.close();
        self.metadata_polled.close();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
