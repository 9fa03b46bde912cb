// crates/sdk-harness-mocks/src/polling.rs
// ============================================================================
// Module: Polling Mock
// Description: Stateless full-snapshot polling endpoint.
// Purpose: Serve the same fixtures as the stream over request/response.
// Dependencies: axum, sdk-harness-core
// ============================================================================

//! ## Overview
//! Every valid `GET` or `REPORT` returns the current snapshot with `200`.
//! The snapshot lives in an [`SdkDataSource`] that can be shared with a
//! [`crate::StreamingService`] so both transports serve identical data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use sdk_harness_core::FailureHandle;
use sdk_harness_core::ScopeResult;
use sdk_harness_core::TestScope;

use crate::router::CapturedRequest;
use crate::router::EndpointHandler;
use crate::router::MockEndpoint;
use crate::router::MockEndpointRouter;
use crate::sdk_data::SdkData;
use crate::sdk_data::SdkDataError;
use crate::sdk_data::SdkDataSource;
use crate::sdk_data::SdkKind;
use crate::sdk_data::Transport;
use crate::sdk_data::resolve_sdk_route;

// ============================================================================
// SECTION: Handler State
// ============================================================================

/// Polling handler state.
struct PollingState {
    /// SDK kind served.
    sdk: SdkKind,
    /// Snapshot served on every request.
    source: SdkDataSource,
    /// Failure recorder of the creating scope.
    failures: FailureHandle,
}

#[async_trait]
impl EndpointHandler for PollingState {
    async fn handle(&self, request: CapturedRequest) -> Response {
        let route = resolve_sdk_route(
            self.sdk,
            Transport::Polling,
            request.method.as_str(),
            &request.path,
            &request.body,
        );
        match route {
            Ok(context) => {
                if let Some(context) = context {
                    tracing::debug!(%context, "poll context");
                }
                (StatusCode::OK, Json(self.source.get().polling_body())).into_response()
            }
            Err(err) => {
                self.failures.protocol_violation(format!("polling mock: {err}"));
                let status = if matches!(err, SdkDataError::UnknownRoute(_)) {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_REQUEST
                };
                status.into_response()
            }
        }
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Polling flag-data service bound to one scope.
#[derive(Clone)]
pub struct PollingService {
    /// Route serving snapshots.
    endpoint: MockEndpoint,
    /// Snapshot source.
    source: SdkDataSource,
    /// SDK kind served.
    sdk: SdkKind,
}

impl PollingService {
    /// Starts a polling endpoint serving `data`.
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
            return Err(scope.fail_now(format!("polling data shape does not fit {} SDKs", sdk.label())));
        }
        Self::start_with_source(scope, router, sdk, SdkDataSource::new(data))
    }

    /// Starts a polling endpoint serving a shared snapshot.
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
        let state = Arc::new(PollingState {
            sdk,
            source: source.clone(),
            failures: scope.failure_handle(),
        });
        let endpoint = router.open_in_scope(scope, state)?;
        Ok(Self {
            endpoint,
            source,
            sdk,
        })
    }

    /// Underlying endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &MockEndpoint {
        &self.endpoint
    }

    /// Polling base URL for the SDK configuration.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.endpoint.base_url()
    }

    /// Snapshot source.
    #[must_use]
    pub fn data_source(&self) -> SdkDataSource {
        self.source.clone()
    }

    /// Blocks until the SDK polls, failing the scope on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`sdk_harness_core::ScopeExit::Failed`] on timeout.
    pub fn require_poll(&self, scope: &TestScope, timeout: Duration) -> ScopeResult<CapturedRequest> {
        self.endpoint.require_connection(scope, timeout)
    }

    /// Replaces the snapshot served from the next request on.
    ///
    /// # Errors
    ///
    /// Returns [`SdkDataError::KindMismatch`] when the shape does not fit.
    pub fn set_initial_data(&self, data: SdkData) -> Result<(), SdkDataError> {
        if !data.fits(self.sdk) {
            return Err(SdkDataError::KindMismatch(format!(
                "data shape does not fit {} SDKs",
                self.sdk.label()
            )));
        }
        self.source.set(data);
        Ok(())
    }

    /// Releases the route.
    pub fn close(&self) {
        self.endpoint.close();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
