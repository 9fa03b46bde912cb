// crates/sdk-harness-mocks/src/router/tests.rs
// ============================================================================
// Module: Mock Router Tests
// Description: Unit tests for endpoint minting, dispatch, and release.
// Purpose: Ensure routes are unique, recorded, and released on close.
// Dependencies: sdk-harness-mocks, reqwest
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use sdk_harness_config::ServerConfig;
use sdk_harness_core::CapabilitySet;
use sdk_harness_core::ScopeStatus;
use sdk_harness_core::TestRunner;

use super::CapturedRequest;
use super::EndpointHandler;
use super::MockEndpointRouter;
use super::split_endpoint_path;
use crate::capture::CaptureError;

struct Teapot;

#[async_trait]
impl EndpointHandler for Teapot {
    async fn handle(&self, request: CapturedRequest) -> Response {
        (StatusCode::IM_A_TEAPOT, request.path).into_response()
    }
}

fn router() -> MockEndpointRouter {
    MockEndpointRouter::start(&ServerConfig::default()).unwrap()
}

#[test]
fn split_endpoint_path_strips_prefix() {
    assert_eq!(split_endpoint_path("/endpoints/3/all"), Some((3, "/all".to_string())));
    assert_eq!(split_endpoint_path("/endpoints/3"), Some((3, "/".to_string())));
    assert_eq!(split_endpoint_path("/endpoints/x/all"), None);
    assert_eq!(split_endpoint_path("/other/3/all"), None);
}

#[test]
fn endpoints_get_distinct_base_urls() {
    let router = router();
    let first = router.new_endpoint(Arc::new(Teapot)).unwrap();
    let second = router.new_endpoint(Arc::new(Teapot)).unwrap();
    assert_ne!(first.id(), second.id());
    assert_ne!(first.base_url(), second.base_url());
    assert!(first.base_url().starts_with("http://127.0.0.1:"));
    assert_eq!(router.open_endpoints(), 2);
}

#[test]
fn requests_are_dispatched_and_recorded() {
    let router = router();
    let endpoint = router.new_endpoint(Arc::new(Teapot)).unwrap();
    let response = reqwest::blocking::Client::new()
        .post(format!("{}/bulk?x=1", endpoint.base_url()))
        .header("X-Custom", "yes")
        .body("payload")
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 418);
    assert_eq!(response.text().unwrap(), "/bulk");

    let request = endpoint.await_connection(Duration::from_secs(2)).unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/bulk");
    assert_eq!(request.query.as_deref(), Some("x=1"));
    assert_eq!(request.header("x-custom"), Some("yes"));
    assert_eq!(&request.body[..], b"payload");
}

#[test]
fn bodies_beyond_axum_default_limit_are_recorded() {
    let router = router();
    let endpoint = router.new_endpoint(Arc::new(Teapot)).unwrap();
    let body = vec![b'x'; 3 * 1024 * 1024];
    let response = reqwest::blocking::Client::new()
        .post(format!("{}/bulk", endpoint.base_url()))
        .body(body.clone())
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 418);

    let request = endpoint.await_connection(Duration::from_secs(2)).unwrap();
    let recorded: bytes::Bytes = request.body;
    assert_eq!(recorded.len(), body.len());
}

#[test]
fn closed_endpoint_returns_not_found() {
    let router = router();
    let endpoint = router.new_endpoint(Arc::new(Teapot)).unwrap();
    let url = format!("{}/all", endpoint.base_url());
    endpoint.close();
    endpoint.close();
    assert!(endpoint.is_closed());
    assert_eq!(router.open_endpoints(), 0);
    let response = reqwest::blocking::get(url).unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(endpoint.await_connection(Duration::from_millis(50)).unwrap_err(), CaptureError::Closed);
}

#[test]
fn await_connection_times_out() {
    let router = router();
    let endpoint = router.new_endpoint(Arc::new(Teapot)).unwrap();
    assert_eq!(
        endpoint.await_connection(Duration::from_millis(30)).unwrap_err(),
        CaptureError::Timeout(30)
    );
}

#[test]
fn close_on_exit_releases_route_with_scope() {
    let router = router();
    let mut base_url = String::new();
    let report = TestRunner::new(CapabilitySet::default()).run("suite", |scope| {
        let endpoint = router.new_endpoint(Arc::new(Teapot)).unwrap();
        endpoint.close_on_exit(scope);
        base_url = endpoint.base_url().to_string();
        Ok(())
    });
    assert_eq!(report.status(), ScopeStatus::Passed);
    assert_eq!(router.open_endpoints(), 0);
    let response = reqwest::blocking::get(format!("{base_url}/all")).unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[test]
fn require_connection_fails_scope_on_timeout() {
    let router = router();
    let report = TestRunner::new(CapabilitySet::default()).run("suite", |scope| {
        let endpoint = router.new_endpoint(Arc::new(Teapot)).unwrap();
        endpoint.close_on_exit(scope);
        endpoint.require_connection(scope, Duration::from_millis(20))?;
        Ok(())
    });
    assert_eq!(report.status(), ScopeStatus::Failed);
    assert!(report.root.failures[0].message.contains("no request"));
}

#[test]
fn dropped_router_wakes_endpoint_waits() {
    let router = router();
    let endpoint = router.new_endpoint(Arc::new(Teapot)).unwrap();
    drop(router);
    assert_eq!(endpoint.await_connection(Duration::from_secs(5)).unwrap_err(), CaptureError::Closed);
}
