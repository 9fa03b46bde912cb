// crates/sdk-harness-mocks/src/persistent_store/tests.rs
// ============================================================================
// Module: Persistent Store Mock Tests
// Description: Unit tests for store callbacks, defaults, and audit.
// Purpose: Ensure unconfigured calls fail the scope and served data answers.
// Dependencies: sdk-harness-mocks, reqwest
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::time::Duration;

use sdk_harness_config::ServerConfig;
use sdk_harness_core::CapabilitySet;
use sdk_harness_core::FailureKind;
use sdk_harness_core::ScopeStatus;
use sdk_harness_core::TestRunner;
use serde_json::Value;
use serde_json::json;

use super::PersistentStoreData;
use super::PersistentStoreQuery;
use super::PersistentStoreService;
use crate::router::MockEndpointRouter;
use crate::sdk_data::DataKind;
use crate::sdk_data::FlagBuilder;

const WAIT: Duration = Duration::from_secs(2);

fn call(base_url: &str, operation: &str, body: &Value) -> (u16, Value) {
    let response = reqwest::blocking::Client::new()
        .post(format!("{base_url}/{operation}"))
        .json(body)
        .send()
        .unwrap();
    let status = response.status().as_u16();
    let text = response.text().unwrap();
    (status, serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

#[test]
fn all_data_wire_form_parses_back() {
    let data = PersistentStoreData::new()
        .with_item(DataKind::Flags, FlagBuilder::single_value("f", 1, json!(true)))
        .with_item(DataKind::Segments, json!({ "key": "s", "version": 2 }));
    let wire = data.to_all_data();
    assert_eq!(wire[0]["kind"], "features");
    assert_eq!(wire[1]["kind"], "segments");
    let parsed = PersistentStoreData::from_all_data(wire.as_array().unwrap()).unwrap();
    assert_eq!(parsed, data);
    assert!(PersistentStoreData::from_all_data(&[json!({ "kind": "flags", "items": {} })]).is_err());
}

#[test]
fn is_initialized_defaults_to_true() {
    let router = MockEndpointRouter::start(&ServerConfig::default()).unwrap();
    let report = TestRunner::new(CapabilitySet::default()).run("store", |scope| {
        let store = PersistentStoreService::start(scope, &router)?;
        let (status, body) = call(store.base_url(), "isInitialized", &json!({}));
        assert_eq!(status, 200);
        assert_eq!(body, json!({ "result": true }));
        scope.require_eq(&PersistentStoreQuery::IsInitialized, &store.expect_query(scope, WAIT)?, "query")
    });
    assert_eq!(report.status(), ScopeStatus::Passed, "{}", report.render_text());
}

#[test]
fn unconfigured_get_fails_the_scope() {
    let router = MockEndpointRouter::start(&ServerConfig::default()).unwrap();
    let report = TestRunner::new(CapabilitySet::default()).run("store", |scope| {
        let store = PersistentStoreService::start(scope, &router)?;
        let (status, _) = call(store.base_url(), "get", &json!({ "kind": "features", "key": "f" }));
        assert_eq!(status, 500);
        Ok(())
    });
    assert_eq!(report.status(), ScopeStatus::Failed);
    assert_eq!(report.root.failures[0].kind, FailureKind::ProtocolViolation);
    assert!(report.root.failures[0].message.contains("unexpected Get call"));
}

#[test]
fn served_data_answers_and_init_replaces_it() {
    let router = MockEndpointRouter::start(&ServerConfig::default()).unwrap();
    let report = TestRunner::new(CapabilitySet::default()).run("store", |scope| {
        let store = PersistentStoreService::start(scope, &router)?;
        let flag = FlagBuilder::single_value("f", 1, json!("a"));
        let shared = store.serve_data(PersistentStoreData::new().with_item(DataKind::Flags, flag.clone()));

        let (_, body) = call(store.base_url(), "get", &json!({ "kind": "features", "key": "f" }));
        assert_eq!(body, json!({ "item": flag }));
        let (_, body) = call(store.base_url(), "get", &json!({ "kind": "features", "key": "missing" }));
        assert_eq!(body, json!({ "item": null }));
        let (_, body) = call(store.base_url(), "getAll", &json!({ "kind": "segments" }));
        assert_eq!(body, json!({ "items": {} }));

        let replacement = PersistentStoreData::new().with_item(DataKind::Segments, json!({ "key": "s" }));
        let (status, _) = call(store.base_url(), "init", &json!({ "allData": replacement.to_all_data() }));
        assert_eq!(status, 200);
        assert_eq!(*shared.read().unwrap(), replacement);

        let queries = store.take_queries();
        assert_eq!(queries.len(), 4);
        assert_eq!(queries[0], PersistentStoreQuery::Get {
            kind: DataKind::Flags,
            key: "f".to_string(),
        });
        assert_eq!(queries[2], PersistentStoreQuery::GetAll {
            kind: DataKind::Segments,
        });
        assert_eq!(queries[3], PersistentStoreQuery::Init(replacement));
        Ok(())
    });
    assert_eq!(report.status(), ScopeStatus::Passed, "{}", report.render_text());
}

#[test]
fn injected_errors_are_not_harness_failures() {
    let router = MockEndpointRouter::start(&ServerConfig::default()).unwrap();
    let report = TestRunner::new(CapabilitySet::default()).run("store", |scope| {
        let store = PersistentStoreService::start(scope, &router)?;
        store.set_get_all(|_| Err("disk on fire".to_string()));
        let (status, body) = call(store.base_url(), "getAll", &json!({ "kind": "features" }));
        assert_eq!(status, 500);
        assert_eq!(body, json!("disk on fire"));
        Ok(())
    });
    assert_eq!(report.status(), ScopeStatus::Passed, "{}", report.render_text());
}
