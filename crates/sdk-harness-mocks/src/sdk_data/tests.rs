// crates/sdk-harness-mocks/src/sdk_data/tests.rs
// ============================================================================
// Module: SDK Data Tests
// Description: Unit tests for wire shapes and SDK route resolution.
// Purpose: Pin stream/poll payload shapes per SDK kind.
// Dependencies: sdk-harness-mocks
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::json;

use super::ClientFlagBuilder;
use super::ClientSdkData;
use super::DataKind;
use super::FlagBuilder;
use super::SdkData;
use super::SdkDataError;
use super::SdkKind;
use super::SegmentBuilder;
use super::ServerSdkData;
use super::Transport;
use super::resolve_sdk_route;
use super::stream_delete_payload;
use super::stream_patch_payload;

#[test]
fn server_put_wraps_flags_and_segments() {
    let data = SdkData::Server(
        ServerSdkData::new()
            .with_flag(FlagBuilder::single_value("f", 1, json!("a")))
            .with_segment(SegmentBuilder::new("s").included(["u1"]).build()),
    );
    let put = data.stream_put_payload();
    assert_eq!(put["path"], "/");
    assert_eq!(put["data"]["flags"]["f"]["version"], 1);
    assert_eq!(put["data"]["flags"]["f"]["variations"][0], "a");
    assert_eq!(put["data"]["segments"]["s"]["included"][0], "u1");
    assert_eq!(data.polling_body(), put["data"]);
}

#[test]
fn client_put_is_flag_map() {
    let flag = ClientFlagBuilder::new("f").version(3).value(json!(true)).variation(1);
    let data = SdkData::Client(ClientSdkData::new().with_flag(&flag));
    let put = data.stream_put_payload();
    assert_eq!(put["f"]["value"], true);
    assert_eq!(put["f"]["variation"], 1);
    assert_eq!(put["f"]["version"], 3);
    assert!(data.fits(SdkKind::Mobile));
    assert!(!data.fits(SdkKind::ServerSide));
}

#[test]
fn patch_and_delete_shapes_differ_by_kind() {
    let item = json!({ "version": 2 });
    let server = stream_patch_payload(SdkKind::ServerSide, DataKind::Segments, "s", &item).unwrap();
    assert_eq!(server, json!({ "path": "/segments/s", "data": { "version": 2 } }));
    let client = stream_patch_payload(SdkKind::JsClientSide, DataKind::Flags, "f", &item).unwrap();
    assert_eq!(client, json!({ "key": "f", "version": 2 }));

    let delete = stream_delete_payload(SdkKind::ServerSide, DataKind::Flags, "f", 9).unwrap();
    assert_eq!(delete, json!({ "path": "/flags/f", "version": 9 }));
    let client_delete = stream_delete_payload(SdkKind::Mobile, DataKind::Flags, "f", 9).unwrap();
    assert_eq!(client_delete, json!({ "key": "f", "version": 9 }));
    assert!(matches!(
        stream_delete_payload(SdkKind::Mobile, DataKind::Segments, "s", 1),
        Err(SdkDataError::KindMismatch(_))
    ));
}

#[test]
fn server_routes_carry_no_context() {
    assert_eq!(resolve_sdk_route(SdkKind::ServerSide, Transport::Streaming, "GET", "/all", b""), Ok(None));
    assert_eq!(
        resolve_sdk_route(SdkKind::ServerSide, Transport::Polling, "GET", "/sdk/latest-all", b""),
        Ok(None)
    );
    assert!(matches!(
        resolve_sdk_route(SdkKind::ServerSide, Transport::Polling, "GET", "/all", b""),
        Err(SdkDataError::UnknownRoute(_))
    ));
}

#[test]
fn client_get_routes_decode_padded_and_unpadded_contexts() {
    let context = br#"{"kind":"user","key":"u1"}"#;
    let unpadded = URL_SAFE_NO_PAD.encode(context);
    let padded = URL_SAFE.encode(context);
    let mobile = resolve_sdk_route(
        SdkKind::Mobile,
        Transport::Streaming,
        "GET",
        &format!("/meval/{unpadded}"),
        b"",
    )
    .unwrap()
    .unwrap();
    assert_eq!(mobile["key"], "u1");
    let js = resolve_sdk_route(
        SdkKind::JsClientSide,
        Transport::Polling,
        "GET",
        &format!("/sdk/evalx/env-1/contexts/{padded}"),
        b"",
    )
    .unwrap()
    .unwrap();
    assert_eq!(js["kind"], "user");
}

#[test]
fn client_report_routes_parse_body() {
    let body = br#"{"kind":"user","key":"u2"}"#;
    let context = resolve_sdk_route(SdkKind::JsClientSide, Transport::Streaming, "REPORT", "/eval/env-1", body)
        .unwrap()
        .unwrap();
    assert_eq!(context["key"], "u2");
    assert!(matches!(
        resolve_sdk_route(SdkKind::Mobile, Transport::Polling, "REPORT", "/msdk/evalx/context", b"[1]"),
        Err(SdkDataError::Context(_))
    ));
}

#[test]
fn malformed_context_segment_is_rejected() {
    assert!(matches!(
        resolve_sdk_route(SdkKind::Mobile, Transport::Streaming, "GET", "/meval/!!!", b""),
        Err(SdkDataError::Context(_))
    ));
}

#[test]
fn segment_builder_marks_big_segments() {
    let segment = SegmentBuilder::new("big").unbounded(4);
    assert_eq!(segment.big_segment_ref().as_deref(), Some("big.g4"));
    let item = segment.build();
    assert_eq!(item["unbounded"], true);
    assert_eq!(item["generation"], 4);
    assert!(SegmentBuilder::new("small").big_segment_ref().is_none());
}

#[test]
fn store_kind_round_trips() {
    for kind in [DataKind::Flags, DataKind::Segments] {
        assert_eq!(DataKind::from_store_kind(kind.store_kind()), Some(kind));
    }
    assert_eq!(DataKind::from_store_kind("flags"), None);
}
