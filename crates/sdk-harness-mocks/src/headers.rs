// crates/sdk-harness-mocks/src/headers.rs
// ============================================================================
// Module: Protocol Headers
// Description: Header names and lookup helpers shared by the mocks.
// Purpose: Keep wire header spelling in one place.
// Dependencies: axum
// ============================================================================

//! Header names and lookup helpers shared by the mocks.

use axum::http::HeaderMap;

/// Application tags header.
pub const TAGS_HEADER: &str = "x-launchdarkly-tags";
/// Analytics payload identifier header.
pub const PAYLOAD_ID_HEADER: &str = "x-launchdarkly-payload-id";
/// Analytics event schema version header.
pub const EVENT_SCHEMA_HEADER: &str = "x-launchdarkly-event-schema";
/// Credential header for server-side and mobile SDKs.
pub const AUTHORIZATION_HEADER: &str = "authorization";
/// Compression header.
pub const CONTENT_ENCODING_HEADER: &str = "content-encoding";
/// SDK identification header.
pub const USER_AGENT_HEADER: &str = "user-agent";

/// Returns the first value of a header as UTF-8, if present and valid.
#[must_use]
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Returns every UTF-8 value of a header in arrival order.
#[must_use]
pub fn header_values<'a>(headers: &'a HeaderMap, name: &str) -> Vec<&'a str> {
    headers.get_all(name).iter().filter_map(|value| value.to_str().ok()).collect()
}
