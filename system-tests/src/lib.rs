// system-tests/src/lib.rs
// ============================================================================
// Module: Reference SDK
// Description: Minimal SDK used to drive the mock services end to end.
// Purpose: Give system-test scenarios a conforming client to observe.
// Dependencies: reqwest, flate2, serde_json
// ============================================================================

//! ## Overview
//! This crate hosts a deliberately small SDK implementation: a stream and
//! polling consumer feeding a versioned store, a buffered event processor,
//! and a big-segment membership client. Scenarios in `system-tests/tests`
//! point it at the mock services and assert on what the mocks observe.

use std::time::Duration;

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod big_segments;
pub mod error;
pub mod events;
pub mod polling;
pub mod store;
pub mod stream;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use big_segments::BigSegmentClient;
pub use error::SdkError;
pub use events::EventProcessor;
pub use polling::PollingClient;
pub use store::FlagStore;
pub use store::ItemKind;
pub use stream::StreamClient;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Credentials and headers shared by every SDK request.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// SDK key sent as the `Authorization` header.
    pub sdk_key: String,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Pre-rendered application tags header, if any.
    pub tags_header: Option<String>,
    /// Bound on individual request/response exchanges.
    pub request_timeout: Duration,
}

impl SdkConfig {
    /// Creates a config for `sdk_key` with no tags.
    #[must_use]
    pub fn new(sdk_key: &str) -> Self {
        Self {
            sdk_key: sdk_key.to_string(),
            user_agent: format!("ReferenceSdk/{}", env!("CARGO_PKG_VERSION")),
            tags_header: None,
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the application tags header.
    #[must_use]
    pub fn with_tags_header(mut self, header: Option<String>) -> Self {
        self.tags_header = header;
        self
    }

    /// Adds the common headers to a request.
    fn decorate(&self, request: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        let request = request.header("authorization", &self.sdk_key).header("user-agent", &self.user_agent);
        match &self.tags_header {
            Some(tags) => request.header("x-launchdarkly-tags", tags),
            None => request,
        }
    }
}
