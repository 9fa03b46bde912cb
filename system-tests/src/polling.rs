// system-tests/src/polling.rs
// ============================================================================
// Module: Reference SDK Polling Client
// Description: Snapshot fetcher for polling mode.
// Purpose: Initialize the store from the polling endpoint.
// Dependencies: reqwest
// ============================================================================

//! Snapshot fetcher for polling mode.

use serde_json::Value;

use crate::SdkConfig;
use crate::error::SdkError;
use crate::store::FlagStore;

/// Polling-mode data fetcher.
pub struct PollingClient {
    /// HTTP client.
    client: reqwest::blocking::Client,
    /// Snapshot URL.
    url: String,
    /// Request headers.
    config: SdkConfig,
}

impl PollingClient {
    /// Creates a client polling `{base_url}/sdk/latest-all`.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Http`] when the HTTP client cannot be built.
    pub fn new(base_url: &str, config: SdkConfig) -> Result<Self, SdkError> {
        Ok(Self {
            client: reqwest::blocking::Client::builder().timeout(config.request_timeout).build()?,
            url: format!("{}/sdk/latest-all", base_url.trim_end_matches('/')),
            config,
        })
    }

    /// Fetches one snapshot into `store`.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError`] on transport, status, or payload failures.
    pub fn poll(&self, store: &FlagStore) -> Result<(), SdkError> {
        let response = self.config.decorate(self.client.get(&self.url)).send()?;
        if !response.status().is_success() {
            return Err(SdkError::Status {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }
        let body: Value = response.json()?;
        store.init(&body)
    }
}
