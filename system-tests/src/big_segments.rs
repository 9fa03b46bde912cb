// system-tests/src/big_segments.rs
// ============================================================================
// Module: Reference SDK Big-Segment Client
// Description: Store-backed big-segment membership lookups.
// Purpose: Query membership once per evaluation by hashed context key.
// Dependencies: reqwest, sha2, base64
// ============================================================================

//! ## Overview
//! Membership is keyed by the base64 SHA-256 of the context key. One
//! evaluation fetches a context's membership once no matter how many
//! segment references it checks.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use serde_json::json;
use sha2::Digest;
use sha2::Sha256;

use crate::error::SdkError;

/// Hashes a context key the way the store indexes it.
#[must_use]
pub fn hash_context_key(context_key: &str) -> String {
    STANDARD.encode(Sha256::digest(context_key.as_bytes()))
}

/// Big-segment store client.
pub struct BigSegmentClient {
    /// HTTP client.
    client: reqwest::blocking::Client,
    /// Store base URL.
    base_url: String,
}

impl BigSegmentClient {
    /// Creates a client for the store at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Http`] when the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, SdkError> {
        Ok(Self {
            client: reqwest::blocking::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Last time the store was up to date, in epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError`] when the store call fails.
    pub fn last_up_to_date(&self) -> Result<Option<u64>, SdkError> {
        let body = self.call("getMetadata", &json!({}))?;
        Ok(body.get("lastUpToDate").and_then(Value::as_u64))
    }

    /// Evaluates several segment references for one context with a single
    /// membership query; unknown references yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError`] when the store call fails.
    pub fn evaluate(&self, context_key: &str, segment_refs: &[&str]) -> Result<Vec<Option<bool>>, SdkError> {
        let mut membership: Option<BTreeMap<String, bool>> = None;
        let mut results = Vec::with_capacity(segment_refs.len());
        for segment_ref in segment_refs {
            if membership.is_none() {
                membership = Some(self.membership(context_key)?);
            }
            results.push(membership.as_ref().and_then(|values| values.get(*segment_ref).copied()));
        }
        Ok(results)
    }

    /// Fetches the membership map of one context.
    fn membership(&self, context_key: &str) -> Result<BTreeMap<String, bool>, SdkError> {
        let body = self.call("getMembership", &json!({ "contextHash": hash_context_key(context_key) }))?;
        let values = body
            .get("values")
            .and_then(Value::as_object)
            .ok_or_else(|| SdkError::Protocol("membership without values".to_string()))?;
        Ok(values.iter().filter_map(|(key, value)| value.as_bool().map(|included| (key.clone(), included))).collect())
    }

    /// Posts one store call.
    fn call(&self, operation: &str, body: &Value) -> Result<Value, SdkError> {
        let url = format!("{}/{operation}", self.base_url);
        let response = self.client.post(&url).json(body).send()?;
        if !response.status().is_success() {
            return Err(SdkError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(response.json()?)
    }
}
