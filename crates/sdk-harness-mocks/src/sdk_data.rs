// crates/sdk-harness-mocks/src/sdk_data.rs
// ============================================================================
// Module: SDK Data Model
// Description: Flag/segment fixtures, wire shapes, and SDK endpoint routes.
// Purpose: Serve identical fixtures over streaming and polling transports.
// Dependencies: base64, serde, serde_json
// ============================================================================

//! ## Overview
//! Server-side SDKs receive raw flag and segment items and evaluate locally.
//! Client-side SDKs (mobile and JavaScript) receive already-evaluated flag
//! results for one context. [`SdkData`] holds either shape; the streaming and
//! polling mocks render it through the functions here so both transports
//! serve byte-identical fixtures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::DecodePaddingMode;
use base64::engine::GeneralPurpose;
use base64::engine::general_purpose;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Base64url engine accepting padded and unpadded input.
const CONTEXT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    general_purpose::NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ============================================================================
// SECTION: Kinds
// ============================================================================

/// Family of SDK under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdkKind {
    /// Server-side SDK evaluating raw flag data.
    ServerSide,
    /// Mobile client-side SDK.
    Mobile,
    /// JavaScript client-side SDK.
    JsClientSide,
}

impl SdkKind {
    /// Returns true for client-side kinds.
    #[must_use]
    pub const fn is_client_side(self) -> bool {
        !matches!(self, Self::ServerSide)
    }

    /// Stable label for logs and messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ServerSide => "server-side",
            Self::Mobile => "mobile",
            Self::JsClientSide => "js-client-side",
        }
    }
}

/// Kind of data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Feature flags.
    Flags,
    /// User/context segments.
    Segments,
}

impl DataKind {
    /// Path namespace used in stream patch/delete events.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Flags => "flags",
            Self::Segments => "segments",
        }
    }

    /// Discriminator used by the persistent-store protocol.
    #[must_use]
    pub const fn store_kind(self) -> &'static str {
        match self {
            Self::Flags => "features",
            Self::Segments => "segments",
        }
    }

    /// Parses a persistent-store discriminator.
    #[must_use]
    pub fn from_store_kind(raw: &str) -> Option<Self> {
        match raw {
            "features" => Some(Self::Flags),
            "segments" => Some(Self::Segments),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// SDK data and routing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkDataError {
    /// Request did not match any route for the SDK kind.
    #[error("no route for {0}")]
    UnknownRoute(String),
    /// Evaluation context was missing or malformed.
    #[error("invalid context: {0}")]
    Context(String),
    /// Data shape does not fit the SDK kind.
    #[error("data kind mismatch: {0}")]
    KindMismatch(String),
}

// ============================================================================
// SECTION: Data Sets
// ============================================================================

/// Raw flag and segment items for server-side SDKs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSdkData {
    /// Flag items keyed by flag key.
    #[serde(default)]
    pub flags: BTreeMap<String, Value>,
    /// Segment items keyed by segment key.
    #[serde(default)]
    pub segments: BTreeMap<String, Value>,
}

impl ServerSdkData {
    /// Creates an empty data set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a flag item, keyed by its `key` property.
    #[must_use]
    pub fn with_flag(mut self, flag: Value) -> Self {
        self.flags.insert(item_key(&flag), flag);
        self
    }

    /// Adds a segment item, keyed by its `key` property.
    #[must_use]
    pub fn with_segment(mut self, segment: Value) -> Self {
        self.segments.insert(item_key(&segment), segment);
        self
    }

    /// Returns the items of one kind.
    #[must_use]
    pub const fn items(&self, kind: DataKind) -> &BTreeMap<String, Value> {
        match kind {
            DataKind::Flags => &self.flags,
            DataKind::Segments => &self.segments,
        }
    }
}

/// Evaluated flag results for client-side SDKs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientSdkData {
    /// Evaluation results keyed by flag key.
    #[serde(default)]
    pub flags: BTreeMap<String, Value>,
}

impl ClientSdkData {
    /// Creates an empty data set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an evaluated flag result.
    #[must_use]
    pub fn with_flag(mut self, flag: &ClientFlagBuilder) -> Self {
        self.flags.insert(flag.key.clone(), flag.build());
        self
    }
}

/// Data served to one SDK kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SdkData {
    /// Server-side shape.
    Server(ServerSdkData),
    /// Client-side shape.
    Client(ClientSdkData),
}

impl SdkData {
    /// Returns an empty data set of the shape the SDK kind expects.
    #[must_use]
    pub fn empty(kind: SdkKind) -> Self {
        if kind.is_client_side() {
            Self::Client(ClientSdkData::new())
        } else {
            Self::Server(ServerSdkData::new())
        }
    }

    /// Returns true when the shape fits the SDK kind.
    #[must_use]
    pub const fn fits(&self, kind: SdkKind) -> bool {
        matches!((self, kind.is_client_side()), (Self::Server(_), false) | (Self::Client(_), true))
    }

    /// Full-snapshot body served by polling endpoints.
    #[must_use]
    pub fn polling_body(&self) -> Value {
        match self {
            Self::Server(data) => json!({ "flags": data.flags, "segments": data.segments }),
            Self::Client(data) => json!(data.flags),
        }
    }

    /// `data:` payload of a stream `put` event.
    #[must_use]
    pub fn stream_put_payload(&self) -> Value {
        match self {
            Self::Server(_) => json!({ "path": "/", "data": self.polling_body() }),
            Self::Client(_) => self.polling_body(),
        }
    }
}

/// Returns the `key` property of an item, or an empty key.
fn item_key(item: &Value) -> String {
    item.get("key").and_then(Value::as_str).unwrap_or_default().to_string()
}

/// `data:` payload of a stream `patch` event.
///
/// # Errors
///
/// Returns [`SdkDataError::KindMismatch`] for segment patches to client SDKs.
pub fn stream_patch_payload(
    sdk: SdkKind,
    kind: DataKind,
    key: &str,
    item: &Value,
) -> Result<Value, SdkDataError> {
    if sdk.is_client_side() {
        require_flags(kind)?;
        let mut object = item.as_object().cloned().unwrap_or_else(Map::new);
        object.insert("key".to_string(), Value::String(key.to_string()));
        return Ok(Value::Object(object));
    }
    Ok(json!({ "path": format!("/{}/{key}", kind.namespace()), "data": item }))
}

/// `data:` payload of a stream `delete` event.
///
/// # Errors
///
/// Returns [`SdkDataError::KindMismatch`] for segment deletes to client SDKs.
pub fn stream_delete_payload(
    sdk: SdkKind,
    kind: DataKind,
    key: &str,
    version: u64,
) -> Result<Value, SdkDataError> {
    if sdk.is_client_side() {
        require_flags(kind)?;
        return Ok(json!({ "key": key, "version": version }));
    }
    Ok(json!({ "path": format!("/{}/{key}", kind.namespace()), "version": version }))
}

/// Rejects non-flag data for client-side SDKs.
fn require_flags(kind: DataKind) -> Result<(), SdkDataError> {
    if kind == DataKind::Flags {
        Ok(())
    } else {
        Err(SdkDataError::KindMismatch("client-side SDKs only receive flags".to_string()))
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builder for server-side flag items.
#[derive(Debug, Clone)]
pub struct FlagBuilder {
    /// Flag key.
    key: String,
    /// Item version.
    version: u64,
    /// Targeting switch.
    on: bool,
    /// Variation values.
    variations: Vec<Value>,
    /// Variation served when on.
    fallthrough_variation: usize,
    /// Variation served when off.
    off_variation: usize,
    /// Tombstone marker.
    deleted: bool,
}

impl FlagBuilder {
    /// Starts a flag that is off and has no variations.
    #[must_use]
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            version: 1,
            on: false,
            variations: Vec::new(),
            fallthrough_variation: 0,
            off_variation: 0,
            deleted: false,
        }
    }

    /// Builds a flag that serves `value` to everyone.
    #[must_use]
    pub fn single_value(key: &str, version: u64, value: Value) -> Value {
        Self::new(key).version(version).on(true).variations(vec![value]).build()
    }

    /// Sets the item version.
    #[must_use]
    pub const fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Sets the targeting switch.
    #[must_use]
    pub const fn on(mut self, on: bool) -> Self {
        self.on = on;
        self
    }

    /// Sets the variation values.
    #[must_use]
    pub fn variations(mut self, variations: Vec<Value>) -> Self {
        self.variations = variations;
        self
    }

    /// Sets the fallthrough variation index.
    #[must_use]
    pub const fn fallthrough_variation(mut self, index: usize) -> Self {
        self.fallthrough_variation = index;
        self
    }

    /// Sets the off variation index.
    #[must_use]
    pub const fn off_variation(mut self, index: usize) -> Self {
        self.off_variation = index;
        self
    }

    /// Marks the item as a deletion tombstone.
    #[must_use]
    pub const fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Renders the flag item.
    #[must_use]
    pub fn build(&self) -> Value {
        json!({
            "key": self.key,
            "version": self.version,
            "on": self.on,
            "variations": self.variations,
            "fallthrough": { "variation": self.fallthrough_variation },
            "offVariation": self.off_variation,
            "targets": [],
            "rules": [],
            "prerequisites": [],
            "salt": "",
            "trackEvents": false,
            "deleted": self.deleted,
        })
    }
}

/// Builder for server-side segment items.
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    /// Segment key.
    key: String,
    /// Item version.
    version: u64,
    /// Explicitly included context keys.
    included: Vec<String>,
    /// Explicitly excluded context keys.
    excluded: Vec<String>,
    /// Big-segment generation; `Some` marks the segment unbounded.
    generation: Option<u64>,
    /// Tombstone marker.
    deleted: bool,
}

impl SegmentBuilder {
    /// Starts an empty segment.
    #[must_use]
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            version: 1,
            included: Vec::new(),
            excluded: Vec::new(),
            generation: None,
            deleted: false,
        }
    }

    /// Sets the item version.
    #[must_use]
    pub const fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Adds included context keys.
    #[must_use]
    pub fn included<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Adds excluded context keys.
    #[must_use]
    pub fn excluded<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Marks the segment as a big segment of the given generation.
    #[must_use]
    pub const fn unbounded(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Marks the item as a deletion tombstone.
    #[must_use]
    pub const fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Segment reference used by big-segment membership maps.
    ///
    /// Returns `None` for bounded segments.
    #[must_use]
    pub fn big_segment_ref(&self) -> Option<String> {
        self.generation.map(|generation| format!("{}.g{generation}", self.key))
    }

    /// Renders the segment item.
    #[must_use]
    pub fn build(&self) -> Value {
        let mut item = json!({
            "key": self.key,
            "version": self.version,
            "included": self.included,
            "excluded": self.excluded,
            "rules": [],
            "salt": "",
            "deleted": self.deleted,
        });
        if let (Some(generation), Some(object)) = (self.generation, item.as_object_mut()) {
            object.insert("unbounded".to_string(), Value::Bool(true));
            object.insert("generation".to_string(), json!(generation));
        }
        item
    }
}

/// Builder for client-side evaluated flag results.
#[derive(Debug, Clone)]
pub struct ClientFlagBuilder {
    /// Flag key.
    key: String,
    /// Item version.
    version: u64,
    /// Evaluated value.
    value: Value,
    /// Evaluated variation index.
    variation: Option<usize>,
    /// Whether full events are tracked.
    track_events: bool,
}

impl ClientFlagBuilder {
    /// Starts a result serving `null`.
    #[must_use]
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            version: 1,
            value: Value::Null,
            variation: None,
            track_events: false,
        }
    }

    /// Sets the item version.
    #[must_use]
    pub const fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Sets the evaluated value.
    #[must_use]
    pub fn value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    /// Sets the evaluated variation index.
    #[must_use]
    pub const fn variation(mut self, index: usize) -> Self {
        self.variation = Some(index);
        self
    }

    /// Enables full event tracking.
    #[must_use]
    pub const fn track_events(mut self, track: bool) -> Self {
        self.track_events = track;
        self
    }

    /// Returns the flag key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Renders the evaluated result.
    #[must_use]
    pub fn build(&self) -> Value {
        let mut item = json!({
            "version": self.version,
            "flagVersion": self.version,
            "value": self.value,
            "trackEvents": self.track_events,
        });
        if let (Some(variation), Some(object)) = (self.variation, item.as_object_mut()) {
            object.insert("variation".to_string(), json!(variation));
        }
        item
    }
}

// ============================================================================
// SECTION: Shared Source
// ============================================================================

/// Lock-guarded current snapshot shared between transports.
#[derive(Debug, Clone)]
pub struct SdkDataSource {
    /// Current snapshot.
    inner: Arc<RwLock<SdkData>>,
}

impl SdkDataSource {
    /// Creates a source holding `data`.
    #[must_use]
    pub fn new(data: SdkData) -> Self {
        Self {
            inner: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn get(&self) -> SdkData {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replaces the snapshot.
    pub fn set(&self, data: SdkData) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = data;
    }
}

// ============================================================================
// SECTION: Routes
// ============================================================================

/// Transport an SDK request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Server-sent events stream.
    Streaming,
    /// Snapshot polling.
    Polling,
}

/// Resolves an SDK data request and extracts its evaluation context.
///
/// Server-side routes carry no context and yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`SdkDataError::UnknownRoute`] for paths the SDK kind never
/// requests and [`SdkDataError::Context`] for malformed contexts.
pub fn resolve_sdk_route(
    sdk: SdkKind,
    transport: Transport,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<Option<Value>, SdkDataError> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (sdk, transport, method, segments.as_slice()) {
        (SdkKind::ServerSide, Transport::Streaming, "GET", ["all"])
        | (SdkKind::ServerSide, Transport::Polling, "GET", ["sdk", "latest-all"]) => Ok(None),
        (SdkKind::Mobile, Transport::Streaming, "GET", ["meval", context])
        | (SdkKind::JsClientSide, Transport::Streaming, "GET", ["eval", _, context])
        | (SdkKind::Mobile, Transport::Polling, "GET", ["msdk", "evalx", "contexts", context])
        | (SdkKind::JsClientSide, Transport::Polling, "GET", ["sdk", "evalx", _, "contexts", context]) => {
            decode_context(context).map(Some)
        }
        (SdkKind::Mobile, Transport::Streaming, "REPORT", ["meval"])
        | (SdkKind::JsClientSide, Transport::Streaming, "REPORT", ["eval", _])
        | (SdkKind::Mobile, Transport::Polling, "REPORT", ["msdk", "evalx", "context"])
        | (SdkKind::JsClientSide, Transport::Polling, "REPORT", ["sdk", "evalx", _, "context"]) => {
            parse_context(body).map(Some)
        }
        _ => Err(SdkDataError::UnknownRoute(format!("{method} {path}"))),
    }
}

/// Decodes a base64url context path segment.
///
/// # Errors
///
/// Returns [`SdkDataError::Context`] when decoding or parsing fails.
pub fn decode_context(segment: &str) -> Result<Value, SdkDataError> {
    let bytes = CONTEXT_ENGINE
        .decode(segment)
        .map_err(|err| SdkDataError::Context(format!("base64url: {err}")))?;
    parse_context(&bytes)
}

/// Parses a JSON context object.
fn parse_context(bytes: &[u8]) -> Result<Value, SdkDataError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|err| SdkDataError::Context(format!("json: {err}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(SdkDataError::Context("context must be a JSON object".to_string()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
