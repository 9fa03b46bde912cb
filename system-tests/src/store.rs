// system-tests/src/store.rs
// ============================================================================
// Module: Reference SDK Store
// Description: Versioned in-memory flag and segment store with evaluation.
// Purpose: Apply stream and poll data the way a conforming SDK does.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Items are replaced only by strictly newer versions, and deletions leave a
//! versioned tombstone so a stale patch cannot resurrect a deleted item.
//! Evaluation is deliberately minimal: the fallthrough variation when the
//! flag is on, the off variation otherwise.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use serde_json::Value;
use serde_json::json;

use crate::error::SdkError;

/// Item namespace within the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Feature flags.
    Flags,
    /// Segments.
    Segments,
}

impl ItemKind {
    /// Parses a stream path namespace.
    #[must_use]
    pub fn from_namespace(raw: &str) -> Option<Self> {
        match raw {
            "flags" => Some(Self::Flags),
            "segments" => Some(Self::Segments),
            _ => None,
        }
    }
}

/// Store contents.
#[derive(Debug, Default)]
struct StoreState {
    /// Set once a full data set was received.
    initialized: bool,
    /// Flag items by key.
    flags: BTreeMap<String, Value>,
    /// Segment items by key.
    segments: BTreeMap<String, Value>,
}

impl StoreState {
    /// Items of one kind.
    const fn items(&self, kind: ItemKind) -> &BTreeMap<String, Value> {
        match kind {
            ItemKind::Flags => &self.flags,
            ItemKind::Segments => &self.segments,
        }
    }

    /// Mutable items of one kind.
    const fn items_mut(&mut self, kind: ItemKind) -> &mut BTreeMap<String, Value> {
        match kind {
            ItemKind::Flags => &mut self.flags,
            ItemKind::Segments => &mut self.segments,
        }
    }
}

/// Shared versioned store.
#[derive(Debug, Clone, Default)]
pub struct FlagStore {
    /// Store contents.
    inner: Arc<RwLock<StoreState>>,
}

impl FlagStore {
    /// Creates an empty, uninitialized store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents with a `{"flags", "segments"}` data set.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Protocol`] when the data set is not an object.
    pub fn init(&self, data: &Value) -> Result<(), SdkError> {
        let object = data.as_object().ok_or_else(|| SdkError::Protocol("data set must be an object".to_string()))?;
        let collect = |name: &str| -> BTreeMap<String, Value> {
            object
                .get(name)
                .and_then(Value::as_object)
                .map(|items| items.iter().map(|(key, item)| (key.clone(), item.clone())).collect())
                .unwrap_or_default()
        };
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.flags = collect("flags");
        state.segments = collect("segments");
        state.initialized = true;
        drop(state);
        tracing::debug!("store initialized");
        Ok(())
    }

    /// Returns true once a full data set was applied.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).initialized
    }

    /// Stores `item` when it is newer than the current version; returns
    /// whether it was applied.
    pub fn upsert(&self, kind: ItemKind, key: &str, item: Value) -> bool {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let items = state.items_mut(kind);
        let incoming = item_version(&item);
        if items.get(key).is_some_and(|current| item_version(current) >= incoming) {
            tracing::debug!(key, incoming, "stale update ignored");
            return false;
        }
        items.insert(key.to_string(), item);
        true
    }

    /// Replaces the item with a tombstone when `version` is newer.
    pub fn delete(&self, kind: ItemKind, key: &str, version: u64) -> bool {
        self.upsert(kind, key, json!({ "key": key, "version": version, "deleted": true }))
    }

    /// Applies a stream `patch` payload.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Protocol`] for a malformed payload.
    pub fn apply_patch(&self, payload: &Value) -> Result<bool, SdkError> {
        let (kind, key) = parse_item_path(payload)?;
        let item = payload.get("data").cloned().ok_or_else(|| SdkError::Protocol("patch without data".to_string()))?;
        Ok(self.upsert(kind, &key, item))
    }

    /// Applies a stream `delete` payload.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Protocol`] for a malformed payload.
    pub fn apply_delete(&self, payload: &Value) -> Result<bool, SdkError> {
        let (kind, key) = parse_item_path(payload)?;
        let version = payload
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| SdkError::Protocol("delete without version".to_string()))?;
        Ok(self.delete(kind, &key, version))
    }

    /// Current version of an item, tombstones included.
    #[must_use]
    pub fn version(&self, kind: ItemKind, key: &str) -> Option<u64> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.items(kind).get(key).map(item_version)
    }

    /// Evaluates a flag; `None` when it is unknown, deleted, or malformed.
    #[must_use]
    pub fn evaluate(&self, key: &str) -> Option<Value> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let flag = state.flags.get(key)?;
        if flag.get("deleted").and_then(Value::as_bool).unwrap_or(false) {
            return None;
        }
        let on = flag.get("on").and_then(Value::as_bool).unwrap_or(false);
        let index = if on {
            flag.pointer("/fallthrough/variation")
        } else {
            flag.get("offVariation")
        }
        .and_then(Value::as_u64)?;
        let index = usize::try_from(index).ok()?;
        flag.get("variations").and_then(Value::as_array).and_then(|variations| variations.get(index)).cloned()
    }
}

/// Version of an item; missing versions count as zero.
fn item_version(item: &Value) -> u64 {
    item.get("version").and_then(Value::as_u64).unwrap_or(0)
}

/// Splits a `/<namespace>/<key>` payload path.
fn parse_item_path(payload: &Value) -> Result<(ItemKind, String), SdkError> {
    let path = payload
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| SdkError::Protocol("payload without path".to_string()))?;
    let (namespace, key) = path
        .strip_prefix('/')
        .and_then(|rest| rest.split_once('/'))
        .ok_or_else(|| SdkError::Protocol(format!("malformed item path: {path}")))?;
    let kind =
        ItemKind::from_namespace(namespace).ok_or_else(|| SdkError::Protocol(format!("unknown namespace: {namespace}")))?;
    if key.is_empty() {
        return Err(SdkError::Protocol(format!("malformed item path: {path}")));
    }
    Ok((kind, key.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
