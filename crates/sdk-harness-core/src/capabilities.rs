// crates/sdk-harness-core/src/capabilities.rs
// ============================================================================
// Module: Capability Set
// Description: Immutable tag set declared by the SDK under test.
// Purpose: Gate optional protocol checks by declared SDK support.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The SDK under test reports a list of capability tags once per connection.
//! The set never changes afterwards; scopes and mocks only perform
//! membership checks against it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Known Capabilities
// ============================================================================

/// Capability tags understood by the harness mocks.
pub mod capability {
    /// SDK is a server-side SDK (full flag/segment data).
    pub const SERVER_SIDE: &str = "server-side";
    /// SDK is a client-side SDK (evaluated flag results).
    pub const CLIENT_SIDE: &str = "client-side";
    /// Client-side SDK uses the mobile endpoints.
    pub const MOBILE: &str = "mobile";
    /// Server-side SDK supports polling mode.
    pub const SERVER_SIDE_POLLING: &str = "server-side-polling";
    /// SDK supports big segments through a store integration.
    pub const BIG_SEGMENTS: &str = "big-segments";
    /// SDK supports a persistent data store integration.
    pub const PERSISTENT_DATA_STORE: &str = "persistent-data-store";
    /// SDK may gzip-compress analytics event payloads.
    pub const EVENT_GZIP: &str = "event-gzip";
    /// SDK sends application tags in the tags header.
    pub const TAGS: &str = "tags";
    /// SDK accepts per-service base URL overrides.
    pub const SERVICE_ENDPOINTS: &str = "service-endpoints";
    /// SDK sends diagnostic events.
    pub const DIAGNOSTIC_EVENTS: &str = "diagnostic-events";
}

// ============================================================================
// SECTION: Capability Set
// ============================================================================

/// Read-only set of capability tags.
///
/// # Invariants
/// - Contents are fixed at construction; clones share storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct CapabilitySet {
    /// Shared sorted tag storage.
    tags: Arc<BTreeSet<String>>,
}

impl CapabilitySet {
    /// Builds a capability set from any iterator of tags.
    #[must_use]
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: Arc::new(tags.into_iter().map(Into::into).collect()),
        }
    }

    /// Returns true when the tag is declared.
    #[must_use]
    pub fn has(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Returns true when every tag is declared.
    #[must_use]
    pub fn has_all(&self, tags: &[&str]) -> bool {
        tags.iter().all(|tag| self.has(tag))
    }

    /// Returns the first tag from `tags` that is not declared.
    #[must_use]
    pub fn first_missing<'a>(&self, tags: &[&'a str]) -> Option<&'a str> {
        tags.iter().copied().find(|tag| !self.has(tag))
    }

    /// Iterates tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Number of declared tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns true when no tags are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl From<Vec<String>> for CapabilitySet {
    fn from(tags: Vec<String>) -> Self {
        Self::new(tags)
    }
}

impl From<CapabilitySet> for Vec<String> {
    fn from(set: CapabilitySet) -> Self {
        set.tags.iter().cloned().collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
