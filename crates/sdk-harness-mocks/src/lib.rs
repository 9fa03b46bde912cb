// crates/sdk-harness-mocks/src/lib.rs
// ============================================================================
// Module: SDK Harness Mocks
// Description: Mock backend services for SDK contract scenarios.
// Purpose: Impersonate the streaming, polling, events, and store backends.
// Dependencies: axum, tokio, sdk-harness-core, sdk-harness-config
// ============================================================================

//! ## Overview
//! Every mock is one endpoint on a shared [`MockEndpointRouter`]. The router
//! hands each fixture a unique base URL, records every request it routes, and
//! releases the route when the owning scope exits. Fixtures record protocol
//! violations against their scope through [`sdk_harness_core::FailureHandle`]
//! and expose bounded blocking waits for the requests they audit.
//!
//! - [`StreamingService`] and [`PollingService`] serve SDK data.
//! - [`EventsService`] accepts analytics and diagnostic payloads.
//! - [`BigSegmentStoreService`] and [`PersistentStoreService`] emulate store
//!   backends over a small JSON RPC surface.
//! - [`Harness`] assembles a run from a `HarnessConfig`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod big_segments;
pub mod capture;
pub mod events;
pub mod harness;
pub mod headers;
pub mod persistent_store;
pub mod polling;
pub mod router;
pub mod sdk_data;
pub mod streaming;
pub mod tags;

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]
}

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use big_segments::BigSegmentQuery;
pub use big_segments::BigSegmentStoreService;
pub use big_segments::MembershipFn;
pub use big_segments::MetadataFn;
pub use big_segments::context_hash;
pub use capture::CaptureError;
pub use capture::CaptureQueue;
pub use capture::CaptureSender;
pub use events::EventPayload;
pub use events::EventsService;
pub use harness::Harness;
pub use harness::HarnessError;
pub use persistent_store::PersistentStoreData;
pub use persistent_store::PersistentStoreQuery;
pub use persistent_store::PersistentStoreService;
pub use polling::PollingService;
pub use router::CapturedRequest;
pub use router::EndpointHandler;
pub use router::MockEndpoint;
pub use router::MockEndpointRouter;
pub use router::RouterError;
pub use sdk_data::ClientFlagBuilder;
pub use sdk_data::ClientSdkData;
pub use sdk_data::DataKind;
pub use sdk_data::FlagBuilder;
pub use sdk_data::SdkData;
pub use sdk_data::SdkDataError;
pub use sdk_data::SdkDataSource;
pub use sdk_data::SdkKind;
pub use sdk_data::SegmentBuilder;
pub use sdk_data::ServerSdkData;
pub use sdk_data::Transport;
pub use streaming::StreamingService;
pub use tags::ApplicationTags;
pub use tags::TagsError;
