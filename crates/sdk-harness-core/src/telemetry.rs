// crates/sdk-harness-core/src/telemetry.rs
// ============================================================================
// Module: Harness Telemetry
// Description: Tracing subscriber installation for harness runs and tests.
// Purpose: Route mock and scope diagnostics through one `tracing` pipeline.
// Dependencies: tracing-subscriber
// ============================================================================

//! ## Overview
//! Installs a global `tracing-subscriber` formatter once per process.
//! `RUST_LOG` takes precedence over the configured filter.

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter used by tests when `RUST_LOG` is unset.
pub const TEST_LOG_FILTER: &str = "info,sdk_harness_core=debug,sdk_harness_mocks=debug";

static INIT: Once = Once::new();

/// Installs the global tracing subscriber.
///
/// Returns `true` when this call installed the subscriber. Later calls, or
/// calls made after another subscriber was installed elsewhere, return `false`.
pub fn init_tracing(default_filter: &str) -> bool {
    let mut installed = false;
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        installed = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .is_ok();
    });
    installed
}

/// Installs a test-friendly subscriber that writes through the test harness.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(TEST_LOG_FILTER));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}
