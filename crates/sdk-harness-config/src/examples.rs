// crates/sdk-harness-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The example mirrors the built-in defaults so that loading it is
//! equivalent to loading no file at all.

/// Returns a canonical example `sdk-harness.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:0"
advertised_host = "127.0.0.1"
request_history_capacity = 1000
payload_queue_capacity = 100

[timeouts]
connection_ms = 5000
events_ms = 5000
no_events_ms = 200
poll_interval_ms = 20

[filters]
run = []
skip = []

[report]
# json_path = "target/sdk-harness/report.json"
# markdown_path = "target/sdk-harness/report.md"
# events_path = "target/sdk-harness/events.jsonl"

[logging]
filter = "info"
"#,
    )
}
