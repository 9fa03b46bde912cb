// crates/sdk-harness-config/src/lib.rs
// ============================================================================
// Module: SDK Harness Config Library
// Description: Canonical harness config model and environment overrides.
// Purpose: Single source of truth for sdk-harness.toml semantics.
// Dependencies: sdk-harness-core, serde, toml
// ============================================================================

//! ## Overview
//! `sdk-harness-config` loads `sdk-harness.toml`, applies `SDK_HARNESS_*`
//! environment overrides, and validates the result fail-closed. Every field
//! has a default, so an absent file yields a usable configuration.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod env;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::FilterConfig;
pub use config::HarnessConfig;
pub use config::LoggingConfig;
pub use config::ReportConfig;
pub use config::ServerConfig;
pub use config::TimeoutConfig;
pub use env::EnvOverrides;
pub use env::EnvSource;
pub use env::HarnessEnv;
pub use env::ProcessEnv;
pub use examples::config_toml_example;
