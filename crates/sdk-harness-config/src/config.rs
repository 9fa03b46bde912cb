// crates/sdk-harness-config/src/config.rs
// ============================================================================
// Module: Harness Configuration
// Description: Configuration loading and validation for the SDK harness.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: sdk-harness-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits,
//! then environment overrides are applied and the result is validated.
//! Resolution order: explicit path, then `SDK_HARNESS_CONFIG`, then built-in
//! defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use sdk_harness_core::TestFilter;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::env::EnvOverrides;
use crate::env::EnvSource;
use crate::env::ProcessEnv;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of a config file in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 256 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for request-history and payload queue capacities.
pub(crate) const MAX_QUEUE_CAPACITY: usize = 1_000_000;
/// Upper bound for any configured timeout.
pub(crate) const MAX_TIMEOUT_MS: u64 = 10 * 60 * 1000;
/// Maximum number of run or skip patterns.
pub(crate) const MAX_FILTER_PATTERNS: usize = 256;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Mock listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Blocking-wait bounds.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Run/skip test-ID patterns.
    #[serde(default)]
    pub filters: FilterConfig,
    /// Report outputs.
    #[serde(default)]
    pub report: ReportConfig,
    /// Log filter.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HarnessConfig {
    /// Loads configuration using the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, &ProcessEnv)
    }

    /// Loads configuration using an explicit environment source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with_env(path: Option<&Path>, env: &impl EnvSource) -> Result<Self, ConfigError> {
        let overrides = EnvOverrides::read(env)?;
        let resolved = path.map(Path::to_path_buf).or_else(|| overrides.config_path.clone());
        let mut config = match resolved {
            Some(resolved) => Self::from_file(&resolved)?,
            None => Self::default(),
        };
        config.apply_overrides(&overrides);
        config.validate()?;
        Ok(config)
    }

    /// Parses a config file without applying overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, oversized, not
    /// UTF-8, or not valid TOML for this model.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses TOML text without applying overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed or unknown fields.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies environment overrides.
    ///
    /// The timeout floor raises connection and event timeouts but never
    /// shortens them.
    pub fn apply_overrides(&mut self, overrides: &EnvOverrides) {
        if let Some(bind) = &overrides.bind {
            self.server.bind.clone_from(bind);
        }
        if let Some(host) = &overrides.advertised_host {
            self.server.advertised_host.clone_from(host);
        }
        if let Some(floor) = overrides.timeout_floor {
            let floor_ms = duration_millis(floor);
            self.timeouts.connection_ms = self.timeouts.connection_ms.max(floor_ms);
            self.timeouts.events_ms = self.timeouts.events_ms.max(floor_ms);
        }
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.timeouts.validate()?;
        self.filters.validate()?;
        self.report.validate()?;
        self.logging.validate()
    }
}

/// Mock listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address the shared listener binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Host placed in minted endpoint base URLs.
    #[serde(default = "default_advertised_host")]
    pub advertised_host: String,
    /// Captured-request history retained per endpoint.
    #[serde(default = "default_request_history_capacity")]
    pub request_history_capacity: usize,
    /// Event payloads buffered per events mock before producers wait.
    #[serde(default = "default_payload_queue_capacity")]
    pub payload_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            advertised_host: default_advertised_host(),
            request_history_capacity: default_request_history_capacity(),
            payload_queue_capacity: default_payload_queue_capacity(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `bind` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind)))
    }

    /// Validates server settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        let host = self.advertised_host.trim();
        if host.is_empty() {
            return Err(ConfigError::Invalid("server.advertised_host must be non-empty".to_string()));
        }
        if host.chars().any(|ch| ch.is_whitespace() || matches!(ch, '/' | '?' | '#' | '@')) {
            return Err(ConfigError::Invalid(
                "server.advertised_host must be a bare host name".to_string(),
            ));
        }
        validate_capacity("server.request_history_capacity", self.request_history_capacity)?;
        validate_capacity("server.payload_queue_capacity", self.payload_queue_capacity)
    }
}

/// Blocking-wait bounds in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Bound for awaiting an inbound connection.
    #[serde(default = "default_connection_ms")]
    pub connection_ms: u64,
    /// Bound for awaiting an analytics payload.
    #[serde(default = "default_events_ms")]
    pub events_ms: u64,
    /// Window during which no analytics payload may arrive.
    #[serde(default = "default_no_events_ms")]
    pub no_events_ms: u64,
    /// Interval between poll-helper probes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connection_ms: default_connection_ms(),
            events_ms: default_events_ms(),
            no_events_ms: default_no_events_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TimeoutConfig {
    /// Connection wait bound.
    #[must_use]
    pub const fn connection(&self) -> Duration {
        Duration::from_millis(self.connection_ms)
    }

    /// Event wait bound.
    #[must_use]
    pub const fn events(&self) -> Duration {
        Duration::from_millis(self.events_ms)
    }

    /// No-events observation window.
    #[must_use]
    pub const fn no_events(&self) -> Duration {
        Duration::from_millis(self.no_events_ms)
    }

    /// Poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validates timeout bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("timeouts.connection_ms", self.connection_ms),
            ("timeouts.events_ms", self.events_ms),
            ("timeouts.no_events_ms", self.no_events_ms),
            ("timeouts.poll_interval_ms", self.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
            }
            if value > MAX_TIMEOUT_MS {
                return Err(ConfigError::Invalid(format!("{field} exceeds {MAX_TIMEOUT_MS}")));
            }
        }
        if self.poll_interval_ms > self.connection_ms {
            return Err(ConfigError::Invalid(
                "timeouts.poll_interval_ms must not exceed timeouts.connection_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run/skip pattern lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Only scopes selected by one of these run.
    #[serde(default)]
    pub run: Vec<String>,
    /// Scopes covered by one of these are skipped.
    #[serde(default)]
    pub skip: Vec<String>,
}

impl FilterConfig {
    /// Builds the scope filter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a malformed pattern.
    pub fn to_filter(&self) -> Result<TestFilter, ConfigError> {
        TestFilter::from_patterns(&self.run, &self.skip)
            .map_err(|err| ConfigError::Invalid(format!("filters: {err}")))
    }

    /// Validates filter patterns.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.run.len() > MAX_FILTER_PATTERNS || self.skip.len() > MAX_FILTER_PATTERNS {
            return Err(ConfigError::Invalid("filters exceed pattern limit".to_string()));
        }
        self.to_filter().map(|_| ())
    }
}

/// Report output paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Canonical JSON report.
    #[serde(default)]
    pub json_path: Option<PathBuf>,
    /// Markdown summary.
    #[serde(default)]
    pub markdown_path: Option<PathBuf>,
    /// JSON-lines scope event log.
    #[serde(default)]
    pub events_path: Option<PathBuf>,
}

impl ReportConfig {
    /// Validates report paths.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("report.json_path", &self.json_path),
            ("report.markdown_path", &self.markdown_path),
            ("report.events_path", &self.events_path),
        ] {
            if let Some(path) = value {
                validate_path_field(field, path)?;
            }
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl LoggingConfig {
    /// Validates the filter directive.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:0".to_string()
}

/// Default advertised host.
fn default_advertised_host() -> String {
    "127.0.0.1".to_string()
}

/// Default request history capacity.
const fn default_request_history_capacity() -> usize {
    1000
}

/// Default payload queue capacity.
const fn default_payload_queue_capacity() -> usize {
    100
}

/// Default connection timeout.
const fn default_connection_ms() -> u64 {
    5000
}

/// Default event timeout.
const fn default_events_ms() -> u64 {
    5000
}

/// Default no-events window.
const fn default_no_events_ms() -> u64 {
    200
}

/// Default poll interval.
const fn default_poll_interval_ms() -> u64 {
    20
}

/// Default log filter.
fn default_log_filter() -> String {
    "info".to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a duration to whole milliseconds, saturating.
fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Validates a queue capacity.
fn validate_capacity(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
    }
    if value > MAX_QUEUE_CAPACITY {
        return Err(ConfigError::Invalid(format!("{field} exceeds {MAX_QUEUE_CAPACITY}")));
    }
    Ok(())
}

/// Validates the resolved config path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    validate_path_field("config path", path)
}

/// Validates a path against length constraints.
fn validate_path_field(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
