// crates/sdk-harness-config/src/env.rs
// ============================================================================
// Module: Harness Environment
// Description: Environment-backed overrides for harness configuration.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 and empty values fail closed. Lookups go
//! through [`EnvSource`] so callers can supply a fixed environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys read by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    /// Config file path used when no explicit path is given.
    Config,
    /// Listener bind address override.
    Bind,
    /// Host used in minted endpoint URLs.
    AdvertisedHost,
    /// Minimum connection/event timeout in seconds (positive integer).
    TimeoutSeconds,
}

impl HarnessEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "SDK_HARNESS_CONFIG",
            Self::Bind => "SDK_HARNESS_BIND",
            Self::AdvertisedHost => "SDK_HARNESS_ADVERTISED_HOST",
            Self::TimeoutSeconds => "SDK_HARNESS_TIMEOUT_SEC",
        }
    }
}

// ============================================================================
// SECTION: Sources
// ============================================================================

/// Source of raw environment values.
pub trait EnvSource {
    /// Returns the raw value of `name`, if set.
    fn var_os(&self, name: &str) -> Option<OsString>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var_os(&self, name: &str) -> Option<OsString> {
        std::env::var_os(name)
    }
}

impl<F> EnvSource for F
where
    F: Fn(&str) -> Option<OsString>,
{
    fn var_os(&self, name: &str) -> Option<OsString> {
        self(name)
    }
}

// ============================================================================
// SECTION: Overrides
// ============================================================================

/// Typed overrides derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvOverrides {
    /// Config file path.
    pub config_path: Option<PathBuf>,
    /// Listener bind address.
    pub bind: Option<String>,
    /// Advertised host.
    pub advertised_host: Option<String>,
    /// Minimum connection/event timeout.
    pub timeout_floor: Option<Duration>,
}

impl EnvOverrides {
    /// Reads overrides from an environment source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a value is not valid UTF-8, is
    /// empty, or fails validation.
    pub fn read(source: &impl EnvSource) -> Result<Self, ConfigError> {
        let config_path = read_env_nonempty(source, HarnessEnv::Config)?.map(PathBuf::from);
        let bind = read_env_nonempty(source, HarnessEnv::Bind)?;
        let advertised_host = read_env_nonempty(source, HarnessEnv::AdvertisedHost)?;
        let timeout_floor = read_env_nonempty(source, HarnessEnv::TimeoutSeconds)?
            .map(|value| parse_timeout_seconds(HarnessEnv::TimeoutSeconds.as_str(), &value))
            .transpose()?;
        Ok(Self {
            config_path,
            bind,
            advertised_host,
            timeout_floor,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(source: &impl EnvSource, key: HarnessEnv) -> Result<Option<String>, ConfigError> {
    let name = key.as_str();
    source.var_os(name).map_or(Ok(None), |raw| {
        raw.into_string()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{name} must be valid UTF-8")))
    })
}

/// Reads an environment variable and rejects empty values.
fn read_env_nonempty(source: &impl EnvSource, key: HarnessEnv) -> Result<Option<String>, ConfigError> {
    match read_env_strict(source, key)? {
        Some(value) if value.trim().is_empty() => {
            Err(ConfigError::Invalid(format!("{} must not be empty", key.as_str())))
        }
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}

/// Parses a positive timeout value in whole seconds.
///
/// # Errors
///
/// Returns an error when the value is non-numeric or zero.
pub fn parse_timeout_seconds(name: &str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = raw.trim().parse().map_err(|_| {
        ConfigError::Invalid(format!("{name} must be a positive integer number of seconds"))
    })?;
    if secs == 0 {
        return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
    }
    Ok(Duration::from_secs(secs))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
