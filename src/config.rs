//! Run configuration with precedence tracking.
//!
//! Values resolve from three layers, highest precedence last:
//! 1. Built-in defaults
//! 2. Environment variables (`TESTES_*`)
//! 3. Explicit overrides supplied by the caller

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::fixture::HookPolicy;
use crate::logging::{LogFormat, LogLevel};

/// Environment variable for [`RunConfig::hook_policy`].
pub const ENV_HOOK_POLICY: &str = "TESTES_HOOK_POLICY";
/// Environment variable for [`RunConfig::coverage_precision`].
pub const ENV_COVERAGE_PRECISION: &str = "TESTES_COVERAGE_PRECISION";
/// Environment variable for [`RunConfig::log_level`].
pub const ENV_LOG_LEVEL: &str = "TESTES_LOG_LEVEL";
/// Environment variable for [`RunConfig::log_format`].
pub const ENV_LOG_FORMAT: &str = "TESTES_LOG_FORMAT";
/// Environment variable for [`RunConfig::test_extension`].
pub const ENV_TEST_EXTENSION: &str = "TESTES_TEST_EXTENSION";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable holds a value that does not parse.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ============================================================================
// Configuration Sources
// ============================================================================

/// Configuration value source (for precedence tracking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Default = 0,
    EnvVar = 1,
    /// Supplied by the caller (highest precedence).
    Override = 2,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Merge with another value, preferring higher precedence.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }
}

// ============================================================================
// Configuration Resolution
// ============================================================================

/// Caller-supplied overrides. `None` leaves the lower layers in effect.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub hook_policy: Option<HookPolicy>,
    pub coverage_precision: Option<u32>,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
    pub test_extension: Option<String>,
}

/// Resolved run configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    /// How failing fixture hooks are handled.
    pub hook_policy: ConfigValue<HookPolicy>,
    /// Digits kept when rounding the aggregate coverage percentage.
    pub coverage_precision: ConfigValue<u32>,
    pub log_level: ConfigValue<LogLevel>,
    pub log_format: ConfigValue<LogFormat>,
    /// Extension of test files picked up by the finder, without the dot.
    pub test_extension: ConfigValue<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            hook_policy: ConfigValue::new(HookPolicy::Strict, ConfigSource::Default),
            coverage_precision: ConfigValue::new(0, ConfigSource::Default),
            log_level: ConfigValue::new(LogLevel::Warn, ConfigSource::Default),
            log_format: ConfigValue::new(LogFormat::Text, ConfigSource::Default),
            test_extension: ConfigValue::new("rs".to_string(), ConfigSource::Default),
        }
    }
}

impl RunConfig {
    /// Resolve from defaults, the process environment and `overrides`.
    pub fn resolve(overrides: &ConfigOverrides) -> ConfigResult<Self> {
        RunConfig::resolve_with_env(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with_env<E>(overrides: &ConfigOverrides, env: E) -> ConfigResult<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut config = RunConfig::default();
        config.apply_env_vars(&env)?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    fn apply_env_vars<E>(&mut self, env: &E) -> ConfigResult<()>
    where
        E: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = env(ENV_HOOK_POLICY) {
            let policy = raw
                .parse::<HookPolicy>()
                .map_err(|err| invalid(ENV_HOOK_POLICY, &raw, err))?;
            self.hook_policy = ConfigValue::new(policy, ConfigSource::EnvVar);
        }

        if let Some(raw) = env(ENV_COVERAGE_PRECISION) {
            let precision = raw
                .trim()
                .parse::<u32>()
                .map_err(|err| invalid(ENV_COVERAGE_PRECISION, &raw, err))?;
            self.coverage_precision = ConfigValue::new(precision, ConfigSource::EnvVar);
        }

        if let Some(raw) = env(ENV_LOG_LEVEL) {
            let level = parse_env::<LogLevel>(ENV_LOG_LEVEL, &raw)?;
            self.log_level = ConfigValue::new(level, ConfigSource::EnvVar);
        }

        if let Some(raw) = env(ENV_LOG_FORMAT) {
            let format = parse_env::<LogFormat>(ENV_LOG_FORMAT, &raw)?;
            self.log_format = ConfigValue::new(format, ConfigSource::EnvVar);
        }

        if let Some(raw) = env(ENV_TEST_EXTENSION) {
            let ext = raw.trim().trim_start_matches('.');
            if ext.is_empty() {
                return Err(invalid(ENV_TEST_EXTENSION, &raw, "extension is empty"));
            }
            self.test_extension = ConfigValue::new(ext.to_string(), ConfigSource::EnvVar);
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(policy) = overrides.hook_policy {
            self.hook_policy = ConfigValue::new(policy, ConfigSource::Override);
        }

        if let Some(precision) = overrides.coverage_precision {
            self.coverage_precision = ConfigValue::new(precision, ConfigSource::Override);
        }

        if let Some(level) = overrides.log_level {
            self.log_level = ConfigValue::new(level, ConfigSource::Override);
        }

        if let Some(format) = overrides.log_format {
            self.log_format = ConfigValue::new(format, ConfigSource::Override);
        }

        if let Some(ref ext) = overrides.test_extension {
            self.test_extension = ConfigValue::new(
                ext.trim_start_matches('.').to_string(),
                ConfigSource::Override,
            );
        }
    }
}

fn parse_env<T>(key: &str, raw: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|err| invalid(key, raw, err))
}

fn invalid(key: &str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
