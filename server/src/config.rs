use anyhow::{bail, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::service::MAX_HISTORY_LIMIT;

/// Application configuration loaded from a TOML file or defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// How to reach the device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Path to the `adb` binary.
    #[serde(default = "default_adb_path")]
    pub adb_path: String,

    /// Device serial (`adb -s`). Required only when several devices are attached.
    pub serial: Option<String>,

    /// Per-command timeout in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

/// Batch name resolution settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Identifiers resolved concurrently per group.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause between groups in milliseconds.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Upper bound for a whole batch, in seconds.
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
}

/// Telemetry capture settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Snapshots returned alongside each capture.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_adb_path() -> String {
    "adb".to_string()
}

fn default_command_timeout() -> u64 {
    10
}

fn default_concurrency() -> usize {
    crate::packages::scheduler::DEFAULT_CONCURRENCY
}

fn default_pacing_ms() -> u64 {
    crate::packages::scheduler::DEFAULT_PACING.as_millis() as u64
}

fn default_batch_timeout() -> u64 {
    120
}

fn default_history_limit() -> usize {
    50
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
            serial: None,
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            pacing_ms: default_pacing_ms(),
            batch_timeout_secs: default_batch_timeout(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

impl ResolverConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::de::from_str(&contents)?;
        Ok(config)
    }

    /// Reject settings the server cannot run with. Called once at startup.
    pub fn validate(&self) -> Result<()> {
        if self.device.adb_path.trim().is_empty() {
            bail!("device.adb_path must not be empty");
        }
        if self.device.command_timeout_secs == 0 {
            bail!("device.command_timeout_secs must be at least 1");
        }
        if self.resolver.concurrency == 0 {
            bail!("resolver.concurrency must be at least 1");
        }
        if self.resolver.batch_timeout_secs == 0 {
            bail!("resolver.batch_timeout_secs must be at least 1");
        }
        if self.telemetry.history_limit == 0 || self.telemetry.history_limit > MAX_HISTORY_LIMIT {
            bail!("telemetry.history_limit must be between 1 and {MAX_HISTORY_LIMIT}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.resolver.concurrency, 3);
        assert_eq!(config.resolver.pacing(), Duration::from_millis(500));
        assert_eq!(config.device.adb_path, "adb");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::de::from_str(
            r#"
            [device]
            serial = "emulator-5554"

            [resolver]
            concurrency = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.device.serial.as_deref(), Some("emulator-5554"));
        assert_eq!(config.device.command_timeout_secs, 10);
        assert_eq!(config.resolver.concurrency, 2);
        assert_eq!(config.resolver.pacing_ms, 500);
        assert_eq!(config.telemetry.history_limit, 50);
    }

    #[test]
    fn test_zero_concurrency_is_fatal() {
        let mut config = AppConfig::default();
        config.resolver.concurrency = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_empty_adb_path_is_fatal() {
        let mut config = AppConfig::default();
        config.device.adb_path = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_history_limit_above_maximum_is_fatal() {
        let mut config = AppConfig::default();
        config.telemetry.history_limit = 5000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("history_limit"));

        config.telemetry.history_limit = MAX_HISTORY_LIMIT;
        config.validate().expect("maximum limit is allowed");
    }
}
