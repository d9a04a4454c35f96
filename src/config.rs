//! Configuration management for Helios
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. The same structure is the payload of the
//! inbound configuration event that starts the orchestrator's jobs.

use crate::error::{HeliosError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Monitored site and API credential
    pub site: SiteConfig,

    /// Vehicle charge-state command
    pub vehicle: VehicleConfig,

    /// Job schedules
    pub jobs: JobsConfig,

    /// Call budget for the power-flow job
    pub governor: GovernorConfig,

    /// Spot price feed configuration
    pub prices: PricesConfig,

    /// On-disk cache locations
    pub cache: CacheConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Monitored site parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site identifier at the monitoring API
    pub site_id: String,

    /// API key credential
    pub api_key: String,

    /// Inverter identifier (for equipment-level queries)
    pub inverter_id: String,
}

/// Vehicle charge-state command configuration
///
/// The command is expected to print the charge-state record as JSON on
/// stdout and exit zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleConfig {
    /// Executable to spawn
    pub command: String,

    /// Arguments passed to the command
    pub args: Vec<String>,

    /// Kill the command after this many seconds
    pub timeout_secs: u64,
}

/// Job schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Power-flow polling interval in milliseconds
    pub power_flow_interval_ms: u64,

    /// Daily-production polling interval in milliseconds
    pub production_interval_ms: u64,

    /// Local hour at which tomorrow's prices are fetched
    pub price_refresh_hour: u32,

    /// Local minute of the price refresh
    pub price_refresh_minute: u32,

    /// Attempts for the price refresh (upstream may not have data yet)
    pub price_retry_attempts: u32,

    /// Minimum spacing between vehicle charge-state fetches in milliseconds
    pub vehicle_min_interval_ms: u64,
}

/// Call budget applied to the power-flow job's governor
///
/// A value of zero disables the corresponding policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Minimum spacing between calls in milliseconds
    pub min_interval_ms: u64,

    /// Maximum calls per local calendar day
    pub max_calls_per_day: u64,

    /// Blackout window start hour (inclusive)
    pub blackout_start_hour: Option<u32>,

    /// Blackout window end hour (inclusive); start > end wraps past midnight
    pub blackout_end_hour: Option<u32>,
}

/// Spot price feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesConfig {
    /// Bidding zone passed to the day-ahead feed
    pub bidding_zone: String,

    /// Request window: days before today
    pub days_back: u32,

    /// Request window: days after today
    pub days_forward: u32,
}

/// On-disk cache locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persisted spot price series
    pub prices_file: String,

    /// Persisted maximum observed PV power
    pub max_power_file: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file (or directory for the rolling appender)
    pub file: String,

    /// Optional console-specific level override
    pub console_level: Option<String>,

    /// Optional file-specific level override
    pub file_level: Option<String>,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_id: String::new(),
            api_key: String::new(),
            inverter_id: String::new(),
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            power_flow_interval_ms: 120_000,
            production_interval_ms: 1_800_000,
            price_refresh_hour: 14,
            price_refresh_minute: 15,
            price_retry_attempts: 3,
            vehicle_min_interval_ms: 300_000,
        }
    }
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 60_000,
            max_calls_per_day: 300,
            blackout_start_hour: Some(22),
            blackout_end_hour: Some(8),
        }
    }
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            bidding_zone: "DE-LU".to_string(),
            days_back: 1,
            days_forward: 1,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prices_file: "/data/helios_prices.json".to_string(),
            max_power_file: "/data/helios_max_power.json".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/helios.log".to_string(),
            console_level: None,
            file_level: None,
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "helios_config.yaml",
            "/data/helios_config.yaml",
            "/etc/helios/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.site.site_id.is_empty() {
            return Err(HeliosError::validation(
                "site.site_id",
                "Site identifier cannot be empty",
            ));
        }

        if self.site.api_key.is_empty() {
            return Err(HeliosError::validation(
                "site.api_key",
                "API key cannot be empty",
            ));
        }

        if self.jobs.power_flow_interval_ms == 0 {
            return Err(HeliosError::validation(
                "jobs.power_flow_interval_ms",
                "Must be greater than 0",
            ));
        }

        if self.jobs.production_interval_ms == 0 {
            return Err(HeliosError::validation(
                "jobs.production_interval_ms",
                "Must be greater than 0",
            ));
        }

        if self.jobs.price_refresh_hour > 23 {
            return Err(HeliosError::validation(
                "jobs.price_refresh_hour",
                "Hour must be 0-23",
            ));
        }

        if self.jobs.price_refresh_minute > 59 {
            return Err(HeliosError::validation(
                "jobs.price_refresh_minute",
                "Minute must be 0-59",
            ));
        }

        if self.jobs.price_retry_attempts == 0 {
            return Err(HeliosError::validation(
                "jobs.price_retry_attempts",
                "Must be greater than 0",
            ));
        }

        if let Some(h) = self.governor.blackout_start_hour
            && h > 23
        {
            return Err(HeliosError::validation(
                "governor.blackout_start_hour",
                "Hour must be 0-23",
            ));
        }

        if let Some(h) = self.governor.blackout_end_hour
            && h > 23
        {
            return Err(HeliosError::validation(
                "governor.blackout_end_hour",
                "Hour must be 0-23",
            ));
        }

        if self.prices.bidding_zone.is_empty() {
            return Err(HeliosError::validation(
                "prices.bidding_zone",
                "Bidding zone cannot be empty",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.jobs.power_flow_interval_ms, 120_000);
        assert_eq!(config.governor.max_calls_per_day, 300);
        assert_eq!(config.prices.bidding_zone, "DE-LU");
        assert_eq!(config.jobs.price_retry_attempts, 3);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.site.site_id = "site-1".into();
        config.site.api_key = "key".into();
        assert!(config.validate().is_ok());

        // Missing credential
        config.site.api_key = String::new();
        assert!(config.validate().is_err());

        // Out-of-range refresh hour
        config.site.api_key = "key".into();
        config.jobs.price_refresh_hour = 24;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            config.jobs.power_flow_interval_ms,
            deserialized.jobs.power_flow_interval_ms
        );
        assert_eq!(config.cache.prices_file, deserialized.cache.prices_file);
    }
}
