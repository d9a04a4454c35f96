//! Vehicle charge-state integration
//!
//! The charge state is obtained by spawning an external command that talks
//! to the vehicle vendor's API and prints the resulting record as JSON on
//! stdout. The subprocess boundary keeps vendor credentials and SDKs out of
//! this process; from the orchestrator's perspective it is a fallible
//! asynchronous fetch like any other source.

use crate::config::VehicleConfig;
use crate::error::{HeliosError, Result};
use crate::logging::get_logger;
use serde::{Deserialize, Serialize};

/// Vehicle charge-state record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleStatus {
    #[serde(rename = "chargingState")]
    pub charging_state: String,

    #[serde(rename = "batteryLevel")]
    pub battery_level: Option<f64>,

    #[serde(rename = "batteryRange")]
    pub battery_range: Option<f64>,

    #[serde(rename = "estBatteryRange")]
    pub est_battery_range: Option<f64>,

    #[serde(rename = "chargerPower")]
    pub charger_power: Option<f64>,

    #[serde(rename = "chargerActualCurrent")]
    pub charger_actual_current: Option<f64>,

    #[serde(rename = "minutesToFullCharge")]
    pub minutes_to_full_charge: Option<f64>,

    pub timestamp: Option<i64>,
}

impl VehicleStatus {
    /// Whether the vehicle reports an active charging session
    pub fn is_charging(&self) -> bool {
        self.charging_state.eq_ignore_ascii_case("charging")
    }
}

/// Source of the vehicle charge state
#[async_trait::async_trait]
pub trait VehicleChargeSource: Send + Sync {
    async fn fetch_charge_state(&self) -> Result<VehicleStatus>;
}

/// Charge-state client backed by an external command
pub struct CommandVehicleClient {
    command: String,
    args: Vec<String>,
    timeout: std::time::Duration,
    logger: crate::logging::StructuredLogger,
}

impl CommandVehicleClient {
    pub fn new(config: &VehicleConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: std::time::Duration::from_secs(config.timeout_secs),
            logger: get_logger("vehicle"),
        }
    }
}

#[async_trait::async_trait]
impl VehicleChargeSource for CommandVehicleClient {
    async fn fetch_charge_state(&self) -> Result<VehicleStatus> {
        if self.command.is_empty() {
            return Err(HeliosError::fetch("no vehicle command configured"));
        }

        self.logger
            .debug(&format!("Spawning vehicle command {}", self.command));

        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.command)
                .args(&self.args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            HeliosError::fetch_retriable(format!(
                "vehicle command timed out after {:?}",
                self.timeout
            ))
        })?
        .map_err(|e| {
            HeliosError::fetch_retriable(format!("failed to spawn vehicle command: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HeliosError::fetch(format!(
                "vehicle command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let status: VehicleStatus = serde_json::from_slice(&output.stdout)
            .map_err(|e| HeliosError::fetch(format!("invalid vehicle command output: {}", e)))?;

        self.logger.debug(&format!(
            "Vehicle state {} ({}%)",
            status.charging_state,
            status.battery_level.unwrap_or(0.0)
        ));
        Ok(status)
    }
}
