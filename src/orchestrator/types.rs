//! Inbound and outbound event surface of the orchestrator

use crate::error::Result;
use crate::persistence::MaxPower;
use crate::prices::SpotPriceCache;
use crate::solaredge::{DailyProduction, PowerFlow};
use crate::vehicle::VehicleStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Named, independently scheduled units of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobName {
    PowerFlow,
    Production,
    SpotPrices,
    VehicleCharge,
}

impl JobName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PowerFlow => "power_flow",
            Self::Production => "production",
            Self::SpotPrices => "spot_prices",
            Self::VehicleCharge => "vehicle_charge",
        }
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands accepted by the orchestrator from external components
#[derive(Debug)]
pub enum OrchestratorCommand {
    /// Deliver configuration and (re)start all jobs
    Configure(Box<crate::config::Config>),

    /// User presence changed; `true` triggers the presence-routed job
    UserPresence(bool),

    /// Run the named job now (still governor-guarded); `force` bypasses
    /// the price cache's already-covered check
    FetchNow { job: JobName, force: bool },

    /// Stop all jobs and exit the orchestrator loop
    Shutdown,
}

/// Outbound events carrying fetched or derived values
#[derive(Debug, Clone, Serialize)]
pub enum Notification {
    /// Live power flow plus the governor's daily call count
    PowerFlow {
        flow: PowerFlow,
        request_count: u64,
        max_power: MaxPower,
    },

    /// Daily production figures
    Production(DailyProduction),

    /// Spot price summary and full series
    SpotPrices(SpotPriceReport),

    /// Vehicle charge state
    VehicleCharge(VehicleStatus),

    /// A job action failed; the job waits for its next trigger
    JobError { job: JobName, message: String },
}

impl Notification {
    /// Job that produced this notification
    pub fn job(&self) -> JobName {
        match self {
            Self::PowerFlow { .. } => JobName::PowerFlow,
            Self::Production(_) => JobName::Production,
            Self::SpotPrices(_) => JobName::SpotPrices,
            Self::VehicleCharge(_) => JobName::VehicleCharge,
            Self::JobError { job, .. } => *job,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::JobError { .. })
    }
}

/// Payload of the spot price notification: the current price, today's
/// extrema with their timestamps, and the full series for charting
#[derive(Debug, Clone, Serialize)]
pub struct SpotPriceReport {
    pub unit: String,
    pub prices: Vec<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub current_price: f64,
    pub current_price_at: DateTime<Utc>,
    pub min_today_price: f64,
    pub min_today_price_at: DateTime<Utc>,
    pub max_today_price: f64,
    pub max_today_price_at: DateTime<Utc>,
}

impl SpotPriceReport {
    /// Build the report from the cache's current series. Fails when the
    /// cache is empty, entirely in the future, or has no samples today.
    pub fn from_cache(cache: &SpotPriceCache) -> Result<Self> {
        let series = cache
            .series()
            .ok_or(crate::error::HeliosError::NoCurrentData)?;

        let current_price = cache.current_value()?;
        let current_price_at = cache.current_timestamp()?;
        let (min_today_price, min_today_price_at) = cache.min_value_today()?;
        let (max_today_price, max_today_price_at) = cache.max_value_today()?;

        Ok(Self {
            unit: series.unit().to_string(),
            prices: series.points().iter().map(|p| p.value).collect(),
            timestamps: series.points().iter().map(|p| p.timestamp).collect(),
            updated_at: series.last_refresh(),
            current_price,
            current_price_at,
            min_today_price,
            min_today_price_at,
            max_today_price,
            max_today_price_at,
        })
    }
}
