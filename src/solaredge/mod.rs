//! Inverter monitoring API integration
//!
//! Thin typed wrappers over the monitoring API's power-flow and energy
//! endpoints. The orchestrator only depends on the fetch traits; the HTTP
//! client translates transport and status failures into fetch errors.

pub mod client;
pub mod types;

pub use client::SolarEdgeClient;
pub use types::{Connection, DailyProduction, PowerFlow, PowerNode, StorageNode};

use crate::error::Result;

/// Source of the site's live power flow
#[async_trait::async_trait]
pub trait PowerFlowSource: Send + Sync {
    async fn fetch_power_flow(&self) -> Result<PowerFlow>;
}

/// Source of the site's daily production figures
#[async_trait::async_trait]
pub trait ProductionSource: Send + Sync {
    async fn fetch_production(&self) -> Result<DailyProduction>;
}
