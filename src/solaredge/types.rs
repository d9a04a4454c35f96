//! Records returned by the monitoring API

use serde::{Deserialize, Serialize};

/// One endpoint of the site's power graph (grid, load, PV)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerNode {
    pub status: String,

    #[serde(rename = "currentPower")]
    pub current_power: f64,
}

/// Battery node with its state of charge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageNode {
    pub status: String,

    #[serde(rename = "currentPower")]
    pub current_power: f64,

    #[serde(rename = "chargeLevel")]
    pub charge_level: f64,

    #[serde(default)]
    pub critical: bool,
}

/// Directed edge in the power graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
}

/// Live power flow of the site
///
/// Nodes are optional: sites without a battery have no `STORAGE` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerFlow {
    pub unit: String,

    #[serde(default)]
    pub connections: Vec<Connection>,

    #[serde(rename = "GRID")]
    pub grid: Option<PowerNode>,

    #[serde(rename = "LOAD")]
    pub load: Option<PowerNode>,

    #[serde(rename = "PV")]
    pub pv: Option<PowerNode>,

    #[serde(rename = "STORAGE")]
    pub storage: Option<StorageNode>,
}

impl PowerFlow {
    /// Current PV production, zero when the inverter reports no PV node
    pub fn pv_power(&self) -> f64 {
        self.pv.as_ref().map(|n| n.current_power).unwrap_or(0.0)
    }
}

/// Production totals for today and yesterday
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyProduction {
    pub unit: String,

    #[serde(rename = "productionToday")]
    pub today: f64,

    #[serde(rename = "productionYesterday")]
    pub yesterday: f64,
}
