//! # Helios - PV Monitoring and Spot Price Daemon
//!
//! A Rust daemon that polls rate-limited energy data sources on independent
//! schedules and publishes their latest values to a display layer.
//!
//! ## Features
//!
//! - **Call Governing**: Per-job call budgets (lifetime cap, daily cap,
//!   minimum spacing, blackout hours) with an override escape hatch
//! - **Spot Price Cache**: Persisted day-ahead price series with retrying
//!   refresh and step-function "price right now" queries
//! - **Scheduled Polling**: Timer-driven, daily fixed-time, and
//!   event-triggered jobs, serialized per job and parallel across jobs
//! - **Inverter Telemetry**: Power flow and daily production from the
//!   monitoring API
//! - **Vehicle Integration**: Charge state via an external command
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `governor`: Call-rate limiting per job
//! - `prices`: Cached spot price series, refresh and queries
//! - `solaredge`: Inverter monitoring API collaborators
//! - `vehicle`: Vehicle charge-state collaborator
//! - `persistence`: Persisted record-power state
//! - `orchestrator`: Job scheduling and the event surface

pub mod config;
pub mod error;
pub mod governor;
pub mod logging;
pub mod orchestrator;
pub mod persistence;
pub mod prices;
pub mod solaredge;
pub mod vehicle;

// Re-export commonly used types
pub use config::Config;
pub use error::{HeliosError, Result};
pub use governor::CallGovernor;
pub use orchestrator::PollingOrchestrator;
pub use prices::SpotPriceCache;
