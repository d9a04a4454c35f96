//! Polling orchestration for Helios
//!
//! The orchestrator owns the named jobs, binds each to exactly one
//! [`CallGovernor`], and routes inbound events (configuration, presence,
//! on-demand fetches) to them. Results and failures are forwarded to the
//! notification sink; a failing job never terminates the orchestrator or
//! its sibling jobs.

mod jobs;
pub mod types;

pub use types::{JobName, Notification, OrchestratorCommand, SpotPriceReport};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::Result;
use crate::governor::CallGovernor;
use crate::logging::{LogContext, get_logger, get_logger_with_context};
use crate::persistence::MaxPowerTracker;
use crate::prices::SpotPriceCache;
use crate::solaredge::{PowerFlowSource, ProductionSource};
use crate::vehicle::VehicleChargeSource;
use jobs::JobTrigger;

/// Collaborators the jobs fetch from
pub struct JobSources {
    pub power_flow: Arc<dyn PowerFlowSource>,
    pub production: Arc<dyn ProductionSource>,
    pub vehicle: Arc<dyn VehicleChargeSource>,
    pub prices: Arc<tokio::sync::Mutex<SpotPriceCache>>,
    pub max_power: Arc<MaxPowerTracker>,
}

/// A spawned job task plus its trigger channel
pub struct JobHandle {
    name: JobName,
    trigger: mpsc::UnboundedSender<JobTrigger>,
    handle: JoinHandle<()>,
}

impl JobHandle {
    pub fn name(&self) -> JobName {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Owns the scheduled jobs and the inbound/outbound event surface
pub struct PollingOrchestrator {
    commands_rx: mpsc::UnboundedReceiver<OrchestratorCommand>,
    notifications: mpsc::UnboundedSender<Notification>,
    sources: JobSources,
    jobs: Vec<JobHandle>,
    logger: crate::logging::StructuredLogger,
}

impl PollingOrchestrator {
    /// Create an orchestrator with no active jobs; jobs start when the
    /// configuration event arrives.
    pub fn new(
        commands_rx: mpsc::UnboundedReceiver<OrchestratorCommand>,
        notifications: mpsc::UnboundedSender<Notification>,
        sources: JobSources,
    ) -> Self {
        Self {
            commands_rx,
            notifications,
            sources,
            jobs: Vec::new(),
            logger: get_logger("orchestrator"),
        }
    }

    /// Names of the currently scheduled jobs
    pub fn active_jobs(&self) -> Vec<JobName> {
        self.jobs.iter().map(|j| j.name).collect()
    }

    /// Handles of the currently scheduled jobs
    pub fn jobs(&self) -> &[JobHandle] {
        &self.jobs
    }

    /// Process inbound events until shutdown
    pub async fn run(&mut self) -> Result<()> {
        self.logger.info("Orchestrator started, waiting for configuration");

        loop {
            match self.commands_rx.recv().await {
                Some(OrchestratorCommand::Shutdown) | None => break,
                Some(cmd) => self.handle_command(cmd).await,
            }
        }

        self.logger.info("Shutdown signal received");
        self.stop_jobs().await;
        Ok(())
    }

    /// Apply a single inbound event
    pub async fn handle_command(&mut self, cmd: OrchestratorCommand) {
        match cmd {
            OrchestratorCommand::Configure(config) => {
                if let Err(e) = self.configure(*config).await {
                    self.logger
                        .error(&format!("Rejected configuration: {}", e));
                }
            }
            OrchestratorCommand::UserPresence(present) => {
                self.logger.debug(&format!("User presence: {}", present));
                if present {
                    self.trigger_job(JobName::PowerFlow, JobTrigger::Demand { force: false });
                }
            }
            OrchestratorCommand::FetchNow { job, force } => {
                self.trigger_job(job, JobTrigger::Demand { force });
            }
            OrchestratorCommand::Shutdown => {
                // Handled by the run loop; nothing to do here
            }
        }
    }

    /// Validate the configuration, cancel any existing schedules, and start
    /// one task per job. Each job gets one unconditional prime so consumers
    /// receive initial values without waiting for the first tick.
    pub async fn configure(&mut self, config: Config) -> Result<()> {
        config.validate()?;

        // Never leave two live schedules for the same job
        self.stop_jobs().await;

        {
            let mut cache = self.sources.prices.lock().await;
            if !cache.has_data() {
                cache.hydrate();
            }
        }

        self.jobs = vec![
            self.spawn_power_flow(&config),
            self.spawn_production(&config),
            self.spawn_spot_prices(&config),
            self.spawn_vehicle_charge(&config),
        ];

        self.logger.info(&format!(
            "Configured jobs: {}",
            self.jobs
                .iter()
                .map(|j| j.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        for job in &self.jobs {
            let _ = job.trigger.send(JobTrigger::Prime);
        }

        Ok(())
    }

    fn spawn_power_flow(&self, config: &Config) -> JobHandle {
        let mut governor = CallGovernor::new(JobName::PowerFlow.as_str());
        let g = &config.governor;
        if g.min_interval_ms > 0 {
            governor.set_min_interval(Some(chrono::Duration::milliseconds(
                g.min_interval_ms as i64,
            )));
        }
        if g.max_calls_per_day > 0 {
            governor.set_max_calls_per_day(Some(g.max_calls_per_day));
        }
        if let (Some(start), Some(end)) = (g.blackout_start_hour, g.blackout_end_hour) {
            governor.set_blackout_hours(start, end);
        }
        governor.log_policies();

        let (trigger, triggers) = mpsc::unbounded_channel();
        let job = jobs::PowerFlowJob {
            source: self.sources.power_flow.clone(),
            max_power: self.sources.max_power.clone(),
            governor,
            notifications: self.notifications.clone(),
            interval: std::time::Duration::from_millis(config.jobs.power_flow_interval_ms),
            triggers,
            logger: job_logger(JobName::PowerFlow),
        };
        JobHandle {
            name: JobName::PowerFlow,
            trigger,
            handle: tokio::spawn(job.run()),
        }
    }

    fn spawn_production(&self, config: &Config) -> JobHandle {
        let (trigger, triggers) = mpsc::unbounded_channel();
        let job = jobs::ProductionJob {
            source: self.sources.production.clone(),
            governor: CallGovernor::new(JobName::Production.as_str()),
            notifications: self.notifications.clone(),
            interval: std::time::Duration::from_millis(config.jobs.production_interval_ms),
            triggers,
            logger: job_logger(JobName::Production),
        };
        JobHandle {
            name: JobName::Production,
            trigger,
            handle: tokio::spawn(job.run()),
        }
    }

    fn spawn_spot_prices(&self, config: &Config) -> JobHandle {
        let (trigger, triggers) = mpsc::unbounded_channel();
        let job = jobs::SpotPricesJob {
            cache: self.sources.prices.clone(),
            governor: CallGovernor::new(JobName::SpotPrices.as_str()),
            notifications: self.notifications.clone(),
            refresh_hour: config.jobs.price_refresh_hour,
            refresh_minute: config.jobs.price_refresh_minute,
            retry_attempts: config.jobs.price_retry_attempts,
            days_back: config.prices.days_back,
            days_forward: config.prices.days_forward,
            triggers,
            logger: job_logger(JobName::SpotPrices),
        };
        JobHandle {
            name: JobName::SpotPrices,
            trigger,
            handle: tokio::spawn(job.run()),
        }
    }

    fn spawn_vehicle_charge(&self, config: &Config) -> JobHandle {
        let mut governor = CallGovernor::new(JobName::VehicleCharge.as_str());
        if config.jobs.vehicle_min_interval_ms > 0 {
            governor.set_min_interval(Some(chrono::Duration::milliseconds(
                config.jobs.vehicle_min_interval_ms as i64,
            )));
        }

        let (trigger, triggers) = mpsc::unbounded_channel();
        let job = jobs::VehicleChargeJob {
            source: self.sources.vehicle.clone(),
            governor,
            notifications: self.notifications.clone(),
            triggers,
            logger: job_logger(JobName::VehicleCharge),
        };
        JobHandle {
            name: JobName::VehicleCharge,
            trigger,
            handle: tokio::spawn(job.run()),
        }
    }

    /// Route a trigger to the named job, or report that configuration has
    /// not arrived yet.
    fn trigger_job(&self, job: JobName, trigger: JobTrigger) {
        match self.jobs.iter().find(|j| j.name == job) {
            Some(handle) => {
                let _ = handle.trigger.send(trigger);
            }
            None => {
                let err = crate::error::HeliosError::config_missing(format!(
                    "job {} has no active schedule; configuration has not been set",
                    job
                ));
                self.logger.error(&err.to_string());
                let _ = self.notifications.send(Notification::JobError {
                    job,
                    message: err.to_string(),
                });
            }
        }
    }

    /// Abort every job task and wait for it to be gone before returning
    async fn stop_jobs(&mut self) {
        for job in self.jobs.drain(..) {
            job.handle.abort();
            let _ = job.handle.await;
        }
    }
}

fn job_logger(job: JobName) -> crate::logging::StructuredLogger {
    get_logger_with_context(LogContext::new("orchestrator").with_job(job.as_str()))
}
