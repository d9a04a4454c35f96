//! Job tasks spawned by the orchestrator
//!
//! Each job is a single tokio task that owns its governor and collaborators
//! and awaits its own actions, so a job is never re-entered while a
//! previous invocation is still in flight. Jobs run in parallel with each
//! other; results and failures flow to the notification sink.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::governor::CallGovernor;
use crate::logging::StructuredLogger;
use crate::orchestrator::types::{JobName, Notification, SpotPriceReport};
use crate::persistence::MaxPowerTracker;
use crate::prices::SpotPriceCache;
use crate::solaredge::{PowerFlowSource, ProductionSource};
use crate::vehicle::VehicleChargeSource;
use chrono::Local;

/// Out-of-schedule activations delivered through a job's trigger channel
#[derive(Debug, Clone, Copy)]
pub(crate) enum JobTrigger {
    /// One unconditional startup execution (`force_execute` semantics)
    Prime,

    /// On-demand or presence-routed activation, still governor-guarded
    Demand { force: bool },
}

pub(crate) struct PowerFlowJob {
    pub source: Arc<dyn PowerFlowSource>,
    pub max_power: Arc<MaxPowerTracker>,
    pub governor: CallGovernor,
    pub notifications: mpsc::UnboundedSender<Notification>,
    pub interval: std::time::Duration,
    pub triggers: mpsc::UnboundedReceiver<JobTrigger>,
    pub logger: StructuredLogger,
}

impl PowerFlowJob {
    pub(crate) async fn run(mut self) {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.guarded_fetch().await,
                trigger = self.triggers.recv() => match trigger {
                    Some(JobTrigger::Prime) => {
                        self.governor.force_execute(|| {});
                        self.fetch_and_publish().await;
                    }
                    Some(JobTrigger::Demand { .. }) => self.guarded_fetch().await,
                    None => break,
                },
            }
        }
    }

    async fn guarded_fetch(&mut self) {
        let logger = &self.logger;
        let permitted = self.governor.execute_with(
            || {},
            |reason| logger.info(&format!("Power flow update throttled: {}", reason)),
        );
        if permitted {
            self.fetch_and_publish().await;
        }
    }

    async fn fetch_and_publish(&mut self) {
        match self.source.fetch_power_flow().await {
            Ok(flow) => {
                if let Err(e) = self.max_power.observe(flow.pv_power()).await {
                    self.logger
                        .warn(&format!("Failed to persist max power: {}", e));
                }
                let max_power = self.max_power.current().await;
                let _ = self.notifications.send(Notification::PowerFlow {
                    flow,
                    request_count: self.governor.calls_today(),
                    max_power,
                });
            }
            Err(e) => {
                self.logger.error(&format!("Could not get power flow: {}", e));
                let _ = self.notifications.send(Notification::JobError {
                    job: JobName::PowerFlow,
                    message: e.to_string(),
                });
            }
        }
    }
}

pub(crate) struct ProductionJob {
    pub source: Arc<dyn ProductionSource>,
    pub governor: CallGovernor,
    pub notifications: mpsc::UnboundedSender<Notification>,
    pub interval: std::time::Duration,
    pub triggers: mpsc::UnboundedReceiver<JobTrigger>,
    pub logger: StructuredLogger,
}

impl ProductionJob {
    pub(crate) async fn run(mut self) {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.guarded_fetch().await,
                trigger = self.triggers.recv() => match trigger {
                    Some(JobTrigger::Prime) => {
                        self.governor.force_execute(|| {});
                        self.fetch_and_publish().await;
                    }
                    Some(JobTrigger::Demand { .. }) => self.guarded_fetch().await,
                    None => break,
                },
            }
        }
    }

    async fn guarded_fetch(&mut self) {
        let logger = &self.logger;
        let permitted = self.governor.execute_with(
            || {},
            |reason| logger.info(&format!("Production update throttled: {}", reason)),
        );
        if permitted {
            self.fetch_and_publish().await;
        }
    }

    async fn fetch_and_publish(&mut self) {
        match self.source.fetch_production().await {
            Ok(production) => {
                let _ = self
                    .notifications
                    .send(Notification::Production(production));
            }
            Err(e) => {
                self.logger.error(&format!("Could not get production: {}", e));
                let _ = self.notifications.send(Notification::JobError {
                    job: JobName::Production,
                    message: e.to_string(),
                });
            }
        }
    }
}

pub(crate) struct SpotPricesJob {
    pub cache: Arc<tokio::sync::Mutex<SpotPriceCache>>,
    pub governor: CallGovernor,
    pub notifications: mpsc::UnboundedSender<Notification>,
    pub refresh_hour: u32,
    pub refresh_minute: u32,
    pub retry_attempts: u32,
    pub days_back: u32,
    pub days_forward: u32,
    pub triggers: mpsc::UnboundedReceiver<JobTrigger>,
    pub logger: StructuredLogger,
}

impl SpotPricesJob {
    pub(crate) async fn run(mut self) {
        loop {
            let wait = self.duration_until_next_refresh();
            tokio::select! {
                _ = tokio::time::sleep(wait) => self.guarded_refresh(false).await,
                trigger = self.triggers.recv() => match trigger {
                    Some(JobTrigger::Prime) => {
                        self.governor.force_execute(|| {});
                        self.refresh_and_publish(false).await;
                    }
                    Some(JobTrigger::Demand { force }) => self.guarded_refresh(force).await,
                    None => break,
                },
            }
        }
    }

    async fn guarded_refresh(&mut self, force: bool) {
        let logger = &self.logger;
        let permitted = self.governor.execute_with(
            || {},
            |reason| logger.info(&format!("Price refresh throttled: {}", reason)),
        );
        if permitted {
            self.refresh_and_publish(force).await;
        }
    }

    async fn refresh_and_publish(&mut self, force: bool) {
        {
            let mut cache = self.cache.lock().await;
            if force || !cache.has_future_day_data() {
                let ok = cache
                    .refresh_with_retry(self.days_back, self.days_forward, self.retry_attempts)
                    .await;
                if !ok {
                    self.logger.warn("Price refresh gave up; serving cached series if any");
                }
            } else {
                self.logger
                    .debug("Price series already covers tomorrow; skipping refresh");
            }
        }

        let report = {
            let cache = self.cache.lock().await;
            SpotPriceReport::from_cache(&cache)
        };
        match report {
            Ok(report) => {
                let _ = self.notifications.send(Notification::SpotPrices(report));
            }
            Err(e) => {
                self.logger.error(&format!("No publishable price data: {}", e));
                let _ = self.notifications.send(Notification::JobError {
                    job: JobName::SpotPrices,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Time until the configured local time-of-day next comes around
    fn duration_until_next_refresh(&self) -> std::time::Duration {
        let fallback = std::time::Duration::from_secs(3600);
        let now = Local::now();

        let today = now
            .date_naive()
            .and_hms_opt(self.refresh_hour, self.refresh_minute, 0)
            .and_then(|dt| dt.and_local_timezone(Local).earliest());

        let target = match today {
            Some(t) if t > now => Some(t),
            _ => now
                .date_naive()
                .succ_opt()
                .and_then(|d| d.and_hms_opt(self.refresh_hour, self.refresh_minute, 0))
                .and_then(|dt| dt.and_local_timezone(Local).earliest()),
        };

        match target {
            Some(t) => (t - now).to_std().unwrap_or(fallback),
            None => fallback,
        }
    }
}

pub(crate) struct VehicleChargeJob {
    pub source: Arc<dyn VehicleChargeSource>,
    pub governor: CallGovernor,
    pub notifications: mpsc::UnboundedSender<Notification>,
    pub triggers: mpsc::UnboundedReceiver<JobTrigger>,
    pub logger: StructuredLogger,
}

impl VehicleChargeJob {
    pub(crate) async fn run(mut self) {
        // No autonomous timer: this job only reacts to triggers
        while let Some(trigger) = self.triggers.recv().await {
            match trigger {
                JobTrigger::Prime => {
                    self.governor.force_execute(|| {});
                    self.fetch_and_publish().await;
                }
                JobTrigger::Demand { .. } => {
                    let logger = &self.logger;
                    let permitted = self.governor.execute_with(
                        || {},
                        |reason| {
                            logger.info(&format!("Vehicle charge update throttled: {}", reason))
                        },
                    );
                    if permitted {
                        self.fetch_and_publish().await;
                    }
                }
            }
        }
    }

    async fn fetch_and_publish(&mut self) {
        match self.source.fetch_charge_state().await {
            Ok(status) => {
                let _ = self
                    .notifications
                    .send(Notification::VehicleCharge(status));
            }
            Err(e) => {
                self.logger
                    .error(&format!("Could not get vehicle charge state: {}", e));
                let _ = self.notifications.send(Notification::JobError {
                    job: JobName::VehicleCharge,
                    message: e.to_string(),
                });
            }
        }
    }
}
