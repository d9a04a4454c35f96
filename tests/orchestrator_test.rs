use chrono::{NaiveDate, Timelike, Utc};
use helios::config::Config;
use helios::error::Result;
use helios::orchestrator::{
    JobName, JobSources, Notification, OrchestratorCommand, PollingOrchestrator,
};
use helios::persistence::MaxPowerTracker;
use helios::prices::{FetchedPrices, FilePriceStore, PriceFetcher, SpotPriceCache, SOURCE_UNIT};
use helios::solaredge::{DailyProduction, PowerFlow, PowerFlowSource, PowerNode, ProductionSource};
use helios::vehicle::{VehicleChargeSource, VehicleStatus};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

struct StubPowerFlow {
    fail: bool,
}

#[async_trait::async_trait]
impl PowerFlowSource for StubPowerFlow {
    async fn fetch_power_flow(&self) -> Result<PowerFlow> {
        if self.fail {
            return Err(helios::HeliosError::fetch_retriable("inverter offline"));
        }
        Ok(PowerFlow {
            unit: "kW".to_string(),
            connections: Vec::new(),
            grid: Some(PowerNode {
                status: "active".to_string(),
                current_power: 0.4,
            }),
            load: Some(PowerNode {
                status: "active".to_string(),
                current_power: 1.1,
            }),
            pv: Some(PowerNode {
                status: "active".to_string(),
                current_power: 2.5,
            }),
            storage: None,
        })
    }
}

struct StubProduction;

#[async_trait::async_trait]
impl ProductionSource for StubProduction {
    async fn fetch_production(&self) -> Result<DailyProduction> {
        Ok(DailyProduction {
            unit: "Wh".to_string(),
            today: 2983.0,
            yesterday: 5280.0,
        })
    }
}

struct StubVehicle;

#[async_trait::async_trait]
impl VehicleChargeSource for StubVehicle {
    async fn fetch_charge_state(&self) -> Result<VehicleStatus> {
        Ok(VehicleStatus {
            charging_state: "Charging".to_string(),
            battery_level: Some(64.0),
            battery_range: Some(212.0),
            est_battery_range: Some(180.0),
            charger_power: Some(11.0),
            charger_actual_current: Some(16.0),
            minutes_to_full_charge: Some(95.0),
            timestamp: None,
        })
    }
}

struct StubPrices;

#[async_trait::async_trait]
impl PriceFetcher for StubPrices {
    async fn fetch_window(&self, _start: NaiveDate, _end: NaiveDate) -> Result<FetchedPrices> {
        let now = Utc::now().timestamp();
        Ok(FetchedPrices {
            unit: SOURCE_UNIT.to_string(),
            price: vec![80.0, 90.0, 70.0],
            unix_seconds: vec![now - 1, now + 3600, now + 26 * 3600],
        })
    }
}

struct TestRig {
    orchestrator: PollingOrchestrator,
    commands: mpsc::UnboundedSender<OrchestratorCommand>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    _dir: tempfile::TempDir,
}

fn rig(power_flow_fails: bool) -> TestRig {
    let dir = tempfile::tempdir().unwrap();
    let sources = JobSources {
        power_flow: Arc::new(StubPowerFlow {
            fail: power_flow_fails,
        }),
        production: Arc::new(StubProduction),
        vehicle: Arc::new(StubVehicle),
        prices: Arc::new(Mutex::new(SpotPriceCache::new(
            Box::new(StubPrices),
            Box::new(FilePriceStore::new(dir.path().join("prices.json"))),
        ))),
        max_power: Arc::new(MaxPowerTracker::load_or_default(dir.path().join("max.json"))),
    };

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (note_tx, note_rx) = mpsc::unbounded_channel();
    TestRig {
        orchestrator: PollingOrchestrator::new(cmd_rx, note_tx, sources),
        commands: cmd_tx,
        notifications: note_rx,
        _dir: dir,
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.site.site_id = "1234".to_string();
    config.site.api_key = "test-key".to_string();
    // Intervals far beyond the test runtime: only primes and triggers fire
    config.jobs.power_flow_interval_ms = 3_600_000;
    config.jobs.production_interval_ms = 3_600_000;
    // Pin the daily price refresh half a day away from now
    config.jobs.price_refresh_hour = (chrono::Local::now().hour() + 12) % 24;
    config.jobs.price_refresh_minute = 0;
    config.jobs.vehicle_min_interval_ms = 0;
    config.governor.min_interval_ms = 0;
    config.governor.max_calls_per_day = 0;
    config.governor.blackout_start_hour = None;
    config.governor.blackout_end_hour = None;
    config
}

async fn collect(
    notifications: &mut mpsc::UnboundedReceiver<Notification>,
    count: usize,
) -> Vec<Notification> {
    let mut collected = Vec::with_capacity(count);
    for _ in 0..count {
        collected.push(notifications.recv().await.unwrap());
    }
    collected
}

#[tokio::test]
async fn configure_starts_and_primes_every_job() {
    let mut rig = rig(false);
    rig.orchestrator.configure(test_config()).await.unwrap();

    let notes = collect(&mut rig.notifications, 4).await;
    let jobs: HashSet<JobName> = notes.iter().map(|n| n.job()).collect();
    assert_eq!(jobs.len(), 4);
    assert!(notes.iter().all(|n| !n.is_error()));

    // The power-flow prime carries the governor's daily call count
    let power_flow = notes
        .iter()
        .find(|n| n.job() == JobName::PowerFlow)
        .unwrap();
    if let Notification::PowerFlow {
        request_count,
        max_power,
        flow,
    } = power_flow
    {
        assert_eq!(*request_count, 1);
        assert!((flow.pv_power() - 2.5).abs() < 1e-9);
        // The prime also pushed the record PV power through the tracker
        assert!((max_power.value - 2.5).abs() < 1e-9);
    } else {
        panic!("expected a power flow notification");
    }
}

#[tokio::test]
async fn reconfiguring_leaves_exactly_one_schedule_per_job() {
    let mut rig = rig(false);
    rig.orchestrator.configure(test_config()).await.unwrap();
    rig.orchestrator.configure(test_config()).await.unwrap();

    let names = rig.orchestrator.active_jobs();
    assert_eq!(names.len(), 4);
    let unique: HashSet<JobName> = names.iter().copied().collect();
    assert_eq!(unique.len(), 4);
    assert!(rig.orchestrator.jobs().iter().all(|j| !j.is_finished()));

    // The second schedule's primes always arrive, whatever stage the first
    // schedule was torn down at; at least four notifications are guaranteed
    let notes = collect(&mut rig.notifications, 4).await;
    assert!(notes.iter().all(|n| !n.is_error()));
}

#[tokio::test]
async fn triggers_before_configuration_report_the_missing_config() {
    let mut rig = rig(false);

    rig.orchestrator
        .handle_command(OrchestratorCommand::UserPresence(true))
        .await;
    let note = rig.notifications.recv().await.unwrap();
    assert!(note.is_error());
    assert_eq!(note.job(), JobName::PowerFlow);
    if let Notification::JobError { message, .. } = note {
        assert!(message.contains("onfiguration"));
    }

    rig.orchestrator
        .handle_command(OrchestratorCommand::FetchNow {
            job: JobName::VehicleCharge,
            force: false,
        })
        .await;
    let note = rig.notifications.recv().await.unwrap();
    assert!(note.is_error());
    assert_eq!(note.job(), JobName::VehicleCharge);
}

#[tokio::test]
async fn presence_routes_through_the_power_flow_job() {
    let mut rig = rig(false);
    rig.orchestrator.configure(test_config()).await.unwrap();
    collect(&mut rig.notifications, 4).await;

    rig.orchestrator
        .handle_command(OrchestratorCommand::UserPresence(true))
        .await;
    let note = rig.notifications.recv().await.unwrap();
    assert_eq!(note.job(), JobName::PowerFlow);
    assert!(!note.is_error());

    // Absence does not trigger anything; a subsequent on-demand vehicle
    // fetch is the next notification to arrive
    rig.orchestrator
        .handle_command(OrchestratorCommand::UserPresence(false))
        .await;
    rig.orchestrator
        .handle_command(OrchestratorCommand::FetchNow {
            job: JobName::VehicleCharge,
            force: false,
        })
        .await;
    let note = rig.notifications.recv().await.unwrap();
    assert_eq!(note.job(), JobName::VehicleCharge);
}

#[tokio::test]
async fn failing_job_reports_errors_and_keeps_its_schedule() {
    let mut rig = rig(true);
    rig.orchestrator.configure(test_config()).await.unwrap();

    let notes = collect(&mut rig.notifications, 4).await;
    let errors: Vec<&Notification> = notes.iter().filter(|n| n.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].job(), JobName::PowerFlow);

    // The schedule survives the failure: an on-demand fetch fails again
    // instead of being silently dropped
    rig.orchestrator
        .handle_command(OrchestratorCommand::FetchNow {
            job: JobName::PowerFlow,
            force: false,
        })
        .await;
    let note = rig.notifications.recv().await.unwrap();
    assert!(note.is_error());
    assert_eq!(note.job(), JobName::PowerFlow);
    assert!(rig.orchestrator.jobs().iter().all(|j| !j.is_finished()));
}

#[tokio::test]
async fn shutdown_command_stops_the_run_loop() {
    let rig = rig(false);
    let TestRig {
        mut orchestrator,
        commands,
        mut notifications,
        _dir,
    } = rig;

    let runner = tokio::spawn(async move { orchestrator.run().await });

    commands
        .send(OrchestratorCommand::Configure(Box::new(test_config())))
        .unwrap();
    let first = notifications.recv().await.unwrap();
    assert!(!first.is_error());

    commands.send(OrchestratorCommand::Shutdown).unwrap();
    runner.await.unwrap().unwrap();
}
