use anyhow::Result;
use helios::config::Config;
use helios::orchestrator::{
    JobSources, Notification, OrchestratorCommand, PollingOrchestrator,
};
use helios::persistence::MaxPowerTracker;
use helios::prices::{EnergyChartsClient, FilePriceStore, SpotPriceCache};
use helios::solaredge::SolarEdgeClient;
use helios::vehicle::CommandVehicleClient;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    config.validate()?;

    helios::logging::init_logging(&config.logging)?;
    info!("Helios PV monitor starting up");

    // Build the real collaborators the jobs fetch from
    let site_client = Arc::new(SolarEdgeClient::new(&config.site)?);
    let price_cache = SpotPriceCache::new(
        Box::new(EnergyChartsClient::new(&config.prices.bidding_zone)?),
        Box::new(FilePriceStore::new(&config.cache.prices_file)),
    );
    let sources = JobSources {
        power_flow: site_client.clone(),
        production: site_client,
        vehicle: Arc::new(CommandVehicleClient::new(&config.vehicle)),
        prices: Arc::new(Mutex::new(price_cache)),
        max_power: Arc::new(MaxPowerTracker::load_or_default(&config.cache.max_power_file)),
    };

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<OrchestratorCommand>();
    let (note_tx, mut note_rx) = mpsc::unbounded_channel::<Notification>();

    // The display layer is out of scope here; log the outbound events so
    // the notification surface is observable.
    let sink_task = tokio::spawn(async move {
        while let Some(note) = note_rx.recv().await {
            match &note {
                Notification::JobError { job, message } => {
                    error!("job {} failed: {}", job, message);
                }
                other => info!("notification from {}: {:?}", other.job(), other),
            }
        }
    });

    // Stop the orchestrator on ctrl-c
    let shutdown_tx = cmd_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(OrchestratorCommand::Shutdown);
        }
    });

    // Deliver the configuration event; this starts all jobs
    cmd_tx
        .send(OrchestratorCommand::Configure(Box::new(config)))
        .map_err(|e| anyhow::anyhow!("Failed to deliver configuration: {}", e))?;

    let mut orchestrator = PollingOrchestrator::new(cmd_rx, note_tx, sources);
    match orchestrator.run().await {
        Ok(()) => {
            info!("Orchestrator shutdown complete");
            sink_task.abort();
            Ok(())
        }
        Err(e) => {
            error!("Orchestrator failed with error: {}", e);
            sink_task.abort();
            Err(anyhow::anyhow!("Orchestrator error: {}", e))
        }
    }
}
