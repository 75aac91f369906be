use std::sync::Arc;

use anyhow::{Error, Result};
use campaign_service::{
    api::{AppState, run_api_server},
    clients::{database::DatabaseClient, fcm::FcmClient, health::HealthChecker},
    config::{Config, SweepSettings},
    services::{
        audience::AudienceResolver, dispatcher::MessageDispatcher, fanout::NotificationFanOut,
        food::FoodService, orchestrator::CampaignOrchestrator, profile::ProfileService,
        recorder::DeliveryRecorder, scheduler::CampaignScheduler,
    },
};
use chrono::Utc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;

    let database = Arc::new(
        DatabaseClient::connect(&config.database_url, config.database_max_connections).await?,
    );
    database.migrate().await?;

    let fcm = Arc::new(FcmClient::new(&config).await?);

    let fanout = Arc::new(NotificationFanOut::new(
        AudienceResolver::new(database.clone(), config.allow_custom_filters),
        MessageDispatcher::new(fcm.clone(), config.dispatch_settings()),
        DeliveryRecorder::new(database.clone()),
    ));
    let campaigns = Arc::new(CampaignOrchestrator::new(database.clone(), fanout.clone()));
    let scheduler = Arc::new(CampaignScheduler::new(database.clone(), campaigns.clone()));

    let state = Arc::new(AppState {
        health_checker: HealthChecker::new(database.clone(), fcm.clone()),
        fanout,
        campaigns,
        scheduler: scheduler.clone(),
        profiles: ProfileService::new(database.clone()),
        foods: FoodService::new(database.clone()),
    });

    if config.allow_custom_filters {
        warn!("Custom audience predicates are enabled");
    }

    tokio::spawn(run_sweep_loop(scheduler, config.sweep_settings()));

    run_api_server(state, config.server_port).await
}

async fn run_sweep_loop(scheduler: Arc<CampaignScheduler>, settings: SweepSettings) {
    let mut ticker = interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_secs = settings.interval.as_secs(),
        deadline_secs = settings.deadline.as_secs(),
        "Campaign sweep loop started"
    );

    loop {
        ticker.tick().await;

        if let Err(e) = scheduler
            .sweep_with_deadline(Utc::now(), settings.deadline)
            .await
        {
            error!(error = %e, "Campaign sweep failed");
        }
    }
}
