use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use domain::services::{InMemoryGeofencingClient, LoggingNotificationDispatcher};
use geofication_api::{
    app::{create_app, AppState},
    config::Config,
    jobs::{DeferredDispatchJob, DispatchCleanupJob, JobScheduler, PoolMetricsJob},
    middleware::{init_logging, init_metrics},
    services::{DispatchSettings, Services},
};
use shared::time::now_millis;
use tracing::info;

/// Time allowed for in-flight job runs after the server stops.
const JOB_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging).context("Failed to initialize logging")?;
    init_metrics().context("Failed to install metrics recorder")?;

    info!("Starting Geofication v{}", env!("CARGO_PKG_VERSION"));

    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let geofencing = Arc::new(InMemoryGeofencingClient::new(config.geofencing.max_regions));
    geofencing.set_permission_granted(config.geofencing.location_permission_granted);

    let services = Services::new(
        pool.clone(),
        Arc::new(LoggingNotificationDispatcher::new()),
        geofencing,
        DispatchSettings::from(&config.dispatch),
    );

    services.settings.initialize().await?;

    // Rows left running by a previous process go back to pending.
    let recovered = services.dispatch.recover(now_millis()).await;
    if recovered > 0 {
        info!(recovered, "Requeued interrupted dispatches");
    }

    // The in-process region table starts empty on every launch.
    let report = services.regions.reregister_all().await;
    info!(
        registered = report.registered,
        failed = report.failed,
        "Regions registered"
    );

    let mut scheduler = JobScheduler::new();
    scheduler.register(DeferredDispatchJob::new(
        services.dispatch.clone(),
        config.dispatch.poll_interval_secs,
    ));
    scheduler.register(DispatchCleanupJob::new(
        services.dispatch.clone(),
        config.dispatch.retention_days,
        config.dispatch.cleanup_interval_secs,
    ));
    scheduler.register(PoolMetricsJob::new(pool.clone()));
    scheduler.start();

    let addr = config.socket_addr()?;
    let app = create_app(AppState::new(config, pool, services));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(JOB_SHUTDOWN_TIMEOUT).await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, keep serving.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
