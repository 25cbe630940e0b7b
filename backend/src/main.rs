use std::time::Duration;

use rollcall_backend::{
    bootstrap::{init_tracing, Runtime},
    build_router,
    config::Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load()?;
    tracing::info!(
        storage = ?config.storage_backend,
        time_zone = %config.time_zone,
        campus_radius_m = config.campus_radius_meters,
        campus_cutoff = %config.campus_cutoff,
        absence_sweep_time = %config.absence_sweep_time,
        "Configuration loaded"
    );
    let bind_addr = config.bind_addr;
    let sweep_time = config.absence_sweep_time;
    let expiry_interval = Duration::from_secs(config.session_expiry_interval_secs.max(1));

    let runtime = Runtime::start(config).await?;
    let scheduler = runtime.state.scheduler.clone().spawn(
        sweep_time,
        expiry_interval,
        runtime.shutdown.child_token(),
    );

    let app = build_router(runtime.state.clone());
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    let shutdown = runtime.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    runtime.shutdown.cancel();
    if let Err(err) = scheduler.await {
        tracing::error!(error = %err, "Scheduler task panicked");
    }
    runtime.stop().await;
    Ok(())
}
