use rollcall_backend::{
    bootstrap::{init_tracing, Runtime},
    config::Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let runtime = Runtime::start(Config::load()?).await?;
    let result = runtime.state.scheduler.run_session_expiry_sweep().await;
    runtime.stop().await;

    let expired = result?;
    tracing::info!(expired, "Session expiry sweep complete");
    Ok(())
}
