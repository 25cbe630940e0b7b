//! Runs the absence sweep once, for today or for the date given as the first
//! argument (YYYY-MM-DD).

use anyhow::Context;
use chrono::NaiveDate;
use rollcall_backend::{
    bootstrap::{init_tracing, Runtime},
    config::Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let date = std::env::args()
        .nth(1)
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .with_context(|| format!("Invalid date argument: {}", raw))
        })
        .transpose()?;

    let runtime = Runtime::start(Config::load()?).await?;
    let scheduler = runtime.state.scheduler.clone();
    let result = match date {
        Some(date) => scheduler.run_daily_absence_sweep(date).await,
        None => scheduler.run_absence_sweep_today().await,
    };
    runtime.stop().await;

    let report = result?;
    tracing::info!(
        created = report.created,
        already_marked = report.already_marked,
        failed = report.failed,
        notices_dropped = report.notices_dropped,
        holiday = report.holiday,
        "Absence sweep complete"
    );
    Ok(())
}
