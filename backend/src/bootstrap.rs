//! Process wiring shared by the server and the one-shot binaries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::{Config, StorageBackend},
    db::connection::{create_pool, run_migrations},
    repositories::{InMemoryStore, Repositories},
    services::{
        audit_log::{AuditRecorder, InMemoryAuditRecorder, PgAuditRecorder},
        notification::{gateway_for, spawn_notification_worker, DeliveryStats},
    },
    state::AppState,
    utils::time::{Clock, SystemClock},
};

/// Upper bound on waiting for in-flight audit writes at shutdown.
const AUDIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// A wired application plus the background pieces that must be shut down.
pub struct Runtime {
    pub state: AppState,
    pub shutdown: CancellationToken,
    notifier: JoinHandle<DeliveryStats>,
    audit: Arc<dyn AuditRecorder>,
}

impl Runtime {
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let (repositories, audit) = open_storage(&config).await?;
        let gateway = gateway_for(config.notification_webhook_url.as_deref())
            .context("Failed to build notification gateway")?;

        let shutdown = CancellationToken::new();
        let (notifications, notifier) = spawn_notification_worker(
            gateway,
            config.notification_queue_capacity,
            shutdown.child_token(),
        );
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let state = AppState::new(
            config,
            repositories,
            clock,
            notifications,
            Arc::clone(&audit),
        );

        Ok(Self {
            state,
            shutdown,
            notifier,
            audit,
        })
    }

    /// Cancels background work, waits for queued notifications to drain and
    /// for pending audit writes to land.
    pub async fn stop(self) {
        self.shutdown.cancel();
        match self.notifier.await {
            Ok(stats) => tracing::info!(
                delivered = stats.delivered,
                failed = stats.failed,
                "Notification worker drained"
            ),
            Err(err) => tracing::error!(error = %err, "Notification worker panicked"),
        }
        if tokio::time::timeout(AUDIT_FLUSH_TIMEOUT, self.audit.flush())
            .await
            .is_err()
        {
            tracing::warn!("Timed out waiting for audit writes");
        }
    }
}

async fn open_storage(
    config: &Config,
) -> anyhow::Result<(Repositories, Arc<dyn AuditRecorder>)> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url)
                .await
                .context("Failed to connect to database")?;
            run_migrations(&pool).await?;
            tracing::info!("Database connection established");
            let audit: Arc<dyn AuditRecorder> = Arc::new(PgAuditRecorder::new(pool.clone()));
            Ok((Repositories::postgres(pool), audit))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            let audit: Arc<dyn AuditRecorder> = Arc::new(InMemoryAuditRecorder::new());
            Ok((Repositories::in_memory(InMemoryStore::new()), audit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_runtime_runs_a_sweep_and_stops() {
        let runtime = Runtime::start(Config::default()).await.unwrap();
        let report = runtime
            .state
            .scheduler
            .run_absence_sweep_today()
            .await
            .unwrap();
        assert_eq!(report.created, 0);

        tokio::time::timeout(Duration::from_secs(5), runtime.stop())
            .await
            .expect("stop drains the worker and the audit recorder");
    }
}
