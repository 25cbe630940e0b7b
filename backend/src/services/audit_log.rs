use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{types::Json, PgPool};
use tokio_util::task::TaskTracker;

use crate::models::audit_log::AuditLog;
use crate::repositories::audit_log as audit_log_repo;
use crate::types::AuditLogId;

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<String>,
    pub actor_type: String,
    pub action: String,
    pub details: Option<Value>,
}

impl AuditEntry {
    pub fn new(
        occurred_at: DateTime<Utc>,
        actor_id: Option<String>,
        actor_type: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            occurred_at,
            actor_id,
            actor_type: actor_type.into(),
            action: action.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Write-only audit sink. `append` returns immediately; failures are logged
/// by the recorder and never reach the caller. `flush` waits for writes that
/// are still in flight and is called once, at shutdown.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    fn append(&self, entry: AuditEntry);

    async fn flush(&self) {}
}

#[derive(Debug, Clone)]
pub struct PgAuditRecorder {
    pool: PgPool,
    tracker: TaskTracker,
}

impl PgAuditRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tracker: TaskTracker::new(),
        }
    }

    /// Inserts spawned but not yet finished.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }
}

#[async_trait]
impl AuditRecorder for PgAuditRecorder {
    fn append(&self, entry: AuditEntry) {
        let pool = self.pool.clone();
        let log = AuditLog {
            id: AuditLogId::new(),
            occurred_at: entry.occurred_at,
            actor_id: entry.actor_id,
            actor_type: entry.actor_type,
            action: entry.action,
            details: entry.details.map(Json),
        };
        self.tracker.spawn(async move {
            if let Err(err) = audit_log_repo::insert_audit_log(&pool, &log).await {
                tracing::warn!(action = %log.action, error = %err, "Failed to record audit log");
            }
        });
    }

    async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        tracing::debug!("Audit writes flushed");
    }
}

/// Keeps entries in memory; used by tests and the memory storage backend.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditRecorder {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AuditRecorder for InMemoryAuditRecorder {
    fn append(&self, entry: AuditEntry) {
        tracing::debug!(action = %entry.action, "Audit entry recorded");
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_recorder_keeps_order() {
        let recorder = InMemoryAuditRecorder::new();
        let now = Utc::now();
        recorder.append(AuditEntry::new(now, Some("t1".into()), "teacher", "session.create"));
        recorder.append(
            AuditEntry::new(now, None, "system", "sweep.absence")
                .with_details(serde_json::json!({ "created": 3 })),
        );

        let entries = recorder.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "session.create");
        assert_eq!(entries[1].details.as_ref().unwrap()["created"], 3);
    }

    #[tokio::test]
    async fn pg_recorder_flush_waits_for_spawned_inserts() {
        // Nothing listens on port 1, so the insert fails after the acquire timeout.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://rollcall@127.0.0.1:1/rollcall")
            .unwrap();
        let recorder = PgAuditRecorder::new(pool);

        recorder.append(AuditEntry::new(Utc::now(), None, "system", "sweep.absence"));
        assert_eq!(recorder.pending(), 1);

        tokio::time::timeout(std::time::Duration::from_secs(10), recorder.flush())
            .await
            .expect("flush finishes once the insert gives up");
        assert_eq!(recorder.pending(), 0);
    }
}
