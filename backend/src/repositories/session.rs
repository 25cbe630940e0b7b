//! Attendance session repository.
//!
//! Slot uniqueness is enforced by the `attendance_sessions_active_slot_key`
//! partial unique index; the insert path never reads before writing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::session::{Session, SessionRow};
use crate::repositories::transaction::{begin_transaction, commit_transaction, rollback_transaction};
use crate::types::SessionId;

const ACTIVE_SLOT_CONSTRAINT: &str = "attendance_sessions_active_slot_key";
const ACTIVE_SHORT_CODE_CONSTRAINT: &str = "attendance_sessions_active_short_code_key";

const SELECT_COLUMNS: &str = "id, class_id, teacher_id, session_date, period, mode, credential, \
     short_code, network_name, is_active, present_students, created_at, expires_at";

/// Result of an atomic session insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInsertOutcome {
    Inserted(Session),
    /// Another live session already holds the (class, date, period) slot.
    SlotTaken,
    /// The short code is in use by another live session.
    ShortCodeTaken,
    /// The token collided with an existing session.
    CredentialTaken,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepositoryTrait: Send + Sync {
    /// Inserts `session`. A session still flagged active for the same slot
    /// whose window closed at or before `now` is deactivated in the same
    /// transaction.
    async fn insert(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<SessionInsertOutcome, AppError>;

    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>, AppError>;

    /// Deactivates every active session with `expires_at < now`.
    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepositoryTrait for SessionRepository {
    async fn insert(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<SessionInsertOutcome, AppError> {
        let mut tx = begin_transaction(&self.pool).await?;

        let superseded = sqlx::query(
            "UPDATE attendance_sessions SET is_active = FALSE \
             WHERE class_id = $1 AND session_date = $2 AND period = $3 \
               AND is_active AND expires_at <= $4",
        )
        .bind(session.class_id)
        .bind(session.date)
        .bind(session.period)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if superseded.rows_affected() > 0 {
            tracing::debug!(
                class_id = %session.class_id,
                period = session.period,
                "Superseded stale attendance session"
            );
        }

        let query = format!(
            "INSERT INTO attendance_sessions \
             (id, class_id, teacher_id, session_date, period, mode, credential, short_code, \
              network_name, is_active, present_students, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {}",
            SELECT_COLUMNS
        );
        let present: Vec<uuid::Uuid> = session
            .present_students
            .iter()
            .map(|id| *id.as_uuid())
            .collect();
        let inserted = sqlx::query_as::<_, SessionRow>(&query)
            .bind(session.id)
            .bind(session.class_id)
            .bind(session.teacher_id)
            .bind(session.date)
            .bind(session.period)
            .bind(session.mode.as_str())
            .bind(&session.credential.token)
            .bind(session.credential.short_code.as_deref())
            .bind(session.credential.network_name.as_deref())
            .bind(session.is_active)
            .bind(&present)
            .bind(session.created_at)
            .bind(session.expires_at)
            .fetch_one(&mut *tx)
            .await;

        match inserted {
            Ok(row) => {
                commit_transaction(tx).await?;
                Ok(SessionInsertOutcome::Inserted(row.try_into()?))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let outcome = match db_err.constraint() {
                    Some(ACTIVE_SLOT_CONSTRAINT) => SessionInsertOutcome::SlotTaken,
                    Some(ACTIVE_SHORT_CODE_CONSTRAINT) => SessionInsertOutcome::ShortCodeTaken,
                    _ => SessionInsertOutcome::CredentialTaken,
                };
                rollback_transaction(tx).await?;
                Ok(outcome)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>, AppError> {
        let query = format!(
            "SELECT {} FROM attendance_sessions WHERE id = $1",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, SessionRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Session::try_from).transpose()
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE attendance_sessions SET is_active = FALSE \
             WHERE is_active AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
