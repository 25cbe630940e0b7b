//! Attendance event repository.
//!
//! Events are append-only. The `attendance_events_identity_key` unique index
//! makes every insert idempotent: a conflicting insert reports `None`
//! instead of an error.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::attendance::{AttendanceEvent, AttendanceEventRow, EventKey};
use crate::repositories::transaction::{begin_transaction, commit_transaction, rollback_transaction};
use crate::types::{AttendanceEventId, ClassId, SessionId, StudentId};

const TABLE_NAME: &str = "attendance_events";
const SELECT_COLUMNS: &str = "id, student_id, class_id, event_date, event_type, period, status, \
     mode, latitude, longitude, device_id, marked_by, reason, created_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttendanceEventRepositoryTrait: Send + Sync {
    /// Inserts the event unless one with the same identity key exists.
    async fn insert(&self, event: &AttendanceEvent) -> Result<Option<AttendanceEvent>, AppError>;

    /// Inserts a CLASS event and records the student on the session roster
    /// in one transaction.
    async fn insert_class_mark(
        &self,
        event: &AttendanceEvent,
        session_id: SessionId,
    ) -> Result<Option<AttendanceEvent>, AppError>;

    async fn find_by_id(&self, id: AttendanceEventId)
        -> Result<Option<AttendanceEvent>, AppError>;

    async fn find_by_key(&self, key: EventKey) -> Result<Option<AttendanceEvent>, AppError>;

    /// Students holding any CAMPUS event on `date`.
    async fn list_campus_marked(&self, date: NaiveDate) -> Result<Vec<StudentId>, AppError>;

    /// CLASS events for a class within an inclusive date range.
    async fn list_class_events(
        &self,
        class_id: ClassId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, AppError>;

    /// Sets the free-text reason, the only mutable field of an event.
    async fn update_reason(
        &self,
        id: AttendanceEventId,
        reason: &str,
    ) -> Result<Option<AttendanceEvent>, AppError>;
}

#[derive(Debug, Clone)]
pub struct AttendanceEventRepository {
    pool: PgPool,
}

impl AttendanceEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn insert_query() -> String {
        format!(
            "INSERT INTO {} ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT DO NOTHING \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS, SELECT_COLUMNS
        )
    }
}

fn bind_event<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, AttendanceEventRow, sqlx::postgres::PgArguments>,
    event: &'q AttendanceEvent,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, AttendanceEventRow, sqlx::postgres::PgArguments> {
    query
        .bind(event.id)
        .bind(event.student_id)
        .bind(event.class_id)
        .bind(event.date)
        .bind(event.attendance_type.as_str())
        .bind(event.period)
        .bind(event.status.as_str())
        .bind(event.mode.as_str())
        .bind(event.location.map(|l| l.latitude))
        .bind(event.location.map(|l| l.longitude))
        .bind(event.device_id.as_deref())
        .bind(event.marked_by)
        .bind(event.reason.as_deref())
        .bind(event.created_at)
}

#[async_trait]
impl AttendanceEventRepositoryTrait for AttendanceEventRepository {
    async fn insert(&self, event: &AttendanceEvent) -> Result<Option<AttendanceEvent>, AppError> {
        let query = Self::insert_query();
        let row = bind_event(sqlx::query_as::<_, AttendanceEventRow>(&query), event)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AttendanceEvent::try_from).transpose()
    }

    async fn insert_class_mark(
        &self,
        event: &AttendanceEvent,
        session_id: SessionId,
    ) -> Result<Option<AttendanceEvent>, AppError> {
        let mut tx = begin_transaction(&self.pool).await?;
        let query = Self::insert_query();
        let row = bind_event(sqlx::query_as::<_, AttendanceEventRow>(&query), event)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            rollback_transaction(tx).await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE attendance_sessions \
             SET present_students = array_append(present_students, $2) \
             WHERE id = $1 AND NOT ($2 = ANY(present_students))",
        )
        .bind(session_id)
        .bind(event.student_id)
        .execute(&mut *tx)
        .await?;

        commit_transaction(tx).await?;
        Ok(Some(row.try_into()?))
    }

    async fn find_by_id(
        &self,
        id: AttendanceEventId,
    ) -> Result<Option<AttendanceEvent>, AppError> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", SELECT_COLUMNS, TABLE_NAME);
        let row = sqlx::query_as::<_, AttendanceEventRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AttendanceEvent::try_from).transpose()
    }

    async fn find_by_key(&self, key: EventKey) -> Result<Option<AttendanceEvent>, AppError> {
        let query = format!(
            "SELECT {} FROM {} \
             WHERE student_id = $1 AND event_date = $2 AND event_type = $3 \
               AND COALESCE(period, 0) = $4",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, AttendanceEventRow>(&query)
            .bind(key.student_id)
            .bind(key.date)
            .bind(key.attendance_type.as_str())
            .bind(key.period)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AttendanceEvent::try_from).transpose()
    }

    async fn list_campus_marked(&self, date: NaiveDate) -> Result<Vec<StudentId>, AppError> {
        let query = format!(
            "SELECT student_id FROM {} WHERE event_date = $1 AND event_type = 'CAMPUS'",
            TABLE_NAME
        );
        let ids: Vec<Uuid> = sqlx::query_scalar(&query)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(StudentId::from).collect())
    }

    async fn list_class_events(
        &self,
        class_id: ClassId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, AppError> {
        let query = format!(
            "SELECT {} FROM {} \
             WHERE class_id = $1 AND event_type = 'CLASS' \
               AND event_date BETWEEN $2 AND $3 \
             ORDER BY event_date ASC, period ASC",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, AttendanceEventRow>(&query)
            .bind(class_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(AttendanceEvent::try_from).collect()
    }

    async fn update_reason(
        &self,
        id: AttendanceEventId,
        reason: &str,
    ) -> Result<Option<AttendanceEvent>, AppError> {
        let query = format!(
            "UPDATE {} SET reason = $2 WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, AttendanceEventRow>(&query)
            .bind(id)
            .bind(reason)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AttendanceEvent::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_query_is_conflict_tolerant() {
        let query = AttendanceEventRepository::insert_query();
        assert!(query.contains("ON CONFLICT DO NOTHING"));
        assert!(query.starts_with("INSERT INTO attendance_events"));
    }

    #[test]
    fn insert_placeholders_match_column_count() {
        let columns = SELECT_COLUMNS.split(',').count();
        let query = AttendanceEventRepository::insert_query();
        assert!(query.contains(&format!("${}", columns)));
        assert!(!query.contains(&format!("${}", columns + 1)));
    }
}
