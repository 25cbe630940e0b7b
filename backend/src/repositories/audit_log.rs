use sqlx::PgPool;

use crate::models::audit_log::AuditLog;

pub async fn insert_audit_log(pool: &PgPool, log: &AuditLog) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_logs (id, occurred_at, actor_id, actor_type, action, details) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(log.id)
    .bind(log.occurred_at)
    .bind(log.actor_id.as_deref())
    .bind(&log.actor_type)
    .bind(&log.action)
    .bind(&log.details)
    .execute(pool)
    .await
    .map(|_| ())
}
