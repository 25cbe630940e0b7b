//! Transaction helpers for the Postgres repositories.

use anyhow::anyhow;
use sqlx::postgres::PgTransaction;
use sqlx::PgPool;

use crate::error::AppError;

pub async fn begin_transaction(pool: &PgPool) -> Result<PgTransaction<'_>, AppError> {
    pool.begin().await.map_err(|err| transaction_error("begin", err))
}

pub async fn commit_transaction(tx: PgTransaction<'_>) -> Result<(), AppError> {
    tx.commit().await.map_err(|err| transaction_error("commit", err))
}

/// Used after an expected conflict; the caller reports the conflict, not
/// the rollback.
pub async fn rollback_transaction(tx: PgTransaction<'_>) -> Result<(), AppError> {
    tx.rollback()
        .await
        .map_err(|err| transaction_error("rollback", err))
}

fn transaction_error(stage: &'static str, err: sqlx::Error) -> AppError {
    tracing::error!(stage, error = %err, "Database transaction failed");
    AppError::InternalServerError(anyhow!("transaction {} failed: {}", stage, err))
}
