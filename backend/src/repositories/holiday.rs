//! Holiday rule repository.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::holiday::{HolidayRule, HolidayRuleRow};

const TABLE_NAME: &str = "holiday_rules";
const SELECT_COLUMNS: &str = "id, name, start_date, end_date, rule_type, mapped_day, created_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HolidayRuleRepositoryTrait: Send + Sync {
    /// Rules whose inclusive range intersects `[from, to]`.
    async fn find_overlapping(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HolidayRule>, AppError>;
}

#[derive(Debug, Clone)]
pub struct HolidayRuleRepository {
    pool: PgPool,
}

impl HolidayRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HolidayRuleRepositoryTrait for HolidayRuleRepository {
    async fn find_overlapping(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HolidayRule>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE start_date <= $2 AND end_date >= $1 \
             ORDER BY start_date ASC",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, HolidayRuleRow>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(HolidayRule::try_from).collect()
    }
}
