use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::timetable::{PeriodEntry, Timetable, Weekday};
use crate::types::ClassId;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimetableRepositoryTrait: Send + Sync {
    async fn find_by_class(&self, class_id: ClassId) -> Result<Option<Timetable>, AppError>;
}

#[derive(Debug, FromRow)]
struct TimetableRow {
    class_id: Uuid,
    days: Json<BTreeMap<Weekday, Vec<PeriodEntry>>>,
}

#[derive(Debug, Clone)]
pub struct TimetableRepository {
    pool: PgPool,
}

impl TimetableRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TimetableRepositoryTrait for TimetableRepository {
    async fn find_by_class(&self, class_id: ClassId) -> Result<Option<Timetable>, AppError> {
        let row = sqlx::query_as::<_, TimetableRow>(
            "SELECT class_id, days FROM timetables WHERE class_id = $1",
        )
        .bind(class_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let mut timetable = Timetable::new(row.class_id.into());
            for (day, entries) in row.days.0 {
                timetable.set_day(day, entries);
            }
            timetable
        }))
    }
}
