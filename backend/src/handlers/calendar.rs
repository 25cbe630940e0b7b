use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::timetable::Weekday,
    services::calendar::CalendarDecision,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct CalendarDayResponse {
    pub date: NaiveDate,
    pub is_holiday: bool,
    pub is_working_day: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_day: Option<Weekday>,
}

impl CalendarDayResponse {
    fn new(date: NaiveDate, decision: CalendarDecision) -> Self {
        Self {
            date,
            is_holiday: decision.is_holiday,
            is_working_day: decision.is_working_day,
            reason: decision.reason.label().to_string(),
            mapped_day: decision.mapped_day,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CalendarMonthQuery {
    pub year: i32,
    pub month: u32,
}

pub async fn resolve_date(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<CalendarDayResponse>, AppError> {
    let decision = state.calendar.resolve(date).await?;
    Ok(Json(CalendarDayResponse::new(date, decision)))
}

pub async fn list_month(
    State(state): State<AppState>,
    Query(query): Query<CalendarMonthQuery>,
) -> Result<Json<Vec<CalendarDayResponse>>, AppError> {
    let entries = state.calendar.list_month(query.year, query.month).await?;
    Ok(Json(
        entries
            .into_iter()
            .map(|entry| CalendarDayResponse::new(entry.date, entry.decision))
            .collect(),
    ))
}
