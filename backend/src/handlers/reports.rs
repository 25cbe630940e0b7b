use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::{
        principal::Principal,
        timetable::{PeriodEntry, Timetable},
    },
    services::report::StudentSummary,
    state::AppState,
    types::ClassId,
};

use super::require_staff;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

pub async fn class_report(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(class_id): Path<ClassId>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<StudentSummary>>, AppError> {
    require_staff(&principal)?;
    let rows = state
        .reports
        .summarize(class_id, query.from, query.to)
        .await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct TimetableQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub is_holiday: bool,
    pub reason: String,
    pub periods: Vec<PeriodEntry>,
}

#[derive(Debug, Serialize)]
pub struct TimetableResponse {
    #[serde(flatten)]
    pub timetable: Timetable,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<DaySchedule>,
}

/// Weekly timetable of a class; with `?date=` also the periods actually held
/// that day after holiday and working-Saturday resolution.
pub async fn class_timetable(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(class_id): Path<ClassId>,
    Query(query): Query<TimetableQuery>,
) -> Result<Json<TimetableResponse>, AppError> {
    let timetable = state
        .timetables
        .find_by_class(class_id)
        .await?
        .ok_or_else(|| AppError::NotFound("timetable not found".into()))?;

    let schedule = match query.date {
        Some(date) => {
            let decision = state.calendar.resolve(date).await?;
            Some(DaySchedule {
                date,
                is_holiday: decision.is_holiday,
                reason: decision.reason.label().to_string(),
                periods: timetable.periods_on(date, &decision).to_vec(),
            })
        }
        None => None,
    };

    Ok(Json(TimetableResponse {
        timetable,
        schedule,
    }))
}
