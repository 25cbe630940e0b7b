use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attendance::{AttendanceEvent, BackfillReasonPayload, CampusMarkPayload, Coordinates, ManualMarkPayload},
        principal::Principal,
    },
    services::marker::ManualMark,
    state::AppState,
    types::AttendanceEventId,
};

use super::require_student;

/// Repeat calls on the same day return the first record.
pub async fn mark_campus(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CampusMarkPayload>,
) -> Result<Json<AttendanceEvent>, AppError> {
    payload.validate()?;
    let student_id = require_student(&principal)?;
    let location = Coordinates::new(payload.latitude, payload.longitude)?;

    let event = state
        .marker
        .mark_campus_attendance(student_id, location, principal.device_id.clone())
        .await?;
    Ok(Json(event))
}

pub async fn mark_manual(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<ManualMarkPayload>,
) -> Result<(StatusCode, Json<AttendanceEvent>), AppError> {
    payload.validate()?;
    let mark = ManualMark {
        student_id: payload.student_id,
        class_id: payload.class_id,
        period: payload.period,
        status: payload.status,
        reason: payload.reason,
    };
    let event = state.marker.mark_manual(&principal, mark).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn backfill_reason(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(event_id): Path<AttendanceEventId>,
    Json(payload): Json<BackfillReasonPayload>,
) -> Result<Json<AttendanceEvent>, AppError> {
    payload.validate()?;
    let event = state
        .marker
        .backfill_reason(&principal, event_id, &payload.reason)
        .await?;
    Ok(Json(event))
}
