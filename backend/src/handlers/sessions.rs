use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attendance::{AttendanceEvent, Coordinates},
        principal::Principal,
        session::{CreateSessionPayload, MarkClassPayload, SessionResponse},
    },
    state::AppState,
    types::SessionId,
};

use super::{require_staff, require_student};

pub async fn create_session(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateSessionPayload>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    payload.validate()?;
    let teacher_id = principal
        .as_teacher()
        .ok_or_else(|| AppError::Forbidden("staff only".into()))?;

    let session = state
        .sessions
        .create_session(payload.class_id, teacher_id, payload.period, payload.mode)
        .await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionResponse>, AppError> {
    require_staff(&principal)?;
    let session = state.sessions.get_session(session_id).await?;
    Ok(Json(session.into()))
}

pub async fn mark_class(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(session_id): Path<SessionId>,
    Json(payload): Json<MarkClassPayload>,
) -> Result<(StatusCode, Json<AttendanceEvent>), AppError> {
    payload.validate()?;
    let student_id = require_student(&principal)?;
    let location = Coordinates::from_optional(payload.latitude, payload.longitude)?;

    let event = state
        .marker
        .mark_class_attendance(
            session_id,
            student_id,
            &payload.credential,
            principal.device_id.clone(),
            location,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}
