//! Validation and recording of individual attendance determinations.

use std::sync::Arc;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::error::AppError;
use crate::models::attendance::{
    AttendanceEvent, AttendanceStatus, AttendanceType, Coordinates, EventKey, MarkingMode,
};
use crate::models::principal::Principal;
use crate::models::session::{Session, SessionMode, MAX_PERIOD, MIN_PERIOD};
use crate::repositories::{
    AttendanceEventRepositoryTrait, SessionRepositoryTrait, StudentRepositoryTrait,
};
use crate::services::audit_log::{AuditEntry, AuditRecorder};
use crate::services::geofence::GeofenceValidator;
use crate::types::{AttendanceEventId, ClassId, SessionId, StudentId};
use crate::utils::credentials::credentials_match;
use crate::utils::time::Clock;

/// Manual override entered by staff.
#[derive(Debug, Clone)]
pub struct ManualMark {
    pub student_id: StudentId,
    pub class_id: ClassId,
    /// `None` records a CAMPUS determination.
    pub period: Option<i16>,
    pub status: AttendanceStatus,
    pub reason: Option<String>,
}

#[derive(Clone)]
pub struct AttendanceMarker {
    sessions: Arc<dyn SessionRepositoryTrait>,
    events: Arc<dyn AttendanceEventRepositoryTrait>,
    students: Arc<dyn StudentRepositoryTrait>,
    geofence: GeofenceValidator,
    clock: Arc<dyn Clock>,
    time_zone: Tz,
    campus_cutoff: NaiveTime,
    audit: Arc<dyn AuditRecorder>,
}

impl AttendanceMarker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionRepositoryTrait>,
        events: Arc<dyn AttendanceEventRepositoryTrait>,
        students: Arc<dyn StudentRepositoryTrait>,
        geofence: GeofenceValidator,
        clock: Arc<dyn Clock>,
        time_zone: Tz,
        campus_cutoff: NaiveTime,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self {
            sessions,
            events,
            students,
            geofence,
            clock,
            time_zone,
            campus_cutoff,
            audit,
        }
    }

    pub async fn mark_class_attendance(
        &self,
        session_id: SessionId,
        student_id: StudentId,
        credential: &str,
        device_id: Option<String>,
        location: Option<Coordinates>,
    ) -> Result<AttendanceEvent, AppError> {
        let now = self.clock.now();
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("session not found".into()))?;

        if !session.accepts_marks_at(now) {
            return Err(AppError::Expired("session expired".into()));
        }
        if !credential_accepted(&session, credential) {
            tracing::warn!(session_id = %session_id, student_id = %student_id, "Credential mismatch");
            return Err(AppError::Forbidden("token mismatch".into()));
        }

        let event = AttendanceEvent::class(
            student_id,
            session.class_id,
            session.date,
            session.period,
            AttendanceStatus::Present,
            session.mode.into(),
            now,
        )
        .with_location(location)
        .with_device(device_id)
        .with_marked_by(Some(*session.teacher_id.as_uuid()));

        match self.events.insert_class_mark(&event, session.id).await? {
            Some(event) => {
                tracing::info!(
                    session_id = %session_id,
                    student_id = %student_id,
                    period = session.period,
                    "Class attendance marked"
                );
                Ok(event)
            }
            None => Err(AppError::Conflict("already marked".into())),
        }
    }

    /// Idempotent per student and day: a second call returns the first
    /// record unchanged.
    pub async fn mark_campus_attendance(
        &self,
        student_id: StudentId,
        location: Coordinates,
        device_id: Option<String>,
    ) -> Result<AttendanceEvent, AppError> {
        let now = self.clock.now();
        let local_now = now.with_timezone(&self.time_zone);
        let today = local_now.date_naive();
        let key = EventKey {
            student_id,
            date: today,
            attendance_type: AttendanceType::Campus,
            period: 0,
        };

        if let Some(existing) = self.events.find_by_key(key).await? {
            return Ok(existing);
        }
        if local_now.time() >= self.campus_cutoff {
            return Err(AppError::Forbidden("cutoff passed".into()));
        }
        if !self.geofence.is_within_campus(location) {
            tracing::debug!(
                student_id = %student_id,
                distance_m = self.geofence.distance_to(location),
                radius_m = self.geofence.radius_meters(),
                "Campus mark outside geofence"
            );
            return Err(AppError::Forbidden("outside campus".into()));
        }

        let student = self
            .students
            .find_by_id(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound("student not found".into()))?;

        let event = AttendanceEvent::campus(
            student_id,
            student.class_id,
            today,
            AttendanceStatus::Present,
            MarkingMode::Gps,
            now,
        )
        .with_location(Some(location))
        .with_device(device_id);

        if let Some(event) = self.events.insert(&event).await? {
            tracing::info!(student_id = %student_id, "Campus attendance marked");
            return Ok(event);
        }

        // Lost a race with a concurrent mark; hand back the winner.
        self.events.find_by_key(key).await?.ok_or_else(|| {
            AppError::InternalServerError(anyhow::anyhow!(
                "campus event for {} vanished after conflict",
                student_id
            ))
        })
    }

    pub async fn mark_manual(
        &self,
        actor: &Principal,
        mark: ManualMark,
    ) -> Result<AttendanceEvent, AppError> {
        ensure_staff(actor)?;
        if let Some(period) = mark.period {
            if !(MIN_PERIOD..=MAX_PERIOD).contains(&period) {
                return Err(AppError::BadRequest(format!(
                    "period must be between {} and {}",
                    MIN_PERIOD, MAX_PERIOD
                )));
            }
        }
        if self.students.find_by_id(mark.student_id).await?.is_none() {
            return Err(AppError::NotFound("student not found".into()));
        }

        let now = self.clock.now();
        let today = now.with_timezone(&self.time_zone).date_naive();
        let event = match mark.period {
            Some(period) => AttendanceEvent::class(
                mark.student_id,
                mark.class_id,
                today,
                period,
                mark.status,
                MarkingMode::Manual,
                now,
            ),
            None => AttendanceEvent::campus(
                mark.student_id,
                mark.class_id,
                today,
                mark.status,
                MarkingMode::Manual,
                now,
            ),
        }
        .with_marked_by(Some(actor.id))
        .with_reason(mark.reason);

        let event = self
            .events
            .insert(&event)
            .await?
            .ok_or_else(|| AppError::Conflict("already marked".into()))?;

        self.audit.append(
            AuditEntry::new(now, Some(actor.id.to_string()), actor.role.as_str(), "attendance.manual")
                .with_details(serde_json::json!({
                    "event_id": event.id,
                    "student_id": event.student_id,
                    "type": event.attendance_type.as_str(),
                    "status": event.status.as_str(),
                })),
        );
        Ok(event)
    }

    /// Sets the reason on an existing event; nothing else is ever changed.
    pub async fn backfill_reason(
        &self,
        actor: &Principal,
        event_id: AttendanceEventId,
        reason: &str,
    ) -> Result<AttendanceEvent, AppError> {
        ensure_staff(actor)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::BadRequest("reason must not be empty".into()));
        }

        let event = self
            .events
            .update_reason(event_id, reason)
            .await?
            .ok_or_else(|| AppError::NotFound("attendance event not found".into()))?;

        self.audit.append(
            AuditEntry::new(
                self.clock.now(),
                Some(actor.id.to_string()),
                actor.role.as_str(),
                "attendance.reason",
            )
            .with_details(serde_json::json!({ "event_id": event_id })),
        );
        Ok(event)
    }
}

fn ensure_staff(actor: &Principal) -> Result<(), AppError> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden("staff only".into()))
    }
}

/// Token match in constant time; INTERNET sessions also take the short code.
fn credential_accepted(session: &Session, supplied: &str) -> bool {
    let token_ok = credentials_match(supplied, &session.credential.token);
    let short_code_ok = match (&session.mode, &session.credential.short_code) {
        (SessionMode::Internet, Some(code)) => {
            credentials_match(&supplied.trim().to_ascii_uppercase(), code)
        }
        _ => false,
    };
    token_ok | short_code_ok
}
