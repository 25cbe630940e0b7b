//! Issuance and lookup of attendance sessions.

use std::sync::Arc;

use chrono_tz::Tz;

use crate::error::AppError;
use crate::models::session::{
    Session, SessionCredential, SessionMode, MAX_PERIOD, MIN_PERIOD,
};
use crate::repositories::{SessionInsertOutcome, SessionRepositoryTrait, StudentRepositoryTrait};
use crate::services::audit_log::{AuditEntry, AuditRecorder};
use crate::services::calendar::CalendarResolver;
use crate::services::notification::{Notification, NotificationQueue};
use crate::types::{ClassId, SessionId, TeacherId};
use crate::utils::credentials::{derive_network_name, generate_session_token, generate_short_code};
use crate::utils::time::Clock;

/// Attempts at drawing a credential before giving up on collisions.
pub const MAX_CREDENTIAL_ATTEMPTS: usize = 5;

/// Draws a fresh credential with the mode-specific derived forms.
pub fn issue_credential(mode: SessionMode) -> SessionCredential {
    let token = generate_session_token();
    let short_code = (mode == SessionMode::Internet).then(generate_short_code);
    let network_name = (mode == SessionMode::Wifi).then(|| derive_network_name(&token));
    SessionCredential {
        token,
        short_code,
        network_name,
    }
}

#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionRepositoryTrait>,
    students: Arc<dyn StudentRepositoryTrait>,
    calendar: CalendarResolver,
    clock: Arc<dyn Clock>,
    time_zone: Tz,
    notifications: NotificationQueue,
    audit: Arc<dyn AuditRecorder>,
}

impl SessionManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionRepositoryTrait>,
        students: Arc<dyn StudentRepositoryTrait>,
        calendar: CalendarResolver,
        clock: Arc<dyn Clock>,
        time_zone: Tz,
        notifications: NotificationQueue,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self {
            sessions,
            students,
            calendar,
            clock,
            time_zone,
            notifications,
            audit,
        }
    }

    pub async fn create_session(
        &self,
        class_id: ClassId,
        teacher_id: TeacherId,
        period: i16,
        mode: SessionMode,
    ) -> Result<Session, AppError> {
        if !(MIN_PERIOD..=MAX_PERIOD).contains(&period) {
            return Err(AppError::BadRequest(format!(
                "period must be between {} and {}",
                MIN_PERIOD, MAX_PERIOD
            )));
        }

        let now = self.clock.now();
        let today = now.with_timezone(&self.time_zone).date_naive();
        let decision = self.calendar.resolve(today).await?;
        if decision.is_holiday {
            return Err(AppError::Forbidden("holiday".into()));
        }

        for attempt in 1..=MAX_CREDENTIAL_ATTEMPTS {
            let session = Session::new(
                class_id,
                teacher_id,
                today,
                period,
                mode,
                issue_credential(mode),
                now,
            );
            match self.sessions.insert(&session, now).await? {
                SessionInsertOutcome::Inserted(session) => {
                    tracing::info!(
                        session_id = %session.id,
                        class_id = %class_id,
                        period,
                        mode = mode.as_str(),
                        "Attendance session opened"
                    );
                    self.audit.append(
                        AuditEntry::new(now, Some(teacher_id.to_string()), "teacher", "session.create")
                            .with_details(serde_json::json!({
                                "session_id": session.id,
                                "class_id": class_id,
                                "period": period,
                                "mode": mode.as_str(),
                            })),
                    );
                    self.broadcast_opened(&session);
                    return Ok(session);
                }
                SessionInsertOutcome::SlotTaken => {
                    return Err(AppError::Conflict("session active".into()));
                }
                SessionInsertOutcome::ShortCodeTaken | SessionInsertOutcome::CredentialTaken => {
                    tracing::debug!(attempt, class_id = %class_id, "Credential collision, retrying");
                }
            }
        }

        Err(AppError::InternalServerError(anyhow::anyhow!(
            "could not allocate a unique session credential after {} attempts",
            MAX_CREDENTIAL_ATTEMPTS
        )))
    }

    pub async fn get_session(&self, id: SessionId) -> Result<Session, AppError> {
        self.sessions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("session not found".into()))
    }

    /// Queues a notice to every active student of the class. Runs detached
    /// from the request; roster lookup failures are only logged.
    fn broadcast_opened(&self, session: &Session) {
        let students = Arc::clone(&self.students);
        let queue = self.notifications.clone();
        let class_id = session.class_id;
        let title = "Attendance open".to_string();
        let body = format!(
            "Period {} attendance is open until {}",
            session.period,
            session.expires_at.with_timezone(&self.time_zone).format("%H:%M")
        );

        tokio::spawn(async move {
            match students.list_by_class(class_id).await {
                Ok(roster) => {
                    for student in roster {
                        queue.submit(Notification::new(
                            student.id.to_string(),
                            title.clone(),
                            body.clone(),
                        ));
                    }
                }
                Err(err) => {
                    tracing::warn!(class_id = %class_id, error = %err, "Session broadcast skipped");
                }
            }
        });
    }
}
