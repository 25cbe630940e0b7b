//! Periodic reconciliation: the daily absence sweep and the session expiry
//! sweep. Both are plain async methods so they can be driven by the
//! in-process timer loop or by the one-shot binaries.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::attendance::{AttendanceEvent, AttendanceStatus, MarkingMode};
use crate::repositories::{
    AttendanceEventRepositoryTrait, SessionRepositoryTrait, StudentRepositoryTrait,
};
use crate::services::audit_log::{AuditEntry, AuditRecorder};
use crate::services::calendar::CalendarResolver;
use crate::services::notification::{Notification, NotificationQueue};
use crate::types::StudentId;
use crate::utils::time::{now_in_timezone, today_local, Clock};

/// Longest the timer loop sleeps before re-reading the clock.
const MAX_IDLE: Duration = Duration::from_secs(60);
/// How long the sweep waits on a full notification queue per notice.
pub const NOTICE_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub created: u32,
    pub already_marked: u32,
    pub failed: u32,
    /// Absence notices that could not be queued.
    pub notices_dropped: u32,
    /// Set when the calendar declared the day a holiday and nothing ran.
    pub holiday: bool,
}

#[derive(Clone)]
pub struct ReconciliationScheduler {
    sessions: Arc<dyn SessionRepositoryTrait>,
    events: Arc<dyn AttendanceEventRepositoryTrait>,
    students: Arc<dyn StudentRepositoryTrait>,
    calendar: CalendarResolver,
    clock: Arc<dyn Clock>,
    time_zone: Tz,
    notifications: NotificationQueue,
    audit: Arc<dyn AuditRecorder>,
}

impl ReconciliationScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionRepositoryTrait>,
        events: Arc<dyn AttendanceEventRepositoryTrait>,
        students: Arc<dyn StudentRepositoryTrait>,
        calendar: CalendarResolver,
        clock: Arc<dyn Clock>,
        time_zone: Tz,
        notifications: NotificationQueue,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self {
            sessions,
            events,
            students,
            calendar,
            clock,
            time_zone,
            notifications,
            audit,
        }
    }

    /// Creates an ABSENT CAMPUS event for every active student without a
    /// CAMPUS event on `date`. Safe to re-run: existing events are counted as
    /// already marked. A failure on one student does not stop the others.
    pub async fn run_daily_absence_sweep(&self, date: NaiveDate) -> Result<SweepReport, AppError> {
        let decision = self.calendar.resolve(date).await?;
        if decision.is_holiday {
            tracing::info!(%date, reason = decision.reason.label(), "Absence sweep skipped on holiday");
            return Ok(SweepReport {
                holiday: true,
                ..SweepReport::default()
            });
        }

        let students = self.students.list_active().await?;
        let marked: HashSet<StudentId> = self
            .events
            .list_campus_marked(date)
            .await?
            .into_iter()
            .collect();

        let now = self.clock.now();
        let mut report = SweepReport::default();
        for student in students {
            if marked.contains(&student.id) {
                report.already_marked += 1;
                continue;
            }

            let event = AttendanceEvent::campus(
                student.id,
                student.class_id,
                date,
                AttendanceStatus::Absent,
                MarkingMode::Manual,
                now,
            );
            match self.events.insert(&event).await {
                Ok(Some(_)) => {
                    report.created += 1;
                    let notice = Notification::new(
                        student.id.to_string(),
                        "Marked absent",
                        format!("No campus check-in was recorded on {}", date),
                    );
                    if let Err(err) = self
                        .notifications
                        .enqueue(notice, NOTICE_ENQUEUE_TIMEOUT)
                        .await
                    {
                        report.notices_dropped += 1;
                        tracing::warn!(
                            student_id = %student.id,
                            %date,
                            error = %err,
                            "Absence notice dropped"
                        );
                    }
                }
                Ok(None) => report.already_marked += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        student_id = %student.id,
                        %date,
                        error = %err,
                        "Absence sweep failed for student"
                    );
                }
            }
        }

        tracing::info!(
            %date,
            created = report.created,
            already_marked = report.already_marked,
            failed = report.failed,
            notices_dropped = report.notices_dropped,
            "Absence sweep finished"
        );
        self.audit.append(
            AuditEntry::new(now, None, "system", "sweep.absence").with_details(
                serde_json::json!({
                    "date": date,
                    "created": report.created,
                    "already_marked": report.already_marked,
                    "failed": report.failed,
                    "notices_dropped": report.notices_dropped,
                }),
            ),
        );
        Ok(report)
    }

    /// Runs the absence sweep for the clock's local date.
    pub async fn run_absence_sweep_today(&self) -> Result<SweepReport, AppError> {
        let today = today_local(self.clock.as_ref(), &self.time_zone);
        self.run_daily_absence_sweep(today).await
    }

    /// Deactivates sessions whose window has closed.
    pub async fn run_session_expiry_sweep(&self) -> Result<u64, AppError> {
        let expired = self.sessions.expire_stale(self.clock.now()).await?;
        if expired > 0 {
            tracing::info!(expired, "Expired attendance sessions");
        }
        Ok(expired)
    }

    /// Starts both timers on a background task until `shutdown` fires.
    ///
    /// The expiry sweep runs on a tokio interval, first at startup. The
    /// absence trigger is judged against the injected clock: the loop sleeps
    /// at most [`MAX_IDLE`] before re-reading it, and each trigger instant
    /// fires once.
    pub fn spawn(
        self,
        absence_sweep_time: NaiveTime,
        expiry_interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut expiry = tokio::time::interval(expiry_interval);
            expiry.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut next_absence = next_daily_run(
                now_in_timezone(self.clock.as_ref(), &self.time_zone),
                absence_sweep_time,
            );

            loop {
                let local_now = now_in_timezone(self.clock.as_ref(), &self.time_zone);
                if let Some(due) = next_absence.filter(|due| *due <= local_now) {
                    if let Err(err) = self.run_daily_absence_sweep(due.date_naive()).await {
                        tracing::error!(error = %err, "Absence sweep aborted");
                    }
                    next_absence = next_daily_run(local_now, absence_sweep_time);
                    continue;
                }

                let wait = next_absence
                    .and_then(|due| (due - local_now).to_std().ok())
                    .map_or(MAX_IDLE, |wait| wait.min(MAX_IDLE));

                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Reconciliation scheduler stopped");
                        break;
                    }
                    _ = expiry.tick() => {
                        if let Err(err) = self.run_session_expiry_sweep().await {
                            tracing::error!(error = %err, "Session expiry sweep failed");
                        }
                    }
                    _ = tokio::time::sleep(wait) => {
                        if next_absence.is_none() {
                            next_absence = next_daily_run(
                                now_in_timezone(self.clock.as_ref(), &self.time_zone),
                                absence_sweep_time,
                            );
                        }
                    }
                }
            }
        })
    }
}

/// Next local instant strictly after `now` at `at`, skipping Sundays.
pub fn next_daily_run(now: DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Tz>> {
    let mut date = now.date_naive();
    if now.time() >= at {
        date = date.succ_opt()?;
    }
    if date.weekday() == Weekday::Sun {
        date = date.succ_opt()?;
    }

    let tz = now.timezone();
    let local = date.and_time(at);
    tz.from_local_datetime(&local)
        .earliest()
        // Trigger falls in a DST gap; fire an hour later instead.
        .or_else(|| {
            tz.from_local_datetime(&(local + chrono::Duration::hours(1)))
                .earliest()
        })
}
