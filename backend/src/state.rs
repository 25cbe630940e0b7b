use std::sync::Arc;

use crate::{
    config::Config,
    models::attendance::Coordinates,
    repositories::{Repositories, TimetableRepositoryTrait},
    services::{
        audit_log::AuditRecorder, calendar::CalendarResolver, geofence::GeofenceValidator,
        marker::AttendanceMarker, notification::NotificationQueue, report::ReportAggregator,
        scheduler::ReconciliationScheduler, session::SessionManager,
    },
    utils::time::Clock,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub calendar: CalendarResolver,
    pub sessions: SessionManager,
    pub marker: AttendanceMarker,
    pub reports: ReportAggregator,
    pub scheduler: ReconciliationScheduler,
    pub timetables: Arc<dyn TimetableRepositoryTrait>,
}

impl AppState {
    /// Wires every service over one set of repositories and one clock.
    pub fn new(
        config: Config,
        repositories: Repositories,
        clock: Arc<dyn Clock>,
        notifications: NotificationQueue,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        let calendar = CalendarResolver::new(Arc::clone(&repositories.holidays));
        let geofence = GeofenceValidator::new(
            Coordinates {
                latitude: config.campus_latitude,
                longitude: config.campus_longitude,
            },
            config.campus_radius_meters,
        );

        let sessions = SessionManager::new(
            Arc::clone(&repositories.sessions),
            Arc::clone(&repositories.students),
            calendar.clone(),
            Arc::clone(&clock),
            config.time_zone,
            notifications.clone(),
            Arc::clone(&audit),
        );
        let marker = AttendanceMarker::new(
            Arc::clone(&repositories.sessions),
            Arc::clone(&repositories.events),
            Arc::clone(&repositories.students),
            geofence,
            Arc::clone(&clock),
            config.time_zone,
            config.campus_cutoff,
            Arc::clone(&audit),
        );
        let reports = ReportAggregator::new(
            Arc::clone(&repositories.events),
            Arc::clone(&repositories.students),
        );
        let scheduler = ReconciliationScheduler::new(
            Arc::clone(&repositories.sessions),
            Arc::clone(&repositories.events),
            Arc::clone(&repositories.students),
            calendar.clone(),
            clock,
            config.time_zone,
            notifications,
            audit,
        );

        Self {
            config,
            calendar,
            sessions,
            marker,
            reports,
            scheduler,
            timetables: repositories.timetables,
        }
    }
}
