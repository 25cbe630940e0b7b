pub mod audit_log;
pub mod calendar;
pub mod geofence;
pub mod marker;
pub mod notification;
pub mod report;
pub mod scheduler;
pub mod session;
