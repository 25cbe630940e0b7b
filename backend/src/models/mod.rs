pub mod attendance;
pub mod audit_log;
pub mod holiday;
pub mod principal;
pub mod session;
pub mod student;
pub mod timetable;
