pub mod attendance;
pub mod audit_log;
pub mod holiday;
pub mod memory;
pub mod session;
pub mod student;
pub mod timetable;
pub mod transaction;

use std::sync::Arc;

use sqlx::PgPool;

pub use attendance::{AttendanceEventRepository, AttendanceEventRepositoryTrait};
pub use holiday::{HolidayRuleRepository, HolidayRuleRepositoryTrait};
pub use memory::InMemoryStore;
pub use session::{SessionInsertOutcome, SessionRepository, SessionRepositoryTrait};
pub use student::{StudentRepository, StudentRepositoryTrait};
pub use timetable::{TimetableRepository, TimetableRepositoryTrait};

/// Storage handles shared by every service.
#[derive(Clone)]
pub struct Repositories {
    pub sessions: Arc<dyn SessionRepositoryTrait>,
    pub events: Arc<dyn AttendanceEventRepositoryTrait>,
    pub holidays: Arc<dyn HolidayRuleRepositoryTrait>,
    pub students: Arc<dyn StudentRepositoryTrait>,
    pub timetables: Arc<dyn TimetableRepositoryTrait>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            sessions: Arc::new(SessionRepository::new(pool.clone())),
            events: Arc::new(AttendanceEventRepository::new(pool.clone())),
            holidays: Arc::new(HolidayRuleRepository::new(pool.clone())),
            students: Arc::new(StudentRepository::new(pool.clone())),
            timetables: Arc::new(TimetableRepository::new(pool)),
        }
    }

    pub fn in_memory(store: InMemoryStore) -> Self {
        Self {
            sessions: Arc::new(store.clone()),
            events: Arc::new(store.clone()),
            holidays: Arc::new(store.clone()),
            students: Arc::new(store.clone()),
            timetables: Arc::new(store),
        }
    }
}
