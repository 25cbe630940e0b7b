//! Process-local storage backend.
//!
//! One mutex guards every table, so each trait call is atomic and observes
//! the same uniqueness rules the PostgreSQL indexes enforce. Clones share
//! the same underlying state.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::AppError;
use crate::models::attendance::{AttendanceEvent, AttendanceType, EventKey};
use crate::models::holiday::HolidayRule;
use crate::models::session::Session;
use crate::models::student::Student;
use crate::models::timetable::Timetable;
use crate::repositories::attendance::AttendanceEventRepositoryTrait;
use crate::repositories::holiday::HolidayRuleRepositoryTrait;
use crate::repositories::session::{SessionInsertOutcome, SessionRepositoryTrait};
use crate::repositories::student::StudentRepositoryTrait;
use crate::repositories::timetable::TimetableRepositoryTrait;
use crate::types::{AttendanceEventId, ClassId, SessionId, StudentId};

type SlotKey = (ClassId, NaiveDate, i16);

#[derive(Debug, Default)]
struct MemoryState {
    sessions: HashMap<SessionId, Session>,
    active_slots: HashMap<SlotKey, SessionId>,
    active_short_codes: HashMap<String, SessionId>,
    credentials: HashSet<String>,
    events: HashMap<AttendanceEventId, AttendanceEvent>,
    event_keys: HashMap<EventKey, AttendanceEventId>,
    holiday_rules: Vec<HolidayRule>,
    students: HashMap<StudentId, Student>,
    timetables: HashMap<ClassId, Timetable>,
}

impl MemoryState {
    fn deactivate(&mut self, id: SessionId) {
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        session.is_active = false;
        let slot = (session.class_id, session.date, session.period);
        let short_code = session.credential.short_code.clone();

        if self.active_slots.get(&slot) == Some(&id) {
            self.active_slots.remove(&slot);
        }
        if let Some(code) = short_code {
            if self.active_short_codes.get(&code) == Some(&id) {
                self.active_short_codes.remove(&code);
            }
        }
    }

    fn insert_event(&mut self, event: &AttendanceEvent) -> Option<AttendanceEvent> {
        let key = event.key();
        if self.event_keys.contains_key(&key) {
            return None;
        }
        self.event_keys.insert(key, event.id);
        self.events.insert(event.id, event.clone());
        Some(event.clone())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_student(&self, student: Student) {
        self.lock().students.insert(student.id, student);
    }

    pub fn add_holiday_rule(&self, rule: HolidayRule) {
        self.lock().holiday_rules.push(rule);
    }

    pub fn set_timetable(&self, timetable: Timetable) {
        self.lock().timetables.insert(timetable.class_id, timetable);
    }

    /// Snapshot of every stored event, oldest first.
    pub fn events(&self) -> Vec<AttendanceEvent> {
        let mut events: Vec<_> = self.lock().events.values().cloned().collect();
        events.sort_by_key(|event| (event.created_at, event.key()));
        events
    }
}

#[async_trait]
impl SessionRepositoryTrait for InMemoryStore {
    async fn insert(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<SessionInsertOutcome, AppError> {
        let mut state = self.lock();
        let slot = (session.class_id, session.date, session.period);

        let superseded = match state.active_slots.get(&slot).copied() {
            Some(id)
                if state
                    .sessions
                    .get(&id)
                    .is_some_and(|existing| !existing.is_stale_at(now)) =>
            {
                return Ok(SessionInsertOutcome::SlotTaken);
            }
            other => other,
        };

        if state.credentials.contains(&session.credential.token) {
            return Ok(SessionInsertOutcome::CredentialTaken);
        }
        if let Some(code) = session.credential.short_code.as_ref() {
            if let Some(holder) = state.active_short_codes.get(code) {
                if Some(*holder) != superseded {
                    return Ok(SessionInsertOutcome::ShortCodeTaken);
                }
            }
        }

        if let Some(id) = superseded {
            state.deactivate(id);
            tracing::debug!(session_id = %id, "Superseded stale attendance session");
        }

        state.credentials.insert(session.credential.token.clone());
        state.active_slots.insert(slot, session.id);
        if let Some(code) = session.credential.short_code.clone() {
            state.active_short_codes.insert(code, session.id);
        }
        state.sessions.insert(session.id, session.clone());
        Ok(SessionInsertOutcome::Inserted(session.clone()))
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>, AppError> {
        Ok(self.lock().sessions.get(&id).cloned())
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut state = self.lock();
        let expired: Vec<SessionId> = state
            .sessions
            .values()
            .filter(|session| session.is_active && session.expires_at < now)
            .map(|session| session.id)
            .collect();
        for id in &expired {
            state.deactivate(*id);
        }
        Ok(expired.len() as u64)
    }
}

#[async_trait]
impl AttendanceEventRepositoryTrait for InMemoryStore {
    async fn insert(&self, event: &AttendanceEvent) -> Result<Option<AttendanceEvent>, AppError> {
        Ok(self.lock().insert_event(event))
    }

    async fn insert_class_mark(
        &self,
        event: &AttendanceEvent,
        session_id: SessionId,
    ) -> Result<Option<AttendanceEvent>, AppError> {
        let mut state = self.lock();
        let inserted = state.insert_event(event);
        if inserted.is_some() {
            if let Some(session) = state.sessions.get_mut(&session_id) {
                session.present_students.insert(event.student_id);
            }
        }
        Ok(inserted)
    }

    async fn find_by_id(
        &self,
        id: AttendanceEventId,
    ) -> Result<Option<AttendanceEvent>, AppError> {
        Ok(self.lock().events.get(&id).cloned())
    }

    async fn find_by_key(&self, key: EventKey) -> Result<Option<AttendanceEvent>, AppError> {
        let state = self.lock();
        Ok(state
            .event_keys
            .get(&key)
            .and_then(|id| state.events.get(id))
            .cloned())
    }

    async fn list_campus_marked(&self, date: NaiveDate) -> Result<Vec<StudentId>, AppError> {
        Ok(self
            .lock()
            .events
            .values()
            .filter(|event| event.attendance_type == AttendanceType::Campus && event.date == date)
            .map(|event| event.student_id)
            .collect())
    }

    async fn list_class_events(
        &self,
        class_id: ClassId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, AppError> {
        let mut events: Vec<AttendanceEvent> = self
            .lock()
            .events
            .values()
            .filter(|event| {
                event.class_id == class_id
                    && event.attendance_type == AttendanceType::Class
                    && from <= event.date
                    && event.date <= to
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.date, event.period));
        Ok(events)
    }

    async fn update_reason(
        &self,
        id: AttendanceEventId,
        reason: &str,
    ) -> Result<Option<AttendanceEvent>, AppError> {
        let mut state = self.lock();
        Ok(state.events.get_mut(&id).map(|event| {
            event.reason = Some(reason.to_string());
            event.clone()
        }))
    }
}

#[async_trait]
impl HolidayRuleRepositoryTrait for InMemoryStore {
    async fn find_overlapping(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HolidayRule>, AppError> {
        let mut rules: Vec<HolidayRule> = self
            .lock()
            .holiday_rules
            .iter()
            .filter(|rule| rule.overlaps(from, to))
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.start_date);
        Ok(rules)
    }
}

#[async_trait]
impl StudentRepositoryTrait for InMemoryStore {
    async fn find_by_id(&self, id: StudentId) -> Result<Option<Student>, AppError> {
        Ok(self.lock().students.get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Student>, AppError> {
        let mut students: Vec<Student> = self
            .lock()
            .students
            .values()
            .filter(|student| student.is_active)
            .cloned()
            .collect();
        students.sort_by(|a, b| a.roll_number.cmp(&b.roll_number));
        Ok(students)
    }

    async fn list_by_class(&self, class_id: ClassId) -> Result<Vec<Student>, AppError> {
        let mut students: Vec<Student> = self
            .lock()
            .students
            .values()
            .filter(|student| student.is_active && student.class_id == class_id)
            .cloned()
            .collect();
        students.sort_by(|a, b| a.roll_number.cmp(&b.roll_number));
        Ok(students)
    }
}

#[async_trait]
impl TimetableRepositoryTrait for InMemoryStore {
    async fn find_by_class(&self, class_id: ClassId) -> Result<Option<Timetable>, AppError> {
        Ok(self.lock().timetables.get(&class_id).cloned())
    }
}
