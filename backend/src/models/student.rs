//! Roster projection of students, owned by the administration service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{ClassId, StudentId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
/// Read-only view of an enrolled student.
pub struct Student {
    /// Unique identifier for the student.
    pub id: StudentId,
    /// Class the student currently belongs to.
    pub class_id: ClassId,
    /// Display name used in reports and notices.
    pub name: String,
    /// Roll number within the class; reports are ordered by it.
    pub roll_number: String,
    /// Inactive students are skipped by sweeps and broadcasts.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn new(class_id: ClassId, name: impl Into<String>, roll_number: impl Into<String>) -> Self {
        Self {
            id: StudentId::new(),
            class_id,
            name: name.into(),
            roll_number: roll_number.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
