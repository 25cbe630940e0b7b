//! Attendance capture sessions opened by teachers.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::types::{ClassId, SessionId, StudentId, TeacherId};

/// Fixed capture window; sessions are never extended.
pub const SESSION_TTL_MINUTES: i64 = 15;
pub const MIN_PERIOD: i16 = 1;
pub const MAX_PERIOD: i16 = 8;

pub fn session_ttl() -> Duration {
    Duration::minutes(SESSION_TTL_MINUTES)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionMode {
    Ble,
    Wifi,
    Internet,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Ble => "BLE",
            SessionMode::Wifi => "WIFI",
            SessionMode::Internet => "INTERNET",
        }
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BLE" => Ok(SessionMode::Ble),
            "WIFI" => Ok(SessionMode::Wifi),
            "INTERNET" => Ok(SessionMode::Internet),
            other => Err(format!("unknown session mode: {}", other)),
        }
    }
}

/// Mode-specific credential forms handed to students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub class_id: ClassId,
    pub teacher_id: TeacherId,
    pub date: NaiveDate,
    pub period: i16,
    pub mode: SessionMode,
    pub credential: SessionCredential,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub present_students: BTreeSet<StudentId>,
}

impl Session {
    pub fn new(
        class_id: ClassId,
        teacher_id: TeacherId,
        date: NaiveDate,
        period: i16,
        mode: SessionMode,
        credential: SessionCredential,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            class_id,
            teacher_id,
            date,
            period,
            mode,
            credential,
            is_active: true,
            created_at: now,
            expires_at: now + session_ttl(),
            present_students: BTreeSet::new(),
        }
    }

    /// Whether students may still mark against this session at `now`.
    pub fn accepts_marks_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at <= now
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub class_id: Uuid,
    pub teacher_id: Uuid,
    pub session_date: NaiveDate,
    pub period: i16,
    pub mode: String,
    pub credential: String,
    pub short_code: Option<String>,
    pub network_name: Option<String>,
    pub is_active: bool,
    pub present_students: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let mode = row
            .mode
            .parse()
            .map_err(|e: String| AppError::InternalServerError(anyhow::anyhow!(e)))?;
        Ok(Session {
            id: row.id.into(),
            class_id: row.class_id.into(),
            teacher_id: row.teacher_id.into(),
            date: row.session_date,
            period: row.period,
            mode,
            credential: SessionCredential {
                token: row.credential,
                short_code: row.short_code,
                network_name: row.network_name,
            },
            is_active: row.is_active,
            created_at: row.created_at,
            expires_at: row.expires_at,
            present_students: row.present_students.into_iter().map(Into::into).collect(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSessionPayload {
    pub class_id: ClassId,
    #[validate(range(min = 1, max = 8))]
    pub period: i16,
    pub mode: SessionMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MarkClassPayload {
    #[validate(length(min = 1, max = 512))]
    pub credential: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Teacher-facing view; includes the credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: SessionId,
    pub class_id: ClassId,
    pub teacher_id: TeacherId,
    pub date: NaiveDate,
    pub period: i16,
    pub mode: SessionMode,
    pub credential: SessionCredential,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub present_students: Vec<StudentId>,
}

impl From<Session> for SessionResponse {
    fn from(value: Session) -> Self {
        Self {
            id: value.id,
            class_id: value.class_id,
            teacher_id: value.teacher_id,
            date: value.date,
            period: value.period,
            mode: value.mode,
            credential: value.credential,
            is_active: value.is_active,
            created_at: value.created_at,
            expires_at: value.expires_at,
            present_students: value.present_students.into_iter().collect(),
        }
    }
}
