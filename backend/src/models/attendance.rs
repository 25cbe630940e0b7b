use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::session::SessionMode;
use crate::types::{AttendanceEventId, ClassId, StudentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceType {
    Campus,
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkingMode {
    Gps,
    Ble,
    Wifi,
    Internet,
    Manual,
}

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }
    };
}

text_enum!(AttendanceType { Campus => "CAMPUS", Class => "CLASS" });
text_enum!(AttendanceStatus { Present => "PRESENT", Absent => "ABSENT", Late => "LATE" });
text_enum!(MarkingMode {
    Gps => "GPS",
    Ble => "BLE",
    Wifi => "WIFI",
    Internet => "INTERNET",
    Manual => "MANUAL",
});

impl From<SessionMode> for MarkingMode {
    fn from(mode: SessionMode) -> Self {
        match mode {
            SessionMode::Ble => MarkingMode::Ble,
            SessionMode::Wifi => MarkingMode::Wifi,
            SessionMode::Internet => MarkingMode::Internet,
        }
    }
}

/// A validated WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AppError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::BadRequest(format!(
                "latitude out of range: {}",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::BadRequest(format!(
                "longitude out of range: {}",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Both halves must be present or both absent.
    pub fn from_optional(
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Option<Self>, AppError> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Self::new(lat, lon).map(Some),
            (None, None) => Ok(None),
            _ => Err(AppError::BadRequest(
                "latitude and longitude must be supplied together".into(),
            )),
        }
    }
}

/// Immutable determination of a student's presence. Only `reason` is ever
/// updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: AttendanceEventId,
    pub student_id: StudentId,
    pub class_id: ClassId,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub attendance_type: AttendanceType,
    pub period: Option<i16>,
    pub status: AttendanceStatus,
    pub mode: MarkingMode,
    pub location: Option<Coordinates>,
    pub device_id: Option<String>,
    pub marked_by: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Uniqueness key: (student, date, type, period).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub student_id: StudentId,
    pub date: NaiveDate,
    pub attendance_type: AttendanceType,
    /// Zero for CAMPUS events.
    pub period: i16,
}

impl AttendanceEvent {
    pub fn campus(
        student_id: StudentId,
        class_id: ClassId,
        date: NaiveDate,
        status: AttendanceStatus,
        mode: MarkingMode,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AttendanceEventId::new(),
            student_id,
            class_id,
            date,
            attendance_type: AttendanceType::Campus,
            period: None,
            status,
            mode,
            location: None,
            device_id: None,
            marked_by: None,
            reason: None,
            created_at: now,
        }
    }

    pub fn class(
        student_id: StudentId,
        class_id: ClassId,
        date: NaiveDate,
        period: i16,
        status: AttendanceStatus,
        mode: MarkingMode,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AttendanceEventId::new(),
            student_id,
            class_id,
            date,
            attendance_type: AttendanceType::Class,
            period: Some(period),
            status,
            mode,
            location: None,
            device_id: None,
            marked_by: None,
            reason: None,
            created_at: now,
        }
    }

    pub fn with_location(mut self, location: Option<Coordinates>) -> Self {
        self.location = location;
        self
    }

    pub fn with_device(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_marked_by(mut self, marked_by: Option<Uuid>) -> Self {
        self.marked_by = marked_by;
        self
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn key(&self) -> EventKey {
        EventKey {
            student_id: self.student_id,
            date: self.date,
            attendance_type: self.attendance_type,
            period: self.period.unwrap_or(0),
        }
    }

    pub fn is_present(&self) -> bool {
        self.status == AttendanceStatus::Present
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AttendanceEventRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub event_date: NaiveDate,
    pub event_type: String,
    pub period: Option<i16>,
    pub status: String,
    pub mode: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub device_id: Option<String>,
    pub marked_by: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn decode_text<T: FromStr<Err = String>>(raw: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|e: String| AppError::InternalServerError(anyhow::anyhow!(e)))
}

impl TryFrom<AttendanceEventRow> for AttendanceEvent {
    type Error = AppError;

    fn try_from(row: AttendanceEventRow) -> Result<Self, Self::Error> {
        let location = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };
        Ok(AttendanceEvent {
            id: row.id.into(),
            student_id: row.student_id.into(),
            class_id: row.class_id.into(),
            date: row.event_date,
            attendance_type: decode_text(&row.event_type)?,
            period: row.period,
            status: decode_text(&row.status)?,
            mode: decode_text(&row.mode)?,
            location,
            device_id: row.device_id,
            marked_by: row.marked_by,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CampusMarkPayload {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ManualMarkPayload {
    pub student_id: StudentId,
    pub class_id: ClassId,
    #[validate(range(min = 1, max = 8))]
    pub period: Option<i16>,
    pub status: AttendanceStatus,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BackfillReasonPayload {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}
