#![allow(dead_code)]
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use http_body_util::BodyExt;
use rollcall_backend::{
    build_router,
    config::Config,
    models::{
        attendance::Coordinates,
        principal::{Principal, PrincipalRole},
        student::Student,
    },
    repositories::{InMemoryStore, Repositories},
    services::{
        audit_log::InMemoryAuditRecorder,
        geofence::EARTH_RADIUS_METERS,
        notification::{Notification, NotificationQueue},
    },
    state::AppState,
    types::ClassId,
    utils::time::FixedClock,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const CAMPUS_LATITUDE: f64 = 12.9716;
pub const CAMPUS_LONGITUDE: f64 = 77.5946;

/// Storage, clock and services wired the way the server wires them, but in
/// memory and with a hand-driven clock.
pub struct TestApp {
    pub store: InMemoryStore,
    pub clock: FixedClock,
    pub audit: InMemoryAuditRecorder,
    pub state: AppState,
    pub notifications: mpsc::Receiver<Notification>,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Queued notifications received so far.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            out.push(notification);
        }
        out
    }
}

pub fn test_config() -> Config {
    Config {
        campus_latitude: CAMPUS_LATITUDE,
        campus_longitude: CAMPUS_LONGITUDE,
        ..Config::default()
    }
}

pub fn test_app(now: DateTime<Utc>) -> TestApp {
    test_app_with_queue(now, 256)
}

pub fn test_app_with_queue(now: DateTime<Utc>, queue_capacity: usize) -> TestApp {
    let store = InMemoryStore::new();
    let clock = FixedClock::new(now);
    let audit = InMemoryAuditRecorder::new();
    let (queue, notifications) = NotificationQueue::bounded(queue_capacity);
    let state = AppState::new(
        test_config(),
        Repositories::in_memory(store.clone()),
        Arc::new(clock.clone()),
        queue,
        Arc::new(audit.clone()),
    );
    TestApp {
        store,
        clock,
        audit,
        state,
        notifications,
    }
}

pub fn utc(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &date
            .and_hms_opt(hour, minute, 0)
            .expect("valid test time"),
    )
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

/// 2025-04-07, a Monday.
pub fn monday() -> NaiveDate {
    date(2025, 4, 7)
}

pub fn seed_class(store: &InMemoryStore, size: usize) -> (ClassId, Vec<Student>) {
    let class_id = ClassId::new();
    let students: Vec<Student> = (1..=size)
        .map(|n| Student::new(class_id, format!("Student {}", n), format!("{:02}", n)))
        .collect();
    for student in &students {
        store.add_student(student.clone());
    }
    (class_id, students)
}

pub fn teacher() -> Principal {
    Principal {
        id: Uuid::new_v4(),
        role: PrincipalRole::Teacher,
        device_id: None,
    }
}

pub fn as_principal(student: &Student) -> Principal {
    Principal {
        id: *student.id.as_uuid(),
        role: PrincipalRole::Student,
        device_id: Some(format!("device-{}", student.roll_number)),
    }
}

/// Point `meters` due north of the campus centre.
pub fn north_of_campus(meters: f64) -> Coordinates {
    let degrees = meters / (EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0);
    Coordinates {
        latitude: CAMPUS_LATITUDE + degrees,
        longitude: CAMPUS_LONGITUDE,
    }
}

pub fn request_as(
    principal: &Principal,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-principal-id", principal.id.to_string())
        .header("x-principal-role", principal.role.as_str());
    if let Some(device) = &principal.device_id {
        builder = builder.header("x-device-id", device);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
