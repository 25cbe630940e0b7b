use axum::{body::Body, http::{Request, StatusCode}};
use serde_json::json;
use tower::ServiceExt;

mod support;

use support::{as_principal, json_body, monday, request_as, seed_class, teacher, test_app, utc};

#[tokio::test]
async fn health_and_calendar_are_public() {
    let app = test_app(utc(monday(), 9, 0));

    let response = app
        .router()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let response = app
        .router()
        .oneshot(
            Request::get("/api/calendar/2025-04-06")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["is_holiday"], json!(true));
    assert_eq!(body["reason"], json!("Sunday"));

    let response = app
        .router()
        .oneshot(
            Request::get("/api/calendar/month?year=2025&month=4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn protected_routes_require_principal_headers() {
    let app = test_app(utc(monday(), 9, 0));
    let response = app
        .router()
        .oneshot(
            Request::post("/api/attendance/campus")
                .header("content-type", "application/json")
                .body(Body::from(json!({"latitude": 0.0, "longitude": 0.0}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], json!("UNAUTHORIZED"));
}

#[tokio::test]
async fn session_lifecycle_over_http() {
    let app = test_app(utc(monday(), 9, 0));
    let (class_id, students) = seed_class(&app.store, 2);
    let staff = teacher();

    let denied = app
        .router()
        .oneshot(request_as(
            &as_principal(&students[0]),
            "POST",
            "/api/sessions",
            Some(json!({"class_id": class_id, "period": 1, "mode": "BLE"})),
        ))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let invalid = app
        .router()
        .oneshot(request_as(
            &staff,
            "POST",
            "/api/sessions",
            Some(json!({"class_id": class_id, "period": 9, "mode": "BLE"})),
        ))
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let created = app
        .router()
        .oneshot(request_as(
            &staff,
            "POST",
            "/api/sessions",
            Some(json!({"class_id": class_id, "period": 1, "mode": "BLE"})),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let session = json_body(created).await;
    let session_id = session["id"].as_str().unwrap().to_string();
    let token = session["credential"]["token"].as_str().unwrap().to_string();

    app.clock.set(utc(monday(), 9, 5));
    let mark_uri = format!("/api/sessions/{}/mark", session_id);
    let marked = app
        .router()
        .oneshot(request_as(
            &as_principal(&students[0]),
            "POST",
            &mark_uri,
            Some(json!({"credential": token})),
        ))
        .await
        .unwrap();
    assert_eq!(marked.status(), StatusCode::CREATED);
    let event = json_body(marked).await;
    assert_eq!(event["type"], json!("CLASS"));
    assert_eq!(event["status"], json!("PRESENT"));

    let duplicate = app
        .router()
        .oneshot(request_as(
            &as_principal(&students[0]),
            "POST",
            &mark_uri,
            Some(json!({"credential": token})),
        ))
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let polled = app
        .router()
        .oneshot(request_as(
            &staff,
            "GET",
            &format!("/api/sessions/{}", session_id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(polled.status(), StatusCode::OK);
    assert_eq!(
        json_body(polled).await["present_students"]
            .as_array()
            .unwrap()
            .len(),
        1
    );

    app.clock.set(utc(monday(), 9, 20));
    let expired = app
        .router()
        .oneshot(request_as(
            &as_principal(&students[1]),
            "POST",
            &mark_uri,
            Some(json!({"credential": token})),
        ))
        .await
        .unwrap();
    assert_eq!(expired.status(), StatusCode::GONE);
    assert_eq!(json_body(expired).await["code"], json!("EXPIRED"));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = test_app(utc(monday(), 9, 0));
    let (_, students) = seed_class(&app.store, 1);
    let response = app
        .router()
        .oneshot(request_as(
            &as_principal(&students[0]),
            "POST",
            &format!("/api/sessions/{}/mark", uuid::Uuid::new_v4()),
            Some(json!({"credential": "whatever"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn report_endpoint_validates_range_and_role() {
    let app = test_app(utc(monday(), 9, 0));
    let (class_id, students) = seed_class(&app.store, 1);

    let as_student = app
        .router()
        .oneshot(request_as(
            &as_principal(&students[0]),
            "GET",
            &format!("/api/classes/{}/report?from=2025-04-01&to=2025-04-30", class_id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(as_student.status(), StatusCode::FORBIDDEN);

    let inverted = app
        .router()
        .oneshot(request_as(
            &teacher(),
            "GET",
            &format!("/api/classes/{}/report?from=2025-04-30&to=2025-04-01", class_id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(inverted.status(), StatusCode::BAD_REQUEST);

    let ok = app
        .router()
        .oneshot(request_as(
            &teacher(),
            "GET",
            &format!("/api/classes/{}/report?from=2025-04-01&to=2025-04-30", class_id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let rows = json_body(ok).await;
    assert_eq!(rows[0]["percentage"], json!(0));
}

#[tokio::test]
async fn campus_and_reason_backfill_over_http() {
    let app = test_app(utc(monday(), 10, 0));
    let (_, students) = seed_class(&app.store, 1);
    let student = as_principal(&students[0]);
    let centre = support::north_of_campus(0.0);

    let marked = app
        .router()
        .oneshot(request_as(
            &student,
            "POST",
            "/api/attendance/campus",
            Some(json!({"latitude": centre.latitude, "longitude": centre.longitude})),
        ))
        .await
        .unwrap();
    assert_eq!(marked.status(), StatusCode::OK);
    let event = json_body(marked).await;
    assert_eq!(event["device_id"], json!("device-01"));
    let event_id = event["id"].as_str().unwrap().to_string();

    let reason_uri = format!("/api/attendance/{}/reason", event_id);
    let forbidden = app
        .router()
        .oneshot(request_as(
            &student,
            "PUT",
            &reason_uri,
            Some(json!({"reason": "doctor visit"})),
        ))
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let updated = app
        .router()
        .oneshot(request_as(
            &teacher(),
            "PUT",
            &reason_uri,
            Some(json!({"reason": "doctor visit"})),
        ))
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    assert_eq!(json_body(updated).await["reason"], json!("doctor visit"));
}
