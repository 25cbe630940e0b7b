use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{attendance, calendar, reports, sessions},
    middleware::{identity, logging, request_id},
    state::AppState,
};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/calendar/month", get(calendar::list_month))
        .route("/api/calendar/{date}", get(calendar::resolve_date));

    let principal_routes = Router::new()
        .route("/api/sessions", post(sessions::create_session))
        .route("/api/sessions/{id}", get(sessions::get_session))
        .route("/api/sessions/{id}/mark", post(sessions::mark_class))
        .route("/api/attendance/campus", post(attendance::mark_campus))
        .route("/api/attendance/manual", post(attendance::mark_manual))
        .route(
            "/api/attendance/{id}/reason",
            put(attendance::backfill_reason),
        )
        .route("/api/classes/{id}/report", get(reports::class_report))
        .route("/api/classes/{id}/timetable", get(reports::class_timetable))
        .route_layer(axum_middleware::from_fn(identity::require_principal));

    Router::new()
        .merge(public_routes)
        .merge(principal_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(request_id::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(logging::log_error_responses))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                        .allow_headers(Any)
                        .max_age(std::time::Duration::from_secs(24 * 60 * 60)),
                ),
        )
        .with_state(state)
}
