use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use class_enrollment::workflows::enrollment::{
    enrollment_router, AssignmentEngine, EnrollmentRepository, EventPublisher, PermissionGate,
};
use serde_json::json;
use std::sync::Arc;

/// Enrollment API plus the operational endpoints every deployment exposes.
pub(crate) fn with_enrollment_routes<R, P>(
    engine: Arc<AssignmentEngine<R, P>>,
    gate: Arc<dyn PermissionGate>,
) -> axum::Router
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    enrollment_router(engine, gate)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
