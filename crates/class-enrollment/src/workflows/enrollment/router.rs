use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    ClassId, EnrollmentId, NewClass, PaymentStatus, PriceType, ProgramId, StudentId,
};
use super::engine::AssignmentEngine;
use super::error::EnrollmentError;
use super::notifications::EventPublisher;
use super::outcome::{AssignmentOptions, EnrollmentRequest};
use super::permissions::{Permission, PermissionGate, Role};
use super::repository::{EnrollmentRepository, RepositoryError};

/// Header carrying the caller's staff role.
pub const ROLE_HEADER: &str = "x-staff-role";

/// Shared handler state: the engine plus the gate consulted before each call.
pub struct EnrollmentApi<R, P> {
    pub engine: Arc<AssignmentEngine<R, P>>,
    pub gate: Arc<dyn PermissionGate>,
}

impl<R, P> Clone for EnrollmentApi<R, P> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            gate: Arc::clone(&self.gate),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentUpdate {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct PriceEdit {
    pub price_type: PriceType,
    #[serde(default)]
    pub amount: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub class_id: ClassId,
    #[serde(default)]
    pub acknowledge_prior_completion: bool,
}

#[derive(Debug, Deserialize)]
pub struct CapacityUpdate {
    pub capacity: u8,
}

#[derive(Debug, Default, Deserialize)]
pub struct PromotionRequest {
    /// Apply the proposals instead of only listing them.
    #[serde(default)]
    pub apply: bool,
}

#[derive(Debug, Deserialize)]
pub struct PriceOverride {
    pub amount: u32,
}

/// Router builder exposing enrollment, class, waitlist, and pricing endpoints.
pub fn enrollment_router<R, P>(
    engine: Arc<AssignmentEngine<R, P>>,
    gate: Arc<dyn PermissionGate>,
) -> Router
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    Router::new()
        .route("/api/v1/enrollments", post(enroll_handler::<R, P>))
        .route(
            "/api/v1/enrollments/:enrollment_id",
            get(enrollment_handler::<R, P>).delete(remove_handler::<R, P>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/payment",
            put(payment_handler::<R, P>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/price",
            put(price_edit_handler::<R, P>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/assignment",
            post(assign_handler::<R, P>).delete(unassign_handler::<R, P>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/completion",
            post(complete_handler::<R, P>),
        )
        .route(
            "/api/v1/students/:student_id/history",
            get(history_handler::<R, P>),
        )
        .route("/api/v1/classes", post(register_class_handler::<R, P>))
        .route(
            "/api/v1/classes/:class_id/occupancy",
            get(occupancy_handler::<R, P>),
        )
        .route(
            "/api/v1/classes/:class_id/capacity",
            put(capacity_handler::<R, P>),
        )
        .route(
            "/api/v1/classes/:class_id/archive",
            post(archive_handler::<R, P>),
        )
        .route(
            "/api/v1/classes/:class_id/unarchive",
            post(unarchive_handler::<R, P>),
        )
        .route(
            "/api/v1/programs/:program_id/waitlist/promotions",
            post(promotion_handler::<R, P>),
        )
        .route("/api/v1/pricing", get(price_table_handler::<R, P>))
        .route(
            "/api/v1/pricing/:price_type",
            get(price_quote_handler::<R, P>)
                .put(price_override_handler::<R, P>)
                .delete(price_clear_handler::<R, P>),
        )
        .with_state(EnrollmentApi { engine, gate })
}

pub(crate) async fn enroll_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Json(request): Json<EnrollmentRequest>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ManageEnrollments) {
        return denied;
    }
    respond(StatusCode::CREATED, api.engine.enroll_program(request, Utc::now()))
}

pub(crate) async fn enrollment_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(enrollment_id): Path<String>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ViewEnrollments) {
        return denied;
    }
    respond(
        StatusCode::OK,
        api.engine.enrollment(&EnrollmentId(enrollment_id)),
    )
}

pub(crate) async fn remove_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(enrollment_id): Path<String>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ManageEnrollments) {
        return denied;
    }
    respond(
        StatusCode::OK,
        api.engine.unassign_from_program(&EnrollmentId(enrollment_id)),
    )
}

pub(crate) async fn payment_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(enrollment_id): Path<String>,
    Json(update): Json<PaymentUpdate>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ManagePayments) {
        return denied;
    }
    respond(
        StatusCode::OK,
        api.engine
            .update_payment_status(&EnrollmentId(enrollment_id), update.payment_status),
    )
}

pub(crate) async fn price_edit_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(enrollment_id): Path<String>,
    Json(edit): Json<PriceEdit>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ManagePayments) {
        return denied;
    }
    respond(
        StatusCode::OK,
        api.engine
            .edit_enrollment_price(&EnrollmentId(enrollment_id), edit.price_type, edit.amount),
    )
}

pub(crate) async fn assign_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(enrollment_id): Path<String>,
    Json(request): Json<AssignmentRequest>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::AssignClasses) {
        return denied;
    }
    let options = AssignmentOptions {
        acknowledge_prior_completion: request.acknowledge_prior_completion,
    };
    respond(
        StatusCode::OK,
        api.engine.assign_to_class(
            &EnrollmentId(enrollment_id),
            &request.class_id,
            options,
            Utc::now(),
        ),
    )
}

pub(crate) async fn unassign_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(enrollment_id): Path<String>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::AssignClasses) {
        return denied;
    }
    respond(
        StatusCode::OK,
        api.engine.unassign_from_class(&EnrollmentId(enrollment_id)),
    )
}

pub(crate) async fn complete_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(enrollment_id): Path<String>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::CompleteEnrollments) {
        return denied;
    }
    respond(
        StatusCode::OK,
        api.engine
            .mark_completed(&EnrollmentId(enrollment_id), Utc::now()),
    )
}

pub(crate) async fn history_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(student_id): Path<String>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ViewEnrollments) {
        return denied;
    }
    respond(
        StatusCode::OK,
        api.engine.course_history(&StudentId(student_id)),
    )
}

pub(crate) async fn register_class_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Json(new_class): Json<NewClass>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ManageClasses) {
        return denied;
    }
    respond(StatusCode::CREATED, api.engine.register_class(new_class))
}

pub(crate) async fn occupancy_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(class_id): Path<String>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ViewEnrollments) {
        return denied;
    }
    respond(StatusCode::OK, api.engine.occupancy(&ClassId(class_id)))
}

pub(crate) async fn capacity_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(class_id): Path<String>,
    Json(update): Json<CapacityUpdate>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ManageClasses) {
        return denied;
    }
    respond(
        StatusCode::OK,
        api.engine
            .set_class_capacity(&ClassId(class_id), update.capacity),
    )
}

pub(crate) async fn archive_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(class_id): Path<String>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ManageClasses) {
        return denied;
    }
    match api.engine.archive_class(&ClassId(class_id), Utc::now()) {
        // Occupants remain, so the class is still open.
        Ok(report) if !report.archived => {
            (StatusCode::MULTI_STATUS, Json(report)).into_response()
        }
        other => respond(StatusCode::OK, other),
    }
}

pub(crate) async fn unarchive_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(class_id): Path<String>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ManageClasses) {
        return denied;
    }
    respond(StatusCode::OK, api.engine.unarchive_class(&ClassId(class_id)))
}

pub(crate) async fn promotion_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(program_id): Path<String>,
    request: Option<Json<PromotionRequest>>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let permission = if request.apply {
        Permission::PromoteWaitlist
    } else {
        Permission::ViewEnrollments
    };
    if let Err(denied) = authorize(&api, &headers, permission) {
        return denied;
    }

    let now = Utc::now();
    let proposals = match api
        .engine
        .waitlist_proposals(&ProgramId(program_id), now.date_naive())
    {
        Ok(proposals) => proposals,
        Err(error) => return error_response(&error),
    };

    if !request.apply {
        return (StatusCode::OK, Json(json!({ "proposals": proposals }))).into_response();
    }

    let report = api.engine.apply_proposals(proposals, now);
    (StatusCode::OK, Json(report)).into_response()
}

pub(crate) async fn price_table_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ViewEnrollments) {
        return denied;
    }
    respond(StatusCode::OK, api.engine.price_table())
}

pub(crate) async fn price_quote_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(price_type): Path<String>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ViewEnrollments) {
        return denied;
    }
    match parse_price_type(&price_type) {
        Ok(price_type) => respond(StatusCode::OK, api.engine.price_quote(price_type)),
        Err(response) => response,
    }
}

pub(crate) async fn price_override_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(price_type): Path<String>,
    Json(update): Json<PriceOverride>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ManagePricing) {
        return denied;
    }
    match parse_price_type(&price_type) {
        Ok(price_type) => respond(
            StatusCode::OK,
            api.engine.set_price_override(price_type, update.amount),
        ),
        Err(response) => response,
    }
}

pub(crate) async fn price_clear_handler<R, P>(
    State(api): State<EnrollmentApi<R, P>>,
    headers: HeaderMap,
    Path(price_type): Path<String>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    if let Err(denied) = authorize(&api, &headers, Permission::ManagePricing) {
        return denied;
    }
    match parse_price_type(&price_type) {
        Ok(price_type) => respond(StatusCode::OK, api.engine.clear_price_override(price_type)),
        Err(response) => response,
    }
}

fn authorize<R, P>(
    api: &EnrollmentApi<R, P>,
    headers: &HeaderMap,
    permission: Permission,
) -> Result<Role, Response> {
    let role = headers
        .get(ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(Role::parse);

    let Some(role) = role else {
        let payload = json!({
            "error": format!("missing or unknown {ROLE_HEADER} header"),
            "code": "unauthenticated",
        });
        return Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response());
    };

    api.gate
        .check_permission(role, permission)
        .map(|()| role)
        .map_err(|denied| {
            let payload = json!({
                "error": denied.to_string(),
                "code": "permission_denied",
            });
            (StatusCode::FORBIDDEN, Json(payload)).into_response()
        })
}

fn parse_price_type(raw: &str) -> Result<PriceType, Response> {
    PriceType::parse(raw).ok_or_else(|| {
        let payload = json!({
            "error": format!("unknown price type '{raw}'"),
            "code": "invalid_price_type",
        });
        (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
    })
}

fn respond<T: Serialize>(success: StatusCode, result: Result<T, EnrollmentError>) -> Response {
    match result {
        Ok(value) => (success, Json(value)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) fn status_for(error: &EnrollmentError) -> StatusCode {
    match error {
        EnrollmentError::NotFound { .. }
        | EnrollmentError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        EnrollmentError::PaymentNotConfirmed { .. } => StatusCode::PAYMENT_REQUIRED,
        EnrollmentError::WindowClosed { .. }
        | EnrollmentError::DuplicateEnrollment { .. }
        | EnrollmentError::CapacityExceeded { .. }
        | EnrollmentError::ClassArchived { .. }
        | EnrollmentError::AlreadyAssigned { .. }
        | EnrollmentError::PriorCompletionRequiresConfirmation { .. }
        | EnrollmentError::InvalidTransition { .. }
        | EnrollmentError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        EnrollmentError::BatchMismatch { .. }
        | EnrollmentError::InvalidBatch { .. }
        | EnrollmentError::ProgramMismatch { .. }
        | EnrollmentError::InvalidClass(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EnrollmentError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

const PAYMENT_REMEDIATION: &str = "confirm the payment with PUT /api/v1/enrollments/:id/payment \
     before assigning a class";

pub(crate) fn error_response(error: &EnrollmentError) -> Response {
    let status = status_for(error);
    let payload = match error {
        EnrollmentError::PaymentNotConfirmed { .. } => json!({
            "error": error.to_string(),
            "code": error.code(),
            "remediation": PAYMENT_REMEDIATION,
        }),
        _ => json!({
            "error": error.to_string(),
            "code": error.code(),
        }),
    };

    if status.is_server_error() {
        tracing::error!(error = %error, "enrollment request failed");
    }
    (status, Json(payload)).into_response()
}
