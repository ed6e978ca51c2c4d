use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ApplicationId, DocumentId, DocumentTypeId, GradeId, GroupId, GuardianProfile, Principal, Role,
    SchoolId, StudentId, StudentIntake, UserId,
};
use super::repository::PortalStore;
use super::service::{EnrollmentError, EnrollmentService};

/// Router builder exposing the portal API. The identity collaborator
/// forwards the authenticated caller as `x-user-id` / `x-user-role`.
pub fn enrollment_router<S>(service: Arc<EnrollmentService<S>>) -> Router
where
    S: PortalStore + 'static,
{
    Router::new()
        .route("/api/v1/guardians", post(register_guardian_handler::<S>))
        .route(
            "/api/v1/students",
            get(my_students_handler::<S>).post(register_student_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/documents",
            get(checklist_handler::<S>).post(record_document_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/documents/summary",
            get(document_summary_handler::<S>),
        )
        .route(
            "/api/v1/documents/:document_id/review",
            post(review_document_handler::<S>),
        )
        .route(
            "/api/v1/documents/:document_id",
            delete(remove_document_handler::<S>),
        )
        .route(
            "/api/v1/enrollments",
            get(overview_handler::<S>).post(submit_handler::<S>),
        )
        .route("/api/v1/enrollments/mine", get(my_applications_handler::<S>))
        .route("/api/v1/enrollments/pending", get(pending_handler::<S>))
        .route(
            "/api/v1/enrollments/statistics",
            get(statistics_handler::<S>),
        )
        .route(
            "/api/v1/enrollments/:application_id",
            get(detail_handler::<S>),
        )
        .route(
            "/api/v1/enrollments/:application_id/review",
            post(review_handler::<S>),
        )
        .route(
            "/api/v1/groups",
            get(school_groups_handler::<S>).post(create_group_handler::<S>),
        )
        .route("/api/v1/groups/available", get(available_groups_handler::<S>))
        .route("/api/v1/groups/:group_id/roster", get(roster_handler::<S>))
        .route("/api/v1/catalog/cycle", get(cycle_handler::<S>))
        .route("/api/v1/catalog/grades", get(grades_handler::<S>))
        .route("/api/v1/catalog/schools", get(schools_handler::<S>))
        .with_state(service)
}

/// Parse the identity headers. Missing or unknown values are rejected
/// before any service call.
fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, Response> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok());
    let role = headers
        .get("x-user-role")
        .and_then(|value| value.to_str().ok())
        .and_then(Role::parse_label);

    match (user_id, role) {
        (Some(user_id), Some(role)) => Ok(Principal {
            user_id: UserId(user_id),
            role,
        }),
        _ => {
            let payload = json!({ "error": "missing or invalid identity headers" });
            Err((StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response())
        }
    }
}

/// One status mapping for every handler. Store failures already carry a
/// generic message; the detail only exists in the logs.
fn error_response(error: EnrollmentError) -> Response {
    let status = match &error {
        EnrollmentError::Access(_)
        | EnrollmentError::NotGuardianOfStudent
        | EnrollmentError::OutOfSchoolScope
        | EnrollmentError::NotGroupTeacher => StatusCode::FORBIDDEN,
        EnrollmentError::NotFound { .. } => StatusCode::NOT_FOUND,
        EnrollmentError::DuplicateApplication
        | EnrollmentError::DuplicateCurp
        | EnrollmentError::DuplicateGuardian => StatusCode::CONFLICT,
        EnrollmentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };

    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

macro_rules! require_principal {
    ($headers:expr) => {
        match principal_from_headers($headers) {
            Ok(principal) => principal,
            Err(response) => return response,
        }
    };
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitApplicationRequest {
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub grade_id: GradeId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewRequest {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordDocumentRequest {
    pub document_type_id: DocumentTypeId,
    pub submitted_on: NaiveDate,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentReviewRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateGroupRequest {
    pub school_id: SchoolId,
    pub grade_id: GradeId,
    pub name: String,
    pub capacity: u32,
    #[serde(default)]
    pub teacher_user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SchoolScopeQuery {
    #[serde(default)]
    pub school_id: Option<SchoolId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OverviewQuery {
    #[serde(default)]
    pub school_id: Option<SchoolId>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailableGroupsQuery {
    pub school_id: SchoolId,
    pub grade_id: GradeId,
}

pub(crate) async fn register_guardian_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    axum::Json(profile): axum::Json<GuardianProfile>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.register_guardian(principal, profile) {
        Ok(guardian) => (StatusCode::CREATED, axum::Json(guardian)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn register_student_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    axum::Json(intake): axum::Json<StudentIntake>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.register_student(principal, intake) {
        Ok(student) => (StatusCode::CREATED, axum::Json(student)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn my_students_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
) -> Response {
    let principal = require_principal!(&headers);
    match service.my_students(principal) {
        Ok(students) => (StatusCode::OK, axum::Json(students)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<SubmitApplicationRequest>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.submit_application(
        principal,
        request.student_id,
        request.school_id,
        request.grade_id,
    ) {
        Ok(application) => (StatusCode::CREATED, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn review_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<i64>,
    axum::Json(request): axum::Json<ReviewRequest>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.review_application(
        principal,
        ApplicationId(application_id),
        &request.status,
        request.reason,
        request.group_id,
    ) {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn pending_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Query(query): Query<SchoolScopeQuery>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.pending_applications(principal, query.school_id) {
        Ok(applications) => (StatusCode::OK, axum::Json(applications)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn overview_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Query(query): Query<OverviewQuery>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.applications_overview(principal, query.school_id, query.status.as_deref()) {
        Ok(applications) => (StatusCode::OK, axum::Json(applications)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn my_applications_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
) -> Response {
    let principal = require_principal!(&headers);
    match service.my_applications(principal) {
        Ok(applications) => (StatusCode::OK, axum::Json(applications)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn detail_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<i64>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.application_detail(principal, ApplicationId(application_id)) {
        Ok(detail) => (StatusCode::OK, axum::Json(detail)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn statistics_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Query(query): Query<SchoolScopeQuery>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.statistics(principal, query.school_id) {
        Ok(statistics) => (StatusCode::OK, axum::Json(statistics)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_group_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<CreateGroupRequest>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.create_group(
        principal,
        request.school_id,
        request.grade_id,
        &request.name,
        request.capacity,
        request.teacher_user_id,
    ) {
        Ok(group) => (StatusCode::CREATED, axum::Json(group)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn school_groups_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Query(query): Query<SchoolScopeQuery>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.school_groups(principal, query.school_id) {
        Ok(groups) => (StatusCode::OK, axum::Json(groups)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn available_groups_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Query(query): Query<AvailableGroupsQuery>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.available_groups(principal, query.school_id, query.grade_id) {
        Ok(groups) => (StatusCode::OK, axum::Json(groups)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn roster_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Path(group_id): Path<i64>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.group_roster(principal, GroupId(group_id)) {
        Ok(roster) => (StatusCode::OK, axum::Json(roster)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn checklist_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Path(student_id): Path<i64>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.document_checklist(principal, StudentId(student_id)) {
        Ok(checklist) => (StatusCode::OK, axum::Json(checklist)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn document_summary_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Path(student_id): Path<i64>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.document_summary(principal, StudentId(student_id)) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn record_document_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Path(student_id): Path<i64>,
    axum::Json(request): axum::Json<RecordDocumentRequest>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.record_document(
        principal,
        StudentId(student_id),
        request.document_type_id,
        request.submitted_on,
        request.observations,
        request.file_url,
    ) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn review_document_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Path(document_id): Path<i64>,
    axum::Json(request): axum::Json<DocumentReviewRequest>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.review_document(principal, DocumentId(document_id), &request.status) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_document_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
    headers: HeaderMap,
    Path(document_id): Path<i64>,
) -> Response {
    let principal = require_principal!(&headers);
    match service.remove_document(principal, DocumentId(document_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cycle_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
) -> Response {
    match service.current_cycle() {
        Ok(cycle) => (StatusCode::OK, axum::Json(cycle)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn grades_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
) -> Response {
    match service.grades() {
        Ok(grades) => (StatusCode::OK, axum::Json(grades)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn schools_handler<S: PortalStore + 'static>(
    State(service): State<Arc<EnrollmentService<S>>>,
) -> Response {
    match service.enrollable_schools() {
        Ok(schools) => (StatusCode::OK, axum::Json(schools)).into_response(),
        Err(error) => error_response(error),
    }
}
