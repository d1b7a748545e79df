use axum::{
    extract::{Query, State},
    Json,
};
use tracing::instrument;

use crate::{
    app_state::AppState,
    error::{AppJson, Result},
    middleware::UserIdentity,
    models::{
        common::{MessageResponse, SuccessResponse},
        enrollments::{
            CourseQuery, CourseRequest, EnrollmentCheckData, EnrollmentCheckResponse,
            EnrollmentResponse, EnrollmentView,
        },
    },
};

/// POST /api/v1/enrollments
#[instrument(skip(state, request), fields(user_id = %identity.user_id))]
pub async fn enroll(
    State(state): State<AppState>,
    identity: UserIdentity,
    AppJson(request): AppJson<CourseRequest>,
) -> Result<Json<EnrollmentResponse>> {
    let enrollment = state
        .enrollment_service
        .enroll(identity.user_id, request.course_id)
        .await?;

    Ok(Json(EnrollmentResponse::new(EnrollmentView::from(
        enrollment,
    ))))
}

/// POST /api/v1/enrollments/unenroll
#[instrument(skip(state, request), fields(user_id = %identity.user_id))]
pub async fn unenroll(
    State(state): State<AppState>,
    identity: UserIdentity,
    AppJson(request): AppJson<CourseRequest>,
) -> Result<Json<SuccessResponse<MessageResponse>>> {
    state
        .enrollment_service
        .unenroll(identity.user_id, request.course_id)
        .await?;

    Ok(Json(SuccessResponse::new(MessageResponse::new(
        "Unenrolled from course",
    ))))
}

/// GET /api/v1/enrollments/check?courseId=
#[instrument(skip(state), fields(user_id = %identity.user_id))]
pub async fn check_enrollment(
    State(state): State<AppState>,
    identity: UserIdentity,
    Query(query): Query<CourseQuery>,
) -> Result<Json<EnrollmentCheckResponse>> {
    let enrollment = state
        .enrollment_service
        .find_enrollment(identity.user_id, query.course_id)
        .await?;
    let entitlement = state
        .entitlement_service
        .entitlement(identity.user_id, query.course_id)
        .await?;

    Ok(Json(EnrollmentCheckResponse::new(EnrollmentCheckData {
        course_id: query.course_id,
        is_enrolled: enrollment.is_some(),
        has_access: entitlement.has_access(),
    })))
}
