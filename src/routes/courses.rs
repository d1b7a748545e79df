use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::Result,
    middleware::UserIdentity,
    models::enrollments::{CourseAccessData, CourseAccessResponse},
};

/// GET /api/v1/courses/{course_id}/access
#[instrument(skip(state), fields(user_id = %identity.user_id))]
pub async fn course_access(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseAccessResponse>> {
    let granted_by = state
        .entitlement_service
        .entitlement(identity.user_id, course_id)
        .await?;

    Ok(Json(CourseAccessResponse::new(CourseAccessData {
        course_id,
        has_access: granted_by.has_access(),
        granted_by,
    })))
}
