use entity::{enrollments, sea_orm_active_enums::EnrollmentStatus};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::common::SuccessResponse;
use crate::services::entitlement_service::Entitlement;

/// Body for enroll / unenroll
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRequest {
    pub course_id: Uuid,
}

/// Query string for `GET /enrollments/check`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseQuery {
    pub course_id: Uuid,
}

pub type EnrollmentResponse = SuccessResponse<EnrollmentView>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentView {
    pub enrollment_id: Uuid,
    pub course_id: Uuid,
    pub status: EnrollmentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<enrollments::Model> for EnrollmentView {
    fn from(enrollment: enrollments::Model) -> Self {
        Self {
            enrollment_id: enrollment.id,
            course_id: enrollment.course_id,
            status: enrollment.status,
            created_at: enrollment.created_at,
        }
    }
}

pub type EnrollmentCheckResponse = SuccessResponse<EnrollmentCheckData>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentCheckData {
    pub course_id: Uuid,
    pub is_enrolled: bool,
    /// Enrolled or purchased
    pub has_access: bool,
}

pub type CourseAccessResponse = SuccessResponse<CourseAccessData>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAccessData {
    pub course_id: Uuid,
    pub has_access: bool,
    pub granted_by: Entitlement,
}
