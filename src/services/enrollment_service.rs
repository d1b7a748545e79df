use entity::sea_orm_active_enums::EnrollmentStatus;
use sea_orm::{entity::*, query::*, sea_query::OnConflict, DatabaseConnection};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    error::{ApiError, Result},
    services::course_service::{find_published_course, is_paid_course},
};

/// Free-course membership; never reads or writes payments
pub struct EnrollmentService {
    db: DatabaseConnection,
}

impl EnrollmentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Enroll a user in a free course.
    ///
    /// The unique (user, course) index decides duplicates, so concurrent requests
    /// produce exactly one enrollment and the rest get `Conflict`.
    #[instrument(skip(self))]
    pub async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<entity::enrollments::Model> {
        let course = find_published_course(&self.db, course_id).await?;
        if is_paid_course(&course) {
            return Err(ApiError::BadRequest(
                "This course must be purchased".to_string(),
            ));
        }

        let enrollment = entity::enrollments::Model {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            status: EnrollmentStatus::Active,
            created_at: OffsetDateTime::now_utc(),
        };

        let active = entity::enrollments::ActiveModel {
            id: Set(enrollment.id),
            user_id: Set(enrollment.user_id),
            course_id: Set(enrollment.course_id),
            status: Set(enrollment.status),
            created_at: Set(enrollment.created_at),
        };

        let inserted = entity::enrollments::Entity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    entity::enrollments::Column::UserId,
                    entity::enrollments::Column::CourseId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        if inserted == 0 {
            return Err(ApiError::Conflict(
                "Already enrolled in this course".to_string(),
            ));
        }

        info!(enrollment_id = %enrollment.id, "User enrolled");
        Ok(enrollment)
    }

    #[instrument(skip(self))]
    pub async fn unenroll(&self, user_id: Uuid, course_id: Uuid) -> Result<()> {
        let deleted = entity::enrollments::Entity::delete_many()
            .filter(entity::enrollments::Column::UserId.eq(user_id))
            .filter(entity::enrollments::Column::CourseId.eq(course_id))
            .exec(&self.db)
            .await?;

        if deleted.rows_affected == 0 {
            return Err(ApiError::NotFound(
                "Not enrolled in this course".to_string(),
            ));
        }

        info!("User unenrolled");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<entity::enrollments::Model>> {
        let enrollment = entity::enrollments::Entity::find()
            .filter(entity::enrollments::Column::UserId.eq(user_id))
            .filter(entity::enrollments::Column::CourseId.eq(course_id))
            .one(&self.db)
            .await?;

        Ok(enrollment)
    }
}
