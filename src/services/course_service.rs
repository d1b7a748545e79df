use sea_orm::{entity::*, query::*, ConnectionTrait};
use uuid::Uuid;

use crate::error::{ApiError, Result};

/// Load a course visible to learners; unpublished courses read as missing
pub async fn find_published_course<C: ConnectionTrait>(
    conn: &C,
    course_id: Uuid,
) -> Result<entity::courses::Model> {
    entity::courses::Entity::find_by_id(course_id)
        .filter(entity::courses::Column::IsPublished.eq(true))
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Course {} not found", course_id)))
}

/// Paid courses grant access through a purchase, never through enrollment
pub fn is_paid_course(course: &entity::courses::Model) -> bool {
    course.price.is_some_and(|price| price > 0)
}
