use sea_orm::{entity::*, query::*, DatabaseConnection, PaginatorTrait};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;

/// Which record, if any, lets a user into a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Entitlement {
    #[serde(rename = "purchase")]
    Purchased,
    #[serde(rename = "enrollment")]
    Enrolled,
    #[serde(rename = "none")]
    NotEntitled,
}

impl Entitlement {
    pub fn has_access(self) -> bool {
        match self {
            Entitlement::Purchased | Entitlement::Enrolled => true,
            Entitlement::NotEntitled => false,
        }
    }
}

/// Read-only access checks consulted by content-serving code
pub struct EntitlementService {
    db: DatabaseConnection,
}

impl EntitlementService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn entitlement(&self, user_id: Uuid, course_id: Uuid) -> Result<Entitlement> {
        let purchases = entity::purchases::Entity::find()
            .filter(entity::purchases::Column::UserId.eq(user_id))
            .filter(entity::purchases::Column::CourseId.eq(course_id))
            .count(&self.db)
            .await?;

        if purchases > 0 {
            return Ok(Entitlement::Purchased);
        }

        let enrollments = entity::enrollments::Entity::find()
            .filter(entity::enrollments::Column::UserId.eq(user_id))
            .filter(entity::enrollments::Column::CourseId.eq(course_id))
            .count(&self.db)
            .await?;

        if enrollments > 0 {
            return Ok(Entitlement::Enrolled);
        }

        Ok(Entitlement::NotEntitled)
    }

    pub async fn has_access(&self, user_id: Uuid, course_id: Uuid) -> Result<bool> {
        Ok(self.entitlement(user_id, course_id).await?.has_access())
    }
}
