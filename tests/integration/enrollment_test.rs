use coursepay::ApiError;
use entity::sea_orm_active_enums::EnrollmentStatus;
use futures::future::join_all;
use sea_orm::{EntityTrait, PaginatorTrait};
use uuid::Uuid;

use crate::common::*;

#[tokio::test]
async fn test_enroll_in_free_course() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, None, true).await;

    let enrollment = enrollment_service(&db).enroll(user_id, course_id).await.unwrap();

    assert_eq!(enrollment.user_id, user_id);
    assert_eq!(enrollment.course_id, course_id);
    assert_eq!(enrollment.status, EnrollmentStatus::Active);
    // Enrollment never creates payments
    assert_eq!(entity::payments::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_enrollment_is_conflict() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(0), true).await;
    let service = enrollment_service(&db);

    service.enroll(user_id, course_id).await.unwrap();
    let second = service.enroll(user_id, course_id).await;

    assert!(matches!(second, Err(ApiError::Conflict(_))));
    assert_eq!(entity::enrollments::Entity::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_enrollments_create_one_row() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, None, true).await;
    let service = enrollment_service(&db);

    let results = join_all((0..6).map(|_| service.enroll(user_id, course_id))).await;

    let mut created = 0;
    let mut conflicts = 0;
    for result in results {
        match result {
            Ok(_) => created += 1,
            Err(ApiError::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error {:?}", e),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 5);
    assert_eq!(entity::enrollments::Entity::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_paid_course_cannot_be_enrolled() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(150_000), true).await;

    let result = enrollment_service(&db).enroll(user_id, course_id).await;
    assert!(matches!(result, Err(ApiError::BadRequest(_))));
}

#[tokio::test]
async fn test_missing_course_cannot_be_enrolled() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let draft = seed_course(&db, None, false).await;

    for course_id in [draft, Uuid::new_v4()] {
        let result = enrollment_service(&db).enroll(user_id, course_id).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}

#[tokio::test]
async fn test_unenroll_removes_enrollment() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, None, true).await;
    let service = enrollment_service(&db);

    service.enroll(user_id, course_id).await.unwrap();
    service.unenroll(user_id, course_id).await.unwrap();

    assert!(service.find_enrollment(user_id, course_id).await.unwrap().is_none());

    let again = service.unenroll(user_id, course_id).await;
    assert!(matches!(again, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_reenroll_after_unenroll() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, None, true).await;
    let service = enrollment_service(&db);

    service.enroll(user_id, course_id).await.unwrap();
    service.unenroll(user_id, course_id).await.unwrap();
    service.enroll(user_id, course_id).await.unwrap();

    assert!(service.find_enrollment(user_id, course_id).await.unwrap().is_some());
}
