use coursepay::ApiError;
use entity::sea_orm_active_enums::{PaymentProvider, PaymentStatus};
use sea_orm::{EntityTrait, PaginatorTrait};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::common::*;

#[tokio::test]
async fn test_intent_creates_pending_payment_with_click_url() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(150_000), true).await;

    let intent = payment_service(&db)
        .create_intent(user_id, course_id, PaymentProvider::Click, None)
        .await
        .unwrap();

    assert_eq!(intent.payment.status, PaymentStatus::Pending);
    assert_eq!(intent.payment.amount, 150_000);
    assert_eq!(intent.payment.original_amount, 150_000);
    assert!(intent.payment.paid_at.is_none());
    assert!(intent.quote.applied_coupon.is_none());
    assert!(intent
        .payment_url
        .contains(&format!("transaction_param={}", intent.payment.id)));

    let stored = entity::payments::Entity::find_by_id(intent.payment.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.user_id, user_id);
    assert_eq!(stored.provider, PaymentProvider::Click);
}

#[tokio::test]
async fn test_free_course_creates_no_payment() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let free_course = seed_course(&db, None, true).await;
    let zero_course = seed_course(&db, Some(0), true).await;

    for course_id in [free_course, zero_course] {
        let result = payment_service(&db)
            .create_intent(user_id, course_id, PaymentProvider::Payme, None)
            .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    let payments = entity::payments::Entity::find().count(&db).await.unwrap();
    assert_eq!(payments, 0);
}

#[tokio::test]
async fn test_unknown_or_unpublished_course_is_not_found() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let draft = seed_course(&db, Some(90_000), false).await;

    for course_id in [draft, Uuid::new_v4()] {
        let result = payment_service(&db)
            .create_intent(user_id, course_id, PaymentProvider::Click, None)
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}

#[tokio::test]
async fn test_coupon_discount_is_applied_and_recorded() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(100_000), true).await;
    seed_coupon(&db, "SPRING20", 20, None, Some(10), 0).await;

    let intent = payment_service(&db)
        .create_intent(user_id, course_id, PaymentProvider::Click, Some(" SPRING20 "))
        .await
        .unwrap();

    assert_eq!(intent.payment.amount, 80_000);
    assert_eq!(intent.payment.original_amount, 100_000);
    assert_eq!(intent.payment.coupon_code.as_deref(), Some("SPRING20"));

    // Quoting does not consume the coupon
    let coupon = entity::coupons::Entity::find().one(&db).await.unwrap().unwrap();
    assert_eq!(coupon.used_count, 0);
}

#[tokio::test]
async fn test_inapplicable_coupons_charge_full_price() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(100_000), true).await;
    let yesterday = OffsetDateTime::now_utc() - Duration::days(1);
    seed_coupon(&db, "EXPIRED", 20, Some(yesterday), None, 0).await;
    seed_coupon(&db, "USEDUP", 20, None, Some(3), 3).await;

    for code in ["EXPIRED", "USEDUP", "NO-SUCH-CODE"] {
        let intent = payment_service(&db)
            .create_intent(user_id, course_id, PaymentProvider::Click, Some(code))
            .await
            .unwrap();
        assert_eq!(intent.payment.amount, 100_000, "coupon {}", code);
        assert!(intent.payment.coupon_code.is_none());
    }
}

#[tokio::test]
async fn test_full_discount_creates_no_payment() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(100_000), true).await;
    seed_coupon(&db, "FREEBIE", 100, None, None, 0).await;

    let result = payment_service(&db)
        .create_intent(user_id, course_id, PaymentProvider::Click, Some("FREEBIE"))
        .await;

    assert!(matches!(result, Err(ApiError::BadRequest(_))));
    assert_eq!(entity::payments::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_owner_can_read_payment_others_cannot() {
    let db = setup_test_db().await;
    let owner = seed_user(&db).await;
    let stranger = seed_user(&db).await;
    let course_id = seed_course(&db, Some(50_000), true).await;
    let payment =
        create_pending_payment(&db, owner, course_id, PaymentProvider::Payme, None).await;

    let service = payment_service(&db);
    let found = service.get_payment_for_user(owner, payment.id).await.unwrap();
    assert_eq!(found.id, payment.id);

    let hidden = service.get_payment_for_user(stranger, payment.id).await;
    assert!(matches!(hidden, Err(ApiError::NotFound(_))));
}
