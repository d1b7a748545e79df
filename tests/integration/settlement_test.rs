use std::sync::Arc;

use coursepay::{
    models::webhooks::GatewayNotification, services::SettlementOutcome, ApiError,
};
use entity::sea_orm_active_enums::{PaymentProvider, PaymentStatus};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::common::*;

async fn purchase_count(db: &sea_orm::DatabaseConnection, payment_id: Uuid) -> u64 {
    entity::purchases::Entity::find()
        .filter(entity::purchases::Column::PaymentId.eq(payment_id))
        .count(db)
        .await
        .unwrap()
}

async fn reload(db: &sea_orm::DatabaseConnection, payment_id: Uuid) -> entity::payments::Model {
    entity::payments::Entity::find_by_id(payment_id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_end_to_end_click_settlement_grants_access() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(150_000), true).await;
    let payment =
        create_pending_payment(&db, user_id, course_id, PaymentProvider::Click, None).await;

    assert!(!entitlement_service(&db).has_access(user_id, course_id).await.unwrap());

    let notification =
        GatewayNotification::parse_click(click_paid_body(payment.id, 150_000).as_bytes()).unwrap();
    let outcome = settlement_service(&db).settle(&notification).await.unwrap();

    let settled = match outcome {
        SettlementOutcome::Settled { payment, .. } => payment,
        other => panic!("expected Settled, got {:?}", other),
    };
    assert_eq!(settled.status, PaymentStatus::Paid);
    assert!(settled.paid_at.is_some());
    assert_eq!(purchase_count(&db, payment.id).await, 1);
    assert!(entitlement_service(&db).has_access(user_id, course_id).await.unwrap());
}

#[tokio::test]
async fn test_payme_settlement_checks_tiyin_amount() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(150_000), true).await;
    let payment =
        create_pending_payment(&db, user_id, course_id, PaymentProvider::Payme, None).await;

    let notification = GatewayNotification::parse_payme(
        payme_performed_body(payment.id, 15_000_000).as_bytes(),
    )
    .unwrap();
    let outcome = settlement_service(&db).settle(&notification).await.unwrap();

    assert!(matches!(outcome, SettlementOutcome::Settled { .. }));
    assert_eq!(reload(&db, payment.id).await.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_replayed_delivery_changes_nothing() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(150_000), true).await;
    let payment =
        create_pending_payment(&db, user_id, course_id, PaymentProvider::Click, None).await;
    let notification =
        GatewayNotification::parse_click(click_paid_body(payment.id, 150_000).as_bytes()).unwrap();
    let service = settlement_service(&db);

    service.settle(&notification).await.unwrap();
    let first_paid_at = reload(&db, payment.id).await.paid_at;

    let replay = service.settle(&notification).await.unwrap();

    assert!(matches!(replay, SettlementOutcome::AlreadySettled { .. }));
    assert_eq!(reload(&db, payment.id).await.paid_at, first_paid_at);
    assert_eq!(purchase_count(&db, payment.id).await, 1);
}

#[tokio::test]
async fn test_concurrent_deliveries_settle_once() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(150_000), true).await;
    let payment =
        create_pending_payment(&db, user_id, course_id, PaymentProvider::Click, None).await;
    let service = Arc::new(settlement_service(&db));
    let body = click_paid_body(payment.id, 150_000);

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let service = service.clone();
        let body = body.clone();
        tasks.spawn(async move {
            let notification = GatewayNotification::parse_click(body.as_bytes()).unwrap();
            service.settle(&notification).await
        });
    }

    let mut settled = 0;
    let mut already = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap().unwrap() {
            SettlementOutcome::Settled { .. } => settled += 1,
            SettlementOutcome::AlreadySettled { .. } => already += 1,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert_eq!(settled, 1);
    assert_eq!(already, 7);
    assert_eq!(purchase_count(&db, payment.id).await, 1);
}

#[tokio::test]
async fn test_second_payment_for_owned_course_is_failed() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(150_000), true).await;
    // Both intents exist before either settles
    let first =
        create_pending_payment(&db, user_id, course_id, PaymentProvider::Click, None).await;
    let second =
        create_pending_payment(&db, user_id, course_id, PaymentProvider::Click, None).await;
    let service = settlement_service(&db);

    let n1 = GatewayNotification::parse_click(click_paid_body(first.id, 150_000).as_bytes()).unwrap();
    let n2 = GatewayNotification::parse_click(click_paid_body(second.id, 150_000).as_bytes()).unwrap();

    assert!(matches!(service.settle(&n1).await.unwrap(), SettlementOutcome::Settled { .. }));
    assert!(matches!(
        service.settle(&n2).await.unwrap(),
        SettlementOutcome::DuplicateEntitlement { .. }
    ));

    assert_eq!(reload(&db, second.id).await.status, PaymentStatus::Failed);
    assert!(reload(&db, second.id).await.paid_at.is_none());
    let purchases = entity::purchases::Entity::find()
        .filter(entity::purchases::Column::UserId.eq(user_id))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(purchases, 1);

    // A failed payment stays failed on replay
    assert!(matches!(
        service.settle(&n2).await.unwrap(),
        SettlementOutcome::AlreadyFailed { .. }
    ));
}

#[tokio::test]
async fn test_coupon_is_consumed_once_at_settlement() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(100_000), true).await;
    seed_coupon(&db, "SPRING20", 20, None, Some(5), 0).await;
    let payment = create_pending_payment(
        &db,
        user_id,
        course_id,
        PaymentProvider::Click,
        Some("SPRING20"),
    )
    .await;
    let notification =
        GatewayNotification::parse_click(click_paid_body(payment.id, 80_000).as_bytes()).unwrap();
    let service = settlement_service(&db);

    service.settle(&notification).await.unwrap();
    service.settle(&notification).await.unwrap();

    let coupon = entity::coupons::Entity::find().one(&db).await.unwrap().unwrap();
    assert_eq!(coupon.used_count, 1);
}

#[tokio::test]
async fn test_used_up_coupon_does_not_block_settlement() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(100_000), true).await;
    seed_coupon(&db, "LASTONE", 10, None, Some(1), 0).await;
    let payment = create_pending_payment(
        &db,
        user_id,
        course_id,
        PaymentProvider::Click,
        Some("LASTONE"),
    )
    .await;

    // Someone else spends the last use in between
    entity::coupons::Entity::update_many()
        .col_expr(
            entity::coupons::Column::UsedCount,
            sea_orm::sea_query::Expr::value(1),
        )
        .exec(&db)
        .await
        .unwrap();

    let notification =
        GatewayNotification::parse_click(click_paid_body(payment.id, 90_000).as_bytes()).unwrap();
    let outcome = settlement_service(&db).settle(&notification).await.unwrap();

    assert!(matches!(outcome, SettlementOutcome::Settled { .. }));
    let coupon = entity::coupons::Entity::find().one(&db).await.unwrap().unwrap();
    assert_eq!(coupon.used_count, 1);
}

#[tokio::test]
async fn test_failure_after_purchase_insert_rolls_everything_back() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(100_000), true).await;
    seed_coupon(&db, "SPRING20", 20, None, None, 0).await;
    let payment = create_pending_payment(
        &db,
        user_id,
        course_id,
        PaymentProvider::Click,
        Some("SPRING20"),
    )
    .await;

    // Coupon use is the last write of settlement; make it fail
    db.execute_unprepared("DROP TABLE coupons").await.unwrap();

    let notification =
        GatewayNotification::parse_click(click_paid_body(payment.id, 80_000).as_bytes()).unwrap();
    let result = settlement_service(&db).settle(&notification).await;

    assert!(matches!(result, Err(ApiError::Database(_))));
    let stored = reload(&db, payment.id).await;
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert!(stored.paid_at.is_none());
    assert_eq!(purchase_count(&db, payment.id).await, 0);
}

#[tokio::test]
async fn test_unknown_payment_is_not_found() {
    let db = setup_test_db().await;
    let notification =
        GatewayNotification::parse_click(click_paid_body(Uuid::new_v4(), 1_000).as_bytes())
            .unwrap();

    let result = settlement_service(&db).settle(&notification).await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_wrong_gateway_is_not_found() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(150_000), true).await;
    let payment =
        create_pending_payment(&db, user_id, course_id, PaymentProvider::Click, None).await;

    let notification = GatewayNotification::parse_payme(
        payme_performed_body(payment.id, 15_000_000).as_bytes(),
    )
    .unwrap();

    let result = settlement_service(&db).settle(&notification).await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
    assert_eq!(reload(&db, payment.id).await.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_non_success_status_leaves_payment_pending() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(150_000), true).await;
    let payment =
        create_pending_payment(&db, user_id, course_id, PaymentProvider::Click, None).await;

    let body = format!(
        r#"{{"transaction_param":"{}","status":"cancelled"}}"#,
        payment.id
    );
    let notification = GatewayNotification::parse_click(body.as_bytes()).unwrap();
    let outcome = settlement_service(&db).settle(&notification).await.unwrap();

    assert!(matches!(outcome, SettlementOutcome::NotSuccessful { .. }));
    assert_eq!(reload(&db, payment.id).await.status, PaymentStatus::Pending);
    assert_eq!(purchase_count(&db, payment.id).await, 0);
}

#[tokio::test]
async fn test_amount_mismatch_leaves_payment_pending() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(150_000), true).await;
    let payment =
        create_pending_payment(&db, user_id, course_id, PaymentProvider::Click, None).await;

    let notification =
        GatewayNotification::parse_click(click_paid_body(payment.id, 1_000).as_bytes()).unwrap();
    let outcome = settlement_service(&db).settle(&notification).await.unwrap();

    assert!(matches!(outcome, SettlementOutcome::AmountMismatch { .. }));
    assert_eq!(reload(&db, payment.id).await.status, PaymentStatus::Pending);
    assert_eq!(purchase_count(&db, payment.id).await, 0);
}

#[tokio::test]
async fn test_purchased_course_rejects_new_intent() {
    let db = setup_test_db().await;
    let user_id = seed_user(&db).await;
    let course_id = seed_course(&db, Some(150_000), true).await;
    let payment =
        create_pending_payment(&db, user_id, course_id, PaymentProvider::Click, None).await;
    let notification =
        GatewayNotification::parse_click(click_paid_body(payment.id, 150_000).as_bytes()).unwrap();
    settlement_service(&db).settle(&notification).await.unwrap();

    let result = payment_service(&db)
        .create_intent(user_id, course_id, PaymentProvider::Payme, None)
        .await;
    assert!(matches!(result, Err(ApiError::Conflict(_))));
}
