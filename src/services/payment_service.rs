use entity::sea_orm_active_enums::{PaymentProvider, PaymentStatus};
use sea_orm::{entity::*, query::*, DatabaseConnection, PaginatorTrait};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    error::{ApiError, Result},
    services::{
        checkout_service::CheckoutService,
        course_service::find_published_course,
        pricing_service::{PriceQuote, PricingService},
    },
};

/// A freshly created pending payment and where to send the user
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub payment: entity::payments::Model,
    pub quote: PriceQuote,
    pub payment_url: String,
}

pub struct PaymentService {
    db: DatabaseConnection,
    pricing: PricingService,
    checkout: CheckoutService,
}

impl PaymentService {
    pub fn new(db: DatabaseConnection, checkout: CheckoutService) -> Self {
        let pricing = PricingService::new(db.clone());
        Self {
            db,
            pricing,
            checkout,
        }
    }

    /// Start a purchase: price the course, persist a pending payment, build the redirect.
    ///
    /// A failure at any step leaves no payment behind; the insert is the last step.
    #[instrument(skip(self))]
    pub async fn create_intent(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        provider: PaymentProvider,
        coupon_code: Option<&str>,
    ) -> Result<PaymentIntent> {
        let course = find_published_course(&self.db, course_id).await?;

        let already_purchased = entity::purchases::Entity::find()
            .filter(entity::purchases::Column::UserId.eq(user_id))
            .filter(entity::purchases::Column::CourseId.eq(course_id))
            .count(&self.db)
            .await?
            > 0;

        if already_purchased {
            return Err(ApiError::Conflict(
                "You have already purchased this course".to_string(),
            ));
        }

        let quote = self.pricing.quote(course.price, coupon_code).await?;

        let payment_id = Uuid::new_v4();
        let payment_url = self
            .checkout
            .payment_url(provider, payment_id, course_id, quote.amount)?;

        let payment = entity::payments::ActiveModel {
            id: Set(payment_id),
            user_id: Set(user_id),
            course_id: Set(course_id),
            amount: Set(quote.amount),
            original_amount: Set(quote.original_price),
            coupon_code: Set(quote.applied_coupon.as_ref().map(|c| c.code.clone())),
            provider: Set(provider),
            status: Set(PaymentStatus::Pending),
            created_at: Set(OffsetDateTime::now_utc()),
            paid_at: Set(None),
        }
        .insert(&self.db)
        .await?;

        info!(
            payment_id = %payment.id,
            user_id = %user_id,
            course_id = %course_id,
            provider = ?provider,
            amount = payment.amount,
            coupon = ?payment.coupon_code,
            "Created pending payment"
        );

        Ok(PaymentIntent {
            payment,
            quote,
            payment_url,
        })
    }

    /// Fetch a payment owned by `user_id`; other users' payments read as missing
    #[instrument(skip(self))]
    pub async fn get_payment_for_user(
        &self,
        user_id: Uuid,
        payment_id: Uuid,
    ) -> Result<entity::payments::Model> {
        entity::payments::Entity::find_by_id(payment_id)
            .filter(entity::payments::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Payment {} not found", payment_id)))
    }
}
