use entity::{
    payments,
    sea_orm_active_enums::{PaymentProvider, PaymentStatus},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use super::common::SuccessResponse;

/// Request to start a paid purchase
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub course_id: Uuid,

    pub provider: PaymentProvider,

    #[validate(length(min = 1, max = 64))]
    pub coupon_code: Option<String>,
}

pub type CreatePaymentResponse = SuccessResponse<PaymentIntentData>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentData {
    pub payment_id: Uuid,
    /// Amount to be charged, after discount
    pub amount: i64,
    pub original_price: i64,
    pub coupon_applied: bool,
    pub payment_url: String,
}

pub type PaymentStatusResponse = SuccessResponse<PaymentView>;

/// Owner-facing view of a payment
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub payment_id: Uuid,
    pub course_id: Uuid,
    pub amount: i64,
    pub provider: PaymentProvider,
    pub status: PaymentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
}

impl From<payments::Model> for PaymentView {
    fn from(payment: payments::Model) -> Self {
        Self {
            payment_id: payment.id,
            course_id: payment.course_id,
            amount: payment.amount,
            provider: payment.provider,
            status: payment.status,
            created_at: payment.created_at,
            paid_at: payment.paid_at,
        }
    }
}
