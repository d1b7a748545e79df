use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, AppJson, Result},
    middleware::UserIdentity,
    models::payments::{
        CreatePaymentRequest, CreatePaymentResponse, PaymentIntentData, PaymentStatusResponse,
        PaymentView,
    },
};

/// POST /api/v1/payments
#[instrument(skip(state, request), fields(user_id = %identity.user_id))]
pub async fn create_payment(
    State(state): State<AppState>,
    identity: UserIdentity,
    AppJson(request): AppJson<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let intent = state
        .payment_service
        .create_intent(
            identity.user_id,
            request.course_id,
            request.provider,
            request.coupon_code.as_deref(),
        )
        .await?;

    Ok(Json(CreatePaymentResponse::new(PaymentIntentData {
        payment_id: intent.payment.id,
        amount: intent.quote.amount,
        original_price: intent.quote.original_price,
        coupon_applied: intent.quote.applied_coupon.is_some(),
        payment_url: intent.payment_url,
    })))
}

/// GET /api/v1/payments/{payment_id}
#[instrument(skip(state), fields(user_id = %identity.user_id))]
pub async fn get_payment(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentStatusResponse>> {
    let payment = state
        .payment_service
        .get_payment_for_user(identity.user_id, payment_id)
        .await?;

    Ok(Json(PaymentStatusResponse::new(PaymentView::from(payment))))
}
