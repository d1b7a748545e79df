//! Gateway callbacks. Unauthenticated; the payment id in the body is the only key.
//!
//! Every delivery gets the gateway's own envelope, including failures, so the
//! gateway can decide whether to retry. Bodies that cannot be read (too large,
//! broken connection) are answered as malformed requests in that envelope.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::{error, warn};

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    models::webhooks::{payme_ack, AckStatus, ClickAck, GatewayNotification},
    services::SettlementOutcome,
};

/// POST /api/v1/webhooks/click
pub async fn click_webhook(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> (StatusCode, Json<ClickAck>) {
    let parsed = read_body(body).and_then(|body| {
        GatewayNotification::parse_click(&body).map_err(|e| e.to_string())
    });
    let notification = match parsed {
        Ok(notification) => notification,
        Err(e) => {
            warn!(error = %e, "Rejected Click webhook");
            let status = AckStatus::MalformedRequest;
            return (status.http_status(), Json(ClickAck::new(status, None)));
        }
    };

    let result = state.settlement_service.settle(&notification).await;
    let status = ack_status(&result);

    (
        status.http_status(),
        Json(ClickAck::new(status, Some(&notification))),
    )
}

/// POST /api/v1/webhooks/payme
pub async fn payme_webhook(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> (StatusCode, Json<Value>) {
    let parsed = read_body(body).and_then(|body| {
        GatewayNotification::parse_payme(&body).map_err(|e| e.to_string())
    });
    let notification = match parsed {
        Ok(notification) => notification,
        Err(e) => {
            warn!(error = %e, "Rejected Payme webhook");
            let status = AckStatus::MalformedRequest;
            return (status.http_status(), Json(payme_ack(status, None, None)));
        }
    };

    let result = state.settlement_service.settle(&notification).await;
    let status = ack_status(&result);
    let payment = result.as_ref().ok().map(SettlementOutcome::payment);

    (
        status.http_status(),
        Json(payme_ack(status, Some(&notification), payment)),
    )
}

fn read_body(body: std::result::Result<Bytes, BytesRejection>) -> std::result::Result<Bytes, String> {
    body.map_err(|rejection| rejection.body_text())
}

/// Translate a settlement result into what the gateway is told
fn ack_status(result: &Result<SettlementOutcome>) -> AckStatus {
    match result {
        Ok(SettlementOutcome::Settled { .. })
        | Ok(SettlementOutcome::AlreadySettled { .. })
        | Ok(SettlementOutcome::AlreadyFailed { .. })
        | Ok(SettlementOutcome::NotSuccessful { .. }) => AckStatus::Accepted,
        Ok(SettlementOutcome::AmountMismatch { .. }) => AckStatus::IncorrectAmount,
        Ok(SettlementOutcome::DuplicateEntitlement { .. }) => AckStatus::AlreadyOwned,
        Err(ApiError::NotFound(_)) => AckStatus::PaymentNotFound,
        Err(e) => {
            error!(error = ?e, "Settlement failed, gateway will retry");
            AckStatus::TemporarilyUnavailable
        }
    }
}
