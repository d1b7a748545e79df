//! Gateway webhook payloads and acknowledgment envelopes
//!
//! Each gateway gets its own typed payload and parser. Bodies that do not match
//! the expected shape are rejected before any payment is looked up.

use axum::http::StatusCode;
use entity::{
    payments,
    sea_orm_active_enums::{PaymentProvider, PaymentStatus},
};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::services::checkout_service::to_payme_minor_units;

/// Click reports a completed payment with this status
pub const CLICK_STATUS_PAID: &str = "paid";

/// Payme transaction state for a performed (charged) transaction
pub const PAYME_STATE_PERFORMED: i32 = 2;

/// Click notification fields used for reconciliation
#[derive(Debug, Clone, Deserialize)]
pub struct ClickNotification {
    /// Our payment id, passed to Click as `transaction_param`
    pub transaction_param: String,
    pub status: String,
    #[serde(default, deserialize_with = "integer_or_string")]
    pub click_trans_id: Option<i64>,
    /// Charged amount in hundredths of a currency unit. Click sends `150000.00`
    /// either as a JSON number or as a string.
    #[serde(rename = "amount", default, deserialize_with = "hundredths_or_string")]
    pub amount_hundredths: Option<i64>,
}

/// Numeric field that may arrive as a JSON number or a string
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Integer(i64),
    Float(f64),
    Text(String),
}

fn integer_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Integer(value)) => Ok(Some(value)),
        Some(NumberOrString::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected an integer, got {:?}", text))),
        Some(NumberOrString::Float(value)) => Err(D::Error::custom(format!(
            "expected an integer, got {}",
            value
        ))),
    }
}

fn hundredths_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let hundredths = match Option::<NumberOrString>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(NumberOrString::Integer(value)) => value.checked_mul(100),
        Some(NumberOrString::Float(value)) => float_to_hundredths(value),
        Some(NumberOrString::Text(text)) => decimal_to_hundredths(&text),
    };

    hundredths
        .map(Some)
        .ok_or_else(|| D::Error::custom("amount is not a non-negative decimal with at most two places"))
}

fn float_to_hundredths(value: f64) -> Option<i64> {
    let scaled = (value * 100.0).round();
    (scaled.is_finite() && scaled >= 0.0 && scaled < i64::MAX as f64).then_some(scaled as i64)
}

/// `"150000"`, `"150000.5"` and `"150000.00"`; no sign, no exponent
fn decimal_to_hundredths(text: &str) -> Option<i64> {
    let text = text.trim();
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());

    if whole.is_empty() || fraction.len() > 2 || !digits_only(whole) || !digits_only(fraction) {
        return None;
    }

    let fraction = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse::<i64>().ok()?,
    };

    whole.parse::<i64>().ok()?.checked_mul(100)?.checked_add(fraction)
}

/// Payme notification fields used for reconciliation
#[derive(Debug, Clone, Deserialize)]
pub struct PaymeNotification {
    /// JSON-RPC request id, echoed back in the acknowledgment
    #[serde(default)]
    pub id: Option<Value>,
    pub account: PaymeAccount,
    pub state: i32,
    /// Charged amount in tiyin
    #[serde(default)]
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymeAccount {
    pub payment_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookRejection {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Invalid payment id: {0}")]
    InvalidPaymentId(String),
}

/// A validated gateway notification
#[derive(Debug, Clone)]
pub enum GatewayNotification {
    Click {
        payment_id: Uuid,
        payload: ClickNotification,
    },
    Payme {
        payment_id: Uuid,
        payload: PaymeNotification,
    },
}

impl GatewayNotification {
    pub fn parse_click(body: &[u8]) -> Result<Self, WebhookRejection> {
        let payload: ClickNotification = serde_json::from_slice(body)
            .map_err(|e| WebhookRejection::Malformed(e.to_string()))?;

        if payload.status.trim().is_empty() {
            return Err(WebhookRejection::Malformed("status is empty".to_string()));
        }

        let payment_id = parse_payment_id(&payload.transaction_param)?;
        Ok(Self::Click {
            payment_id,
            payload,
        })
    }

    pub fn parse_payme(body: &[u8]) -> Result<Self, WebhookRejection> {
        let payload: PaymeNotification = serde_json::from_slice(body)
            .map_err(|e| WebhookRejection::Malformed(e.to_string()))?;

        let payment_id = parse_payment_id(&payload.account.payment_id)?;
        Ok(Self::Payme {
            payment_id,
            payload,
        })
    }

    pub fn provider(&self) -> PaymentProvider {
        match self {
            Self::Click { .. } => PaymentProvider::Click,
            Self::Payme { .. } => PaymentProvider::Payme,
        }
    }

    pub fn payment_id(&self) -> Uuid {
        match self {
            Self::Click { payment_id, .. } | Self::Payme { payment_id, .. } => *payment_id,
        }
    }

    /// Whether the gateway reports the charge as completed
    pub fn is_success(&self) -> bool {
        match self {
            Self::Click { payload, .. } => payload.status == CLICK_STATUS_PAID,
            Self::Payme { payload, .. } => payload.state == PAYME_STATE_PERFORMED,
        }
    }

    /// Compare the reported amount (if any) with the stored one
    pub fn amount_matches(&self, stored_amount: i64) -> bool {
        match self {
            Self::Click { payload, .. } => payload.amount_hundredths.map_or(true, |reported| {
                stored_amount.checked_mul(100) == Some(reported)
            }),
            Self::Payme { payload, .. } => payload.amount.map_or(true, |reported| {
                to_payme_minor_units(stored_amount) == Some(reported)
            }),
        }
    }
}

fn parse_payment_id(raw: &str) -> Result<Uuid, WebhookRejection> {
    Uuid::parse_str(raw.trim()).map_err(|_| WebhookRejection::InvalidPaymentId(raw.to_string()))
}

/// Gateway-neutral result of handling a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Accepted,
    PaymentNotFound,
    IncorrectAmount,
    /// The user already owns the course through another payment
    AlreadyOwned,
    MalformedRequest,
    TemporarilyUnavailable,
}

impl AckStatus {
    pub fn http_status(self) -> StatusCode {
        match self {
            AckStatus::Accepted | AckStatus::IncorrectAmount | AckStatus::AlreadyOwned => {
                StatusCode::OK
            }
            AckStatus::PaymentNotFound => StatusCode::NOT_FOUND,
            AckStatus::MalformedRequest => StatusCode::BAD_REQUEST,
            AckStatus::TemporarilyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn click_error(self) -> (i32, &'static str) {
        match self {
            AckStatus::Accepted => (0, "Success"),
            AckStatus::IncorrectAmount => (-2, "Incorrect parameter amount"),
            AckStatus::AlreadyOwned => (-4, "Already paid"),
            AckStatus::PaymentNotFound => (-5, "Payment does not exist"),
            AckStatus::TemporarilyUnavailable => (-7, "Failed to update payment"),
            AckStatus::MalformedRequest => (-8, "Error in request from click"),
        }
    }

    fn payme_error(self) -> Option<(i32, &'static str)> {
        match self {
            AckStatus::Accepted => None,
            AckStatus::IncorrectAmount => Some((-31001, "Incorrect amount")),
            AckStatus::AlreadyOwned => Some((-31008, "Course already purchased")),
            AckStatus::TemporarilyUnavailable => Some((-31008, "Unable to perform operation")),
            AckStatus::PaymentNotFound => Some((-31050, "Payment not found")),
            AckStatus::MalformedRequest => Some((-32700, "Parse error")),
        }
    }
}

/// Click acknowledgment envelope
#[derive(Debug, Serialize)]
pub struct ClickAck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_trans_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_trans_id: Option<String>,
    pub error: i32,
    pub error_note: String,
}

impl ClickAck {
    pub fn new(status: AckStatus, notification: Option<&GatewayNotification>) -> Self {
        let (error, note) = status.click_error();
        let (click_trans_id, merchant_trans_id) = match notification {
            Some(GatewayNotification::Click {
                payment_id,
                payload,
            }) => (payload.click_trans_id, Some(payment_id.to_string())),
            _ => (None, None),
        };

        Self {
            click_trans_id,
            merchant_trans_id,
            error,
            error_note: note.to_string(),
        }
    }
}

/// Payme JSON-RPC style acknowledgment
pub fn payme_ack(
    status: AckStatus,
    notification: Option<&GatewayNotification>,
    payment: Option<&payments::Model>,
) -> Value {
    let request_id = match notification {
        Some(GatewayNotification::Payme { payload, .. }) => payload.id.clone(),
        _ => None,
    }
    .unwrap_or(Value::Null);

    if let Some((code, message)) = status.payme_error() {
        return json!({
            "id": request_id,
            "error": { "code": code, "message": message },
        });
    }

    let result = match payment {
        Some(payment) => json!({
            "transaction": payment.id.to_string(),
            "state": payme_state(payment.status),
            "perform_time": payment
                .paid_at
                .map(|paid_at| (paid_at.unix_timestamp_nanos() / 1_000_000) as i64)
                .unwrap_or(0),
        }),
        None => json!({}),
    };

    json!({ "id": request_id, "result": result })
}

fn payme_state(status: PaymentStatus) -> i32 {
    match status {
        PaymentStatus::Pending => 1,
        PaymentStatus::Paid => PAYME_STATE_PERFORMED,
        PaymentStatus::Failed => -1,
    }
}
