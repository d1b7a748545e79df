//! Gateway redirect URLs
//!
//! The payment id is the reconciliation key: Click carries it back as
//! `transaction_param`, Payme as `account.payment_id`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use entity::sea_orm_active_enums::PaymentProvider;
use reqwest::Url;
use uuid::Uuid;

use crate::{
    config::{ClickConfig, PaymeConfig},
    error::{ApiError, Result},
};

/// Payme expects amounts in tiyin (1/100 of a soum)
pub const PAYME_MINOR_UNITS_PER_UNIT: i64 = 100;

pub fn to_payme_minor_units(amount: i64) -> Option<i64> {
    amount.checked_mul(PAYME_MINOR_UNITS_PER_UNIT)
}

pub struct CheckoutService {
    click: ClickConfig,
    payme: PaymeConfig,
    base_url: String,
}

impl CheckoutService {
    pub fn new(click: &ClickConfig, payme: &PaymeConfig, base_url: &str) -> Self {
        Self {
            click: click.clone(),
            payme: payme.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the URL the user is redirected to for paying `amount`
    pub fn payment_url(
        &self,
        provider: PaymentProvider,
        payment_id: Uuid,
        course_id: Uuid,
        amount: i64,
    ) -> Result<String> {
        let return_url = self.return_url(course_id);
        match provider {
            PaymentProvider::Click => self.click_url(payment_id, amount, &return_url),
            PaymentProvider::Payme => self.payme_url(payment_id, amount, &return_url),
        }
    }

    fn return_url(&self, course_id: Uuid) -> String {
        format!("{}/courses/{}", self.base_url, course_id)
    }

    fn click_url(&self, payment_id: Uuid, amount: i64, return_url: &str) -> Result<String> {
        let mut url = Url::parse(&self.click.checkout_url).map_err(|e| {
            ApiError::Internal(anyhow::anyhow!("Invalid Click checkout URL: {}", e))
        })?;

        url.query_pairs_mut()
            .append_pair("service_id", &self.click.service_id)
            .append_pair("merchant_id", &self.click.merchant_id)
            .append_pair("amount", &amount.to_string())
            .append_pair("transaction_param", &payment_id.to_string())
            .append_pair("return_url", return_url);

        Ok(url.into())
    }

    fn payme_url(&self, payment_id: Uuid, amount: i64, return_url: &str) -> Result<String> {
        let tiyin = to_payme_minor_units(amount).ok_or_else(|| {
            ApiError::BadRequest(format!("Amount {} is too large for Payme", amount))
        })?;

        // Payme GET checkout: base64 of `;`-separated key=value params
        let params = format!(
            "m={};ac.payment_id={};a={};c={}",
            self.payme.merchant_id, payment_id, tiyin, return_url
        );
        let encoded = STANDARD.encode(params);

        let url = format!(
            "{}/{}",
            self.payme.checkout_url.trim_end_matches('/'),
            encoded
        );
        Url::parse(&url).map_err(|e| {
            ApiError::Internal(anyhow::anyhow!("Invalid Payme checkout URL: {}", e))
        })?;

        Ok(url)
    }
}
