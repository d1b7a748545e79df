use sea_orm::{
    entity::*, query::*, sea_query::Expr, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction,
};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::{
    error::{ApiError, Result},
    models::coupon_ext::CouponExt,
};

pub const MAX_COUPON_CODE_LEN: usize = 64;

/// Result of pricing a course for one purchase attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuote {
    pub original_price: i64,
    pub amount: i64,
    pub applied_coupon: Option<AppliedCoupon>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount_percent: i32,
}

/// Price `base_price` with an optional coupon; no I/O.
///
/// An inapplicable coupon (expired or used up) is ignored and the full price is
/// charged. Free courses and fully discounted quotes are rejected.
pub fn calculate_price(
    base_price: Option<i64>,
    coupon: Option<&entity::coupons::Model>,
    now: OffsetDateTime,
) -> Result<PriceQuote> {
    let original_price = match base_price {
        Some(price) if price > 0 => price,
        _ => {
            return Err(ApiError::BadRequest(
                "Course is free, no payment needed".to_string(),
            ))
        }
    };

    let applied_coupon = coupon
        .filter(|c| c.is_applicable(now))
        .map(|c| AppliedCoupon {
            code: c.code.clone(),
            discount_percent: c.discount_percent.clamp(0, 100),
        });

    let amount = match &applied_coupon {
        Some(c) => discounted_amount(original_price, c.discount_percent),
        None => original_price,
    };

    if amount == 0 {
        return Err(ApiError::BadRequest(
            "Coupon covers the full price, nothing to charge".to_string(),
        ));
    }

    Ok(PriceQuote {
        original_price,
        amount,
        applied_coupon,
    })
}

/// `price` minus `percent`% of it, discount rounded half up, never below zero
pub fn discounted_amount(price: i64, percent: i32) -> i64 {
    let percent = i128::from(percent.clamp(0, 100));
    let price = i128::from(price.max(0));
    let discount = (price * percent + 50) / 100;
    // Bounded by `price`, which came from an i64
    (price - discount).max(0) as i64
}

/// Trim a user-supplied coupon code, rejecting empty or oversized codes
pub fn normalize_coupon_code(raw: &str) -> Result<String> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(ApiError::BadRequest(
            "Coupon code must not be empty".to_string(),
        ));
    }
    if code.len() > MAX_COUPON_CODE_LEN {
        return Err(ApiError::BadRequest(format!(
            "Coupon code must be at most {} characters",
            MAX_COUPON_CODE_LEN
        )));
    }
    Ok(code.to_string())
}

pub struct PricingService {
    db: DatabaseConnection,
}

impl PricingService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Quote a course price, looking up the coupon if one was supplied
    #[instrument(skip(self))]
    pub async fn quote(&self, base_price: Option<i64>, coupon_code: Option<&str>) -> Result<PriceQuote> {
        let coupon = match coupon_code {
            Some(raw) => {
                let code = normalize_coupon_code(raw)?;
                let found = self.find_coupon(&code, &self.db).await?;
                if found.is_none() {
                    debug!(code = %code, "Unknown coupon code ignored");
                }
                found
            }
            None => None,
        };

        calculate_price(base_price, coupon.as_ref(), OffsetDateTime::now_utc())
    }

    async fn find_coupon<C: ConnectionTrait>(
        &self,
        code: &str,
        conn: &C,
    ) -> Result<Option<entity::coupons::Model>> {
        let coupon = entity::coupons::Entity::find()
            .filter(entity::coupons::Column::Code.eq(code))
            .one(conn)
            .await?;

        Ok(coupon)
    }

    /// Count one use of a coupon inside the settlement transaction.
    ///
    /// The increment is guarded so `used_count` never passes `max_uses`; returns
    /// false when the coupon is gone or already used up.
    pub async fn consume_coupon_in_txn(&self, code: &str, txn: &DatabaseTransaction) -> Result<bool> {
        let result = entity::coupons::Entity::update_many()
            .col_expr(
                entity::coupons::Column::UsedCount,
                Expr::col(entity::coupons::Column::UsedCount).add(1),
            )
            .filter(entity::coupons::Column::Code.eq(code))
            .filter(
                Condition::any()
                    .add(entity::coupons::Column::MaxUses.is_null())
                    .add(
                        Expr::col(entity::coupons::Column::UsedCount)
                            .lt(Expr::col(entity::coupons::Column::MaxUses)),
                    ),
            )
            .exec(txn)
            .await?;

        Ok(result.rows_affected == 1)
    }
}
