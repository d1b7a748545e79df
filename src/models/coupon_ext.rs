/// Extension methods for coupons entity
///
/// Applicability rules live here so pricing and settlement agree on them.
use entity::coupons;
use time::OffsetDateTime;

pub trait CouponExt {
    /// Expiry has passed (a coupon with no expiry never expires)
    fn is_expired(&self, now: OffsetDateTime) -> bool;

    /// Usage limit reached (a coupon with no limit is never exhausted)
    fn is_exhausted(&self) -> bool;

    /// Both checks pass
    fn is_applicable(&self, now: OffsetDateTime) -> bool;
}

impl CouponExt for coupons::Model {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    fn is_exhausted(&self) -> bool {
        self.max_uses
            .is_some_and(|max_uses| self.used_count >= max_uses)
    }

    fn is_applicable(&self, now: OffsetDateTime) -> bool {
        !self.is_expired(now) && !self.is_exhausted()
    }
}
