// Request/Response models
pub mod common;
pub mod coupon_ext; // Extension methods for entity::coupons
pub mod enrollments;
pub mod payment_ext; // Lifecycle rules for PaymentStatus
pub mod payments;
pub mod webhooks;
