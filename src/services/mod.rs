// Service modules
pub mod checkout_service;
pub mod course_service;
pub mod enrollment_service;
pub mod entitlement_service;
pub mod jwt_service;
pub mod payment_service;
pub mod pricing_service;
pub mod settlement_service;

pub use checkout_service::CheckoutService;
pub use enrollment_service::EnrollmentService;
pub use entitlement_service::{Entitlement, EntitlementService};
pub use jwt_service::JWTService;
pub use payment_service::PaymentService;
pub use pricing_service::PricingService;
pub use settlement_service::{SettlementOutcome, SettlementService};
