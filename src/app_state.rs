use crate::{
    config::Config,
    services::{
        CheckoutService, EnrollmentService, EntitlementService, JWTService, PaymentService,
        SettlementService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub redis: Arc<redis::Client>,
    pub jwt_service: Arc<JWTService>,
    pub payment_service: Arc<PaymentService>,
    pub settlement_service: Arc<SettlementService>,
    pub enrollment_service: Arc<EnrollmentService>,
    pub entitlement_service: Arc<EntitlementService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let db = sea_orm::Database::connect(&config.database.url).await?;
        Self::from_connection(config, db)
    }

    /// Wire services around an existing connection
    pub fn from_connection(config: Config, db: DatabaseConnection) -> Result<Self, anyhow::Error> {
        // Opening a client does not connect; the first rate-limited request does
        let redis = Arc::new(redis::Client::open(config.redis.url.as_str())?);

        let jwt_service = Arc::new(JWTService::new(Arc::new(config.auth.clone())));
        let checkout = CheckoutService::new(
            &config.payments.click,
            &config.payments.payme,
            &config.application.base_url,
        );
        let payment_service = Arc::new(PaymentService::new(db.clone(), checkout));
        let settlement_service = Arc::new(SettlementService::new(db.clone()));
        let enrollment_service = Arc::new(EnrollmentService::new(db.clone()));
        let entitlement_service = Arc::new(EntitlementService::new(db.clone()));

        Ok(Self {
            db,
            redis,
            jwt_service,
            payment_service,
            settlement_service,
            enrollment_service,
            entitlement_service,
            config: Arc::new(config),
        })
    }
}
