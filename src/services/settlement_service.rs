use anyhow::anyhow;
use entity::sea_orm_active_enums::PaymentStatus;
use sea_orm::{
    entity::*,
    query::*,
    sea_query::{Expr, OnConflict},
    DatabaseConnection, TransactionTrait,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, Result},
    models::{
        payment_ext::PaymentStatusExt,
        webhooks::GatewayNotification,
    },
    services::pricing_service::PricingService,
};

/// What a single webhook delivery did to its payment
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    /// This delivery moved the payment to `paid` and created the purchase
    Settled {
        payment: entity::payments::Model,
        purchase_id: Uuid,
    },
    /// Already paid, by an earlier or a concurrent delivery
    AlreadySettled { payment: entity::payments::Model },
    AlreadyFailed { payment: entity::payments::Model },
    /// Gateway reported a non-success status; the payment stays pending
    NotSuccessful { payment: entity::payments::Model },
    /// Reported amount differs from the stored one; the payment stays pending
    AmountMismatch { payment: entity::payments::Model },
    /// The user already owns the course through another payment; this one is failed
    DuplicateEntitlement { payment: entity::payments::Model },
}

impl SettlementOutcome {
    pub fn payment(&self) -> &entity::payments::Model {
        match self {
            Self::Settled { payment, .. }
            | Self::AlreadySettled { payment }
            | Self::AlreadyFailed { payment }
            | Self::NotSuccessful { payment }
            | Self::AmountMismatch { payment }
            | Self::DuplicateEntitlement { payment } => payment,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Settled { .. } => "settled",
            Self::AlreadySettled { .. } => "already_settled",
            Self::AlreadyFailed { .. } => "already_failed",
            Self::NotSuccessful { .. } => "not_successful",
            Self::AmountMismatch { .. } => "amount_mismatch",
            Self::DuplicateEntitlement { .. } => "duplicate_entitlement",
        }
    }
}

pub struct SettlementService {
    db: DatabaseConnection,
    pricing: PricingService,
}

impl SettlementService {
    pub fn new(db: DatabaseConnection) -> Self {
        let pricing = PricingService::new(db.clone());
        Self { db, pricing }
    }

    /// Reconcile one gateway notification with its payment.
    ///
    /// Safe to call any number of times for the same payment: only a delivery
    /// that wins the `pending -> paid` compare-and-swap creates a purchase.
    /// Returns `NotFound` when no payment with this id exists for the gateway.
    #[instrument(skip(self, notification), fields(payment_id = %notification.payment_id(), provider = ?notification.provider()))]
    pub async fn settle(&self, notification: &GatewayNotification) -> Result<SettlementOutcome> {
        let payment_id = notification.payment_id();

        let payment = entity::payments::Entity::find_by_id(payment_id)
            .filter(entity::payments::Column::Provider.eq(notification.provider()))
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Payment {} not found", payment_id)))?;

        // Idempotency gate: only pending payments move
        let outcome = if payment.status.is_terminal() {
            Self::terminal_outcome(payment)?
        } else if !notification.is_success() {
            SettlementOutcome::NotSuccessful { payment }
        } else if !notification.amount_matches(payment.amount) {
            warn!(expected = payment.amount, "Webhook amount does not match payment");
            SettlementOutcome::AmountMismatch { payment }
        } else {
            self.settle_pending(payment).await?
        };

        info!(outcome = outcome.label(), "Webhook delivery handled");
        Ok(outcome)
    }

    /// Mark paid and grant the course in one transaction
    async fn settle_pending(&self, payment: entity::payments::Model) -> Result<SettlementOutcome> {
        debug_assert!(payment.status.can_transition_to(PaymentStatus::Paid));

        let txn = self.db.begin().await?;
        let now = OffsetDateTime::now_utc();

        let swapped = entity::payments::Entity::update_many()
            .col_expr(
                entity::payments::Column::Status,
                Expr::value(PaymentStatus::Paid.into_value()),
            )
            .col_expr(entity::payments::Column::PaidAt, Expr::value(now))
            .filter(entity::payments::Column::Id.eq(payment.id))
            .filter(entity::payments::Column::Status.eq(PaymentStatus::Pending))
            .exec(&txn)
            .await?;

        if swapped.rows_affected == 0 {
            // A concurrent delivery got there first
            txn.rollback().await?;
            let current = self.reload(payment.id).await?;
            return Self::terminal_outcome(current);
        }

        let purchase_id = Uuid::new_v4();
        let purchase = entity::purchases::ActiveModel {
            id: Set(purchase_id),
            user_id: Set(payment.user_id),
            course_id: Set(payment.course_id),
            payment_id: Set(payment.id),
            created_at: Set(now),
        };

        let inserted = entity::purchases::Entity::insert(purchase)
            .on_conflict(
                OnConflict::columns([
                    entity::purchases::Column::UserId,
                    entity::purchases::Column::CourseId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        if inserted == 0 {
            // Another payment already granted this course; charging again would bill twice
            txn.rollback().await?;
            let current = self.fail_pending(payment.id).await?;
            warn!(
                user_id = %payment.user_id,
                course_id = %payment.course_id,
                "Course already purchased through another payment, payment failed"
            );
            return match current.status {
                PaymentStatus::Failed => Ok(SettlementOutcome::DuplicateEntitlement { payment: current }),
                _ => Self::terminal_outcome(current),
            };
        }

        if let Some(code) = payment.coupon_code.as_deref() {
            if !self.pricing.consume_coupon_in_txn(code, &txn).await? {
                warn!(coupon = code, "Coupon used up before settlement, quoted price kept");
            }
        }

        let settled = entity::payments::Entity::find_by_id(payment.id)
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::Internal(anyhow!("Payment {} vanished during settlement", payment.id)))?;

        txn.commit().await?;

        info!(
            user_id = %settled.user_id,
            course_id = %settled.course_id,
            purchase_id = %purchase_id,
            amount = settled.amount,
            "Payment settled and course granted"
        );

        Ok(SettlementOutcome::Settled {
            payment: settled,
            purchase_id,
        })
    }

    /// `pending -> failed`, leaving any other status untouched
    async fn fail_pending(&self, payment_id: Uuid) -> Result<entity::payments::Model> {
        debug_assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));

        entity::payments::Entity::update_many()
            .col_expr(
                entity::payments::Column::Status,
                Expr::value(PaymentStatus::Failed.into_value()),
            )
            .filter(entity::payments::Column::Id.eq(payment_id))
            .filter(entity::payments::Column::Status.eq(PaymentStatus::Pending))
            .exec(&self.db)
            .await?;

        self.reload(payment_id).await
    }

    async fn reload(&self, payment_id: Uuid) -> Result<entity::payments::Model> {
        entity::payments::Entity::find_by_id(payment_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Payment {} not found", payment_id)))
    }

    fn terminal_outcome(payment: entity::payments::Model) -> Result<SettlementOutcome> {
        match payment.status {
            PaymentStatus::Paid => Ok(SettlementOutcome::AlreadySettled { payment }),
            PaymentStatus::Failed => Ok(SettlementOutcome::AlreadyFailed { payment }),
            PaymentStatus::Pending => Err(ApiError::Internal(anyhow!(
                "Payment {} is still pending after a lost compare-and-swap",
                payment.id
            ))),
        }
    }
}
