/// Extension methods for the payment lifecycle
///
/// Matches are exhaustive, so a new `PaymentStatus` variant fails to compile here.
use entity::sea_orm_active_enums::PaymentStatus;

pub trait PaymentStatusExt {
    /// Whether `self -> next` is a legal lifecycle step
    fn can_transition_to(self, next: PaymentStatus) -> bool;

    /// No further transitions are possible
    fn is_terminal(self) -> bool;
}

impl PaymentStatusExt for PaymentStatus {
    fn can_transition_to(self, next: PaymentStatus) -> bool {
        match (self, next) {
            (PaymentStatus::Pending, PaymentStatus::Paid) => true,
            (PaymentStatus::Pending, PaymentStatus::Failed) => true,
            (PaymentStatus::Pending, PaymentStatus::Pending) => false,
            (PaymentStatus::Paid, _) => false,
            (PaymentStatus::Failed, _) => false,
        }
    }

    fn is_terminal(self) -> bool {
        match self {
            PaymentStatus::Pending => false,
            PaymentStatus::Paid | PaymentStatus::Failed => true,
        }
    }
}
