use async_trait::async_trait;

use crate::payment::{NewPayment, Payment, PaymentStatus};
use crate::UserId;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("User {0} already has an active payment")]
    ActivePaymentExists(UserId),

    #[error("Order reference {0} is already in use")]
    DuplicateOrderRef(String),

    #[error("No active payment for user {0}")]
    NoActivePayment(UserId),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Invalid payment transition from {from} to {to}")]
    InvalidTransition { from: PaymentStatus, to: PaymentStatus },

    #[error("Ledger storage error: {0}")]
    Storage(String),
}

/// Local persistent store of payment attempts.
///
/// Implementations must keep at most one active (INITIAL or PENDING) row per
/// user. `create` does not resolve an existing active row for the caller: it
/// fails with `ActivePaymentExists` and the engine is expected to have called
/// `find_active` first.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Latest active row for the user, newest first.
    async fn find_active(&self, user_id: UserId) -> Result<Option<Payment>, LedgerError>;

    async fn create(&self, input: NewPayment) -> Result<Payment, LedgerError>;

    /// Move the user's active row to a terminal status.
    async fn update_status(
        &self,
        user_id: UserId,
        status: PaymentStatus,
        raw_response: &str,
    ) -> Result<Payment, LedgerError>;

    async fn find_by_external_id(&self, external_payment_id: &str) -> Result<Payment, LedgerError>;

    /// Full payment history for a user, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, LedgerError>;

    async fn order_ref_taken(&self, order_ref: &str) -> Result<bool, LedgerError>;
}
