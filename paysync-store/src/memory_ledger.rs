use async_trait::async_trait;
use paysync_core::payment::{NewPayment, Payment, PaymentStatus};
use paysync_core::repository::{LedgerError, PaymentLedger};
use paysync_core::UserId;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local ledger for development runs and tests.
///
/// Enforces the same uniqueness rules as the `payments` table: one active row
/// per user, unique order references and unique processor ids.
#[derive(Default, Clone)]
pub struct InMemoryPaymentLedger {
    payments: Arc<RwLock<Vec<Payment>>>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn find_active(&self, user_id: UserId) -> Result<Option<Payment>, LedgerError> {
        let payments = self.payments.read().await;
        Ok(payments
            .iter()
            .rev()
            .find(|p| p.user_id == user_id && p.status.is_active())
            .cloned())
    }

    async fn create(&self, input: NewPayment) -> Result<Payment, LedgerError> {
        let mut payments = self.payments.write().await;

        if payments.iter().any(|p| p.user_id == input.user_id && p.status.is_active()) {
            return Err(LedgerError::ActivePaymentExists(input.user_id));
        }
        if payments.iter().any(|p| p.order_ref == input.order_ref) {
            return Err(LedgerError::DuplicateOrderRef(input.order_ref));
        }
        if payments.iter().any(|p| p.external_payment_id == input.external_payment_id) {
            return Err(LedgerError::Storage(format!(
                "external payment id {} already recorded",
                input.external_payment_id
            )));
        }

        let payment = Payment::new(input);
        payments.push(payment.clone());
        Ok(payment)
    }

    async fn update_status(
        &self,
        user_id: UserId,
        status: PaymentStatus,
        raw_response: &str,
    ) -> Result<Payment, LedgerError> {
        let mut payments = self.payments.write().await;
        let payment = payments
            .iter_mut()
            .rev()
            .find(|p| p.user_id == user_id && p.status.is_active())
            .ok_or(LedgerError::NoActivePayment(user_id))?;

        payment.transition(status, raw_response)?;
        Ok(payment.clone())
    }

    async fn find_by_external_id(&self, external_payment_id: &str) -> Result<Payment, LedgerError> {
        let payments = self.payments.read().await;
        payments
            .iter()
            .find(|p| p.external_payment_id == external_payment_id)
            .cloned()
            .ok_or_else(|| LedgerError::PaymentNotFound(external_payment_id.to_string()))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, LedgerError> {
        let payments = self.payments.read().await;
        Ok(payments
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn order_ref_taken(&self, order_ref: &str) -> Result<bool, LedgerError> {
        let payments = self.payments.read().await;
        Ok(payments.iter().any(|p| p.order_ref == order_ref))
    }
}
