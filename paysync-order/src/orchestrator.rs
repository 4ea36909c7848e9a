use paysync_core::payment::{NewPayment, Payment, PaymentStatus};
use paysync_core::peer::{CommitAck, OrderCommand};
use paysync_core::{
    CartFetcher, CoreResult, OrderCommitter, PaymentLedger, ProcessorGateway, ReconcileError, TokenUser, UserId,
};
use paysync_shared::money::round_to_cents;
use paysync_shared::Masked;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::locks::KeyedLocks;

const ORDER_REF_LEN: usize = 8;
const MAX_ORDER_REF_ATTEMPTS: usize = 5;

/// Source of client-facing order references.
pub trait OrderRefGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random 8-character alphanumeric references.
pub struct RandomOrderRefs;

impl OrderRefGenerator for RandomOrderRefs {
    fn generate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ORDER_REF_LEN)
            .map(char::from)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOutcome {
    pub session_id: String,
    pub checkout_url: Option<String>,
    /// True when an existing active payment was replayed.
    pub resumed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub order_ref: String,
    /// True when the payment was already SUCCESS before this call.
    pub already_verified: bool,
}

/// Coordinates the local ledger, the payment processor and the order service.
///
/// Both operations hold a per-user lock for their whole duration, so a user
/// never has two checkouts or two verifications in flight on this instance.
pub struct ReconciliationEngine {
    ledger: Arc<dyn PaymentLedger>,
    processor: Arc<dyn ProcessorGateway>,
    carts: Arc<dyn CartFetcher>,
    committer: Arc<dyn OrderCommitter>,
    order_refs: Arc<dyn OrderRefGenerator>,
    locks: KeyedLocks<UserId>,
}

impl ReconciliationEngine {
    pub fn new(
        ledger: Arc<dyn PaymentLedger>,
        processor: Arc<dyn ProcessorGateway>,
        carts: Arc<dyn CartFetcher>,
        committer: Arc<dyn OrderCommitter>,
    ) -> Self {
        Self {
            ledger,
            processor,
            carts,
            committer,
            order_refs: Arc::new(RandomOrderRefs),
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_order_refs(mut self, order_refs: Arc<dyn OrderRefGenerator>) -> Self {
        self.order_refs = order_refs;
        self
    }

    /// Start (or resume) a hosted checkout for the user's current cart.
    pub async fn create_checkout(&self, user: &TokenUser, credential: &Masked<String>) -> CoreResult<CheckoutOutcome> {
        let _guard = self.locks.lock(user.id).await;

        if let Some(active) = self.ledger.find_active(user.id).await? {
            info!(
                "User {} already has active payment {} ({}), replaying session {}",
                user.id, active.id, active.status, active.external_payment_id
            );
            return Ok(CheckoutOutcome {
                session_id: active.external_payment_id,
                checkout_url: active.checkout_url,
                resumed: true,
            });
        }

        let cart = self.carts.fetch_cart(user.id, credential).await?;
        if cart.is_empty() {
            return Err(ReconcileError::EmptyCart);
        }

        let amount = round_to_cents(cart.total);
        let order_ref = self.fresh_order_ref().await?;

        let session = self
            .processor
            .create_checkout_session(amount, user.id, &order_ref)
            .await
            .inspect_err(|e| error!("Checkout session for user {} failed: {}", user.id, e))?;

        let payment = self
            .ledger
            .create(NewPayment {
                user_id: user.id,
                amount,
                order_ref,
                external_payment_id: session.session_id.clone(),
                checkout_url: Some(session.checkout_url.clone()),
            })
            .await?;

        info!(
            "Payment {} created for user {}: order {} amount {} status {}",
            payment.id, user.id, payment.order_ref, payment.amount, payment.status
        );

        Ok(CheckoutOutcome {
            session_id: session.session_id,
            checkout_url: Some(session.checkout_url),
            resumed: false,
        })
    }

    /// Confirm a paid checkout session and commit the order exactly once.
    pub async fn verify_payment(
        &self,
        user: &TokenUser,
        credential: &Masked<String>,
        session_id: &str,
    ) -> CoreResult<VerifyOutcome> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ReconcileError::ValidationError("session_id is required".to_string()));
        }

        let _guard = self.locks.lock(user.id).await;

        let session = self.processor.get_checkout_session(session_id).await?;
        if !session.is_paid() {
            info!("Session {} for user {} is {:?}", session_id, user.id, session.status);
            return Err(ReconcileError::PaymentNotCompleted);
        }

        let payment = self.ledger.find_by_external_id(session_id).await?;
        if payment.user_id != user.id {
            warn!("User {} tried to verify session {} owned by another user", user.id, session_id);
            return Err(ReconcileError::PaymentNotFound);
        }

        match payment.status {
            PaymentStatus::Success => {
                return Ok(VerifyOutcome {
                    order_ref: payment.order_ref,
                    already_verified: true,
                });
            }
            PaymentStatus::Failed => return Err(ReconcileError::NoActivePayment),
            PaymentStatus::Initial | PaymentStatus::Pending => {}
        }

        self.commit_order(&payment, credential).await?;

        let updated = self
            .ledger
            .update_status(user.id, PaymentStatus::Success, &session.raw)
            .await?;

        info!(
            "Payment {} for user {} moved to {} (order {})",
            updated.id, user.id, updated.status, updated.order_ref
        );

        Ok(VerifyOutcome {
            order_ref: updated.order_ref,
            already_verified: false,
        })
    }

    /// The user's payment history, newest first.
    pub async fn list_payments(&self, user_id: UserId) -> CoreResult<Vec<Payment>> {
        Ok(self.ledger.list_for_user(user_id).await?)
    }

    async fn commit_order(&self, payment: &Payment, credential: &Masked<String>) -> CoreResult<()> {
        let command = OrderCommand {
            user_id: payment.user_id,
            order_ref: payment.order_ref.clone(),
            payment_id: payment.external_payment_id.clone(),
            amount: payment.amount,
        };

        let ack = self
            .committer
            .create_order(&command, credential)
            .await
            .inspect_err(|e| {
                error!(
                    "Order {} for user {} was not committed, payment stays {}: {}",
                    payment.order_ref, payment.user_id, payment.status, e
                )
            })?;

        if ack == CommitAck::AlreadyExists {
            info!("Order {} was already committed downstream", payment.order_ref);
        }

        // Best effort once the order exists.
        if let Err(e) = self.committer.clear_cart(payment.user_id, credential).await {
            warn!("Failed to clear cart for user {} after order {}: {}", payment.user_id, payment.order_ref, e);
        }

        Ok(())
    }

    async fn fresh_order_ref(&self) -> CoreResult<String> {
        for _ in 0..MAX_ORDER_REF_ATTEMPTS {
            let candidate = self.order_refs.generate();
            if !self.ledger.order_ref_taken(&candidate).await? {
                return Ok(candidate);
            }
            warn!("Order reference {} collided, regenerating", candidate);
        }
        Err(ReconcileError::InternalError(format!(
            "could not allocate a unique order reference after {} attempts",
            MAX_ORDER_REF_ATTEMPTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_refs_are_eight_alphanumerics() {
        let generated = RandomOrderRefs.generate();
        assert_eq!(generated.len(), ORDER_REF_LEN);
        assert!(generated.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
