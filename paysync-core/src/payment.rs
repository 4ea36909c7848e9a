use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::repository::LedgerError;
use crate::UserId;

/// Lifecycle of one checkout attempt in the local ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Initial,
    /// Reserved for processors with asynchronous capture. Counts as active.
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Initial => "INITIAL",
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }

    /// Active payments block a user from starting another checkout.
    pub fn is_active(&self) -> bool {
        matches!(self, PaymentStatus::Initial | PaymentStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIAL" => Ok(PaymentStatus::Initial),
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(LedgerError::Storage(format!("unknown payment status '{}'", other))),
        }
    }
}

/// Check a ledger transition. Only active rows move, and only to a terminal status.
pub fn validate_transition(from: PaymentStatus, to: PaymentStatus) -> Result<(), LedgerError> {
    if !from.is_active() || !to.is_terminal() {
        return Err(LedgerError::InvalidTransition { from, to });
    }
    Ok(())
}

/// One row of the payment ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: UserId,
    /// Client-facing order reference, distinct from `id`.
    pub order_ref: String,
    /// Processor-assigned checkout session or intent id.
    pub external_payment_id: String,
    pub checkout_url: Option<String>,
    pub amount: Decimal,
    pub status: PaymentStatus,
    /// Verbatim processor response kept for audit. Never returned to clients.
    pub raw_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for `PaymentLedger::create`.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: UserId,
    pub amount: Decimal,
    pub order_ref: String,
    pub external_payment_id: String,
    pub checkout_url: Option<String>,
}

impl Payment {
    pub fn new(input: NewPayment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            order_ref: input.order_ref,
            external_payment_id: input.external_payment_id,
            checkout_url: input.checkout_url,
            amount: input.amount,
            status: PaymentStatus::Initial,
            raw_response: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a terminal transition in place.
    pub fn transition(&mut self, to: PaymentStatus, raw_response: &str) -> Result<(), LedgerError> {
        validate_transition(self.status, to)?;
        self.status = to;
        self.raw_response = Some(raw_response.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }
}

// ============================================================================
// Processor view
// ============================================================================

/// A freshly created hosted checkout session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub checkout_url: String,
}

/// The processor's `payment_status` for a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl SessionPaymentStatus {
    pub fn from_processor(value: &str) -> Self {
        match value {
            "paid" => SessionPaymentStatus::Paid,
            "no_payment_required" => SessionPaymentStatus::NoPaymentRequired,
            _ => SessionPaymentStatus::Unpaid,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub session_id: String,
    pub status: SessionPaymentStatus,
    /// Full response body, stored in the ledger on success.
    pub raw: String,
}

impl SessionStatus {
    pub fn is_paid(&self) -> bool {
        self.status == SessionPaymentStatus::Paid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    RequiresCapture,
    Processing,
    Succeeded,
    Canceled,
}

/// Direct-intent flow, used by clients that collect card details themselves.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: IntentStatus,
    pub client_secret: Option<String>,
    pub raw: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProcessorError {
    /// Timeouts, connection failures, 5xx and undecodable bodies.
    #[error("Payment processor unavailable: {0}")]
    Unavailable(String),
    /// The processor answered with a 4xx.
    #[error("Payment processor rejected the request: {0}")]
    Rejected(String),
    /// A lookup by id found nothing on the processor side.
    #[error("Payment processor has no such object: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait ProcessorGateway: Send + Sync {
    /// Create a hosted checkout session for the given decimal amount.
    async fn create_checkout_session(
        &self,
        amount: Decimal,
        user_id: UserId,
        order_ref: &str,
    ) -> Result<CheckoutSession, ProcessorError>;

    /// Fetch the payment status of a checkout session
    async fn get_checkout_session(&self, session_id: &str) -> Result<SessionStatus, ProcessorError>;

    async fn create_payment_intent(
        &self,
        amount: Decimal,
        user_id: UserId,
        order_ref: &str,
    ) -> Result<PaymentIntent, ProcessorError>;

    async fn get_payment_status(&self, intent_id: &str) -> Result<PaymentIntent, ProcessorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Payment {
        Payment::new(NewPayment {
            user_id: 7,
            amount: dec!(49.99),
            order_ref: "AB12CD34".to_string(),
            external_payment_id: "cs_test_1".to_string(),
            checkout_url: Some("https://checkout.example/cs_test_1".to_string()),
        })
    }

    #[test]
    fn new_payment_starts_initial() {
        let payment = sample();
        assert_eq!(payment.status, PaymentStatus::Initial);
        assert!(payment.status.is_active());
        assert!(payment.raw_response.is_none());
    }

    #[test]
    fn initial_can_move_to_terminal() {
        let mut payment = sample();
        payment.transition(PaymentStatus::Success, "{\"payment_status\":\"paid\"}").unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.raw_response.as_deref(), Some("{\"payment_status\":\"paid\"}"));
    }

    #[test]
    fn non_terminal_target_is_rejected() {
        let mut payment = sample();
        let result = payment.transition(PaymentStatus::Pending, "");
        assert!(matches!(result, Err(LedgerError::InvalidTransition { .. })));
        assert_eq!(payment.status, PaymentStatus::Initial);
    }

    #[test]
    fn terminal_rows_do_not_move() {
        let mut payment = sample();
        payment.transition(PaymentStatus::Failed, "").unwrap();
        assert!(payment.transition(PaymentStatus::Success, "").is_err());
    }

    #[test]
    fn status_round_trips_through_db_text() {
        for status in [
            PaymentStatus::Initial,
            PaymentStatus::Pending,
            PaymentStatus::Success,
            PaymentStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("initial".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn only_paid_sessions_count_as_paid() {
        assert_eq!(SessionPaymentStatus::from_processor("paid"), SessionPaymentStatus::Paid);
        assert_eq!(SessionPaymentStatus::from_processor("unpaid"), SessionPaymentStatus::Unpaid);
        assert_eq!(
            SessionPaymentStatus::from_processor("no_payment_required"),
            SessionPaymentStatus::NoPaymentRequired
        );
    }
}
