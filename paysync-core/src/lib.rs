pub mod identity;
pub mod payment;
pub mod peer;
pub mod repository;

pub use identity::{AuthError, BearerCredential, Role, TokenUser, TokenVerifier};
pub use payment::{Payment, PaymentStatus, ProcessorError, ProcessorGateway};
pub use peer::{CartFetcher, CartSnapshot, OrderCommitter, OrderHistory, PeerError};
pub use repository::{LedgerError, PaymentLedger};

/// Identity-service user id.
pub type UserId = i64;

/// Coarse error classes the HTTP surface maps to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Upstream,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("payment not completed")]
    PaymentNotCompleted,
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("no active payment")]
    NoActivePayment,
    #[error("payment not found")]
    PaymentNotFound,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Processor(ProcessorError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::EmptyCart
            | ReconcileError::PaymentNotCompleted
            | ReconcileError::ValidationError(_) => ErrorKind::Validation,
            ReconcileError::NoActivePayment | ReconcileError::PaymentNotFound => ErrorKind::NotFound,
            ReconcileError::Auth(AuthError::Malformed(_) | AuthError::Rejected(_)) => ErrorKind::Authentication,
            ReconcileError::Auth(AuthError::Forbidden(_)) => ErrorKind::Authorization,
            ReconcileError::Auth(AuthError::Unreachable(_))
            | ReconcileError::Processor(_)
            | ReconcileError::Peer(_) => ErrorKind::Upstream,
            ReconcileError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

impl From<LedgerError> for ReconcileError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NoActivePayment(_) => ReconcileError::NoActivePayment,
            LedgerError::PaymentNotFound(_) => ReconcileError::PaymentNotFound,
            other => ReconcileError::InternalError(other.to_string()),
        }
    }
}

/// An unknown session or intent id is the caller's mistake, not an outage.
impl From<ProcessorError> for ReconcileError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::NotFound(_) => ReconcileError::PaymentNotFound,
            other => ReconcileError::Processor(other),
        }
    }
}

pub type CoreResult<T> = Result<T, ReconcileError>;
