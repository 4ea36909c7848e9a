use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use paysync_core::{Payment, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, middleware::AuthenticatedUser, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub message: &'static str,
    pub session_id: String,
    pub checkout_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub message: &'static str,
    pub order_id: String,
}

/// Client view of a ledger row. The stored processor response is left out.
#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub id: Uuid,
    pub order_ref: String,
    pub payment_id: String,
    pub checkout_url: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentView {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            order_ref: p.order_ref,
            payment_id: p.external_payment_id,
            checkout_url: p.checkout_url,
            amount: p.amount,
            status: p.status,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentsResponse {
    pub message: &'static str,
    pub data: Vec<PaymentView>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let outcome = state.engine.create_checkout(&caller.user, &caller.credential).await?;

    let message = if outcome.resumed {
        "Checkout session already in progress"
    } else {
        "Checkout session created"
    };

    Ok(Json(CheckoutResponse {
        message,
        session_id: outcome.session_id,
        checkout_url: outcome.checkout_url,
    }))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<VerifyResponse>, AppError> {
    let session_id = params
        .session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("session_id is required".to_string()))?;

    let outcome = state
        .engine
        .verify_payment(&caller.user, &caller.credential, &session_id)
        .await?;

    let message = if outcome.already_verified {
        "Payment already verified and order created"
    } else {
        "Payment successful and order created"
    };

    Ok(Json(VerifyResponse {
        message,
        order_id: outcome.order_ref,
    }))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<PaymentsResponse>, AppError> {
    let payments = state.engine.list_payments(caller.user.id).await?;

    Ok(Json(PaymentsResponse {
        message: "payments found for user",
        data: payments.into_iter().map(PaymentView::from).collect(),
    }))
}
