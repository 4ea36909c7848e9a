use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paysync_core::payment::{validate_transition, NewPayment, Payment, PaymentStatus};
use paysync_core::repository::{LedgerError, PaymentLedger};
use paysync_core::UserId;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

const ACTIVE_PER_USER_INDEX: &str = "payments_one_active_per_user";
const ORDER_REF_KEY: &str = "payments_order_ref_key";

const PAYMENT_COLUMNS: &str = "id, user_id, order_ref, external_payment_id, checkout_url, amount, status, raw_response, created_at, updated_at";

pub struct PgPaymentLedger {
    pool: PgPool,
}

impl PgPaymentLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: i64,
    order_ref: String,
    external_payment_id: String,
    checkout_url: Option<String>,
    amount: Decimal,
    status: String,
    raw_response: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = LedgerError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            user_id: row.user_id,
            order_ref: row.order_ref,
            external_payment_id: row.external_payment_id,
            checkout_url: row.checkout_url,
            amount: row.amount,
            status: row.status.parse()?,
            raw_response: row.raw_response,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn storage_error(err: sqlx::Error) -> LedgerError {
    tracing::error!("Ledger query failed: {:?}", err);
    LedgerError::Storage(err.to_string())
}

/// Translate unique-constraint violations on insert into ledger errors.
fn insert_error(err: sqlx::Error, input: &NewPayment) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(ACTIVE_PER_USER_INDEX) => return LedgerError::ActivePaymentExists(input.user_id),
                Some(ORDER_REF_KEY) => return LedgerError::DuplicateOrderRef(input.order_ref.clone()),
                _ => {}
            }
        }
    }
    storage_error(err)
}

#[async_trait]
impl PaymentLedger for PgPaymentLedger {
    async fn find_active(&self, user_id: UserId) -> Result<Option<Payment>, LedgerError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE user_id = $1 AND status IN ('INITIAL', 'PENDING') ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(Payment::try_from).transpose()
    }

    async fn create(&self, input: NewPayment) -> Result<Payment, LedgerError> {
        let payment = Payment::new(input.clone());

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            INSERT INTO payments (id, user_id, order_ref, external_payment_id, checkout_url, amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(payment.id)
        .bind(payment.user_id)
        .bind(&payment.order_ref)
        .bind(&payment.external_payment_id)
        .bind(&payment.checkout_url)
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| insert_error(e, &input))?;

        Payment::try_from(row)
    }

    async fn update_status(
        &self,
        user_id: UserId,
        status: PaymentStatus,
        raw_response: &str,
    ) -> Result<Payment, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let current = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE user_id = $1 AND status IN ('INITIAL', 'PENDING') ORDER BY created_at DESC LIMIT 1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?
        .ok_or(LedgerError::NoActivePayment(user_id))?;

        let current = Payment::try_from(current)?;
        validate_transition(current.status, status)?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE payments SET status = $1, raw_response = $2, updated_at = NOW() WHERE id = $3 RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(status.as_str())
        .bind(raw_response)
        .bind(current.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;

        Payment::try_from(row)
    }

    async fn find_by_external_id(&self, external_payment_id: &str) -> Result<Payment, LedgerError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE external_payment_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(external_payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| LedgerError::PaymentNotFound(external_payment_id.to_string()))?;

        Payment::try_from(row)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, LedgerError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn order_ref_taken(&self, order_ref: &str) -> Result<bool, LedgerError> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payments WHERE order_ref = $1)")
            .bind(order_ref)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(taken)
    }
}
