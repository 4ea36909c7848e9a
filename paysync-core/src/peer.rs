use async_trait::async_trait;
use paysync_shared::Masked;
use rust_decimal::Decimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::UserId;

/// One line of the cart as reported by the cart-owning service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CartItem {
    pub id: u64,
    pub user_id: UserId,
    pub product_id: u64,
    pub name: String,
    pub image_url: String,
    pub seller_id: u64,
    pub price: Decimal,
    pub qty: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.qty)
    }
}

/// Fresh read of a user's cart. Never cached or persisted here.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub total: Decimal,
}

impl CartSnapshot {
    pub fn from_items(items: Vec<CartItem>) -> Self {
        let total = items.iter().map(CartItem::line_total).sum();
        Self { items, total }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Body of the peer's order-creation call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderCommand {
    pub user_id: UserId,
    #[serde(rename = "order_ref_number")]
    pub order_ref: String,
    pub payment_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitAck {
    Created,
    /// The peer already holds an order for this reference.
    AlreadyExists,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OrderLine {
    pub id: u64,
    pub order_id: u64,
    pub product_id: u64,
    pub name: String,
    pub image_url: String,
    pub seller_id: u64,
    pub price: Decimal,
    pub qty: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order row as stored by the order-owning service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OrderSummary {
    pub id: u64,
    pub user_id: UserId,
    pub status: String,
    pub amount: Decimal,
    pub transaction_id: String,
    #[serde(deserialize_with = "order_ref_text")]
    pub order_ref_number: String,
    pub payment_id: String,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The peer stores the reference as a number on older rows.
fn order_ref_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RefValue {
        Number(u64),
        Text(String),
    }

    Ok(match RefValue::deserialize(deserializer)? {
        RefValue::Number(n) => n.to_string(),
        RefValue::Text(t) => t,
    })
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PeerError {
    #[error("Peer service unavailable: {0}")]
    Unavailable(String),
    #[error("Peer service returned {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("Peer service response did not match the contract: {0}")]
    Decode(String),
}

#[async_trait]
pub trait CartFetcher: Send + Sync {
    async fn fetch_cart(&self, user_id: UserId, credential: &Masked<String>) -> Result<CartSnapshot, PeerError>;
}

/// Durable order creation on the peer service.
///
/// Callers treat this as at-least-once: the same `order_ref` may be sent
/// again after a failure, and the peer is the idempotency authority.
#[async_trait]
pub trait OrderCommitter: Send + Sync {
    async fn create_order(&self, command: &OrderCommand, credential: &Masked<String>) -> Result<CommitAck, PeerError>;

    async fn clear_cart(&self, user_id: UserId, credential: &Masked<String>) -> Result<(), PeerError>;
}

#[async_trait]
pub trait OrderHistory: Send + Sync {
    async fn list_orders(&self, credential: &Masked<String>) -> Result<Vec<OrderSummary>, PeerError>;

    async fn get_order(&self, order_id: &str, credential: &Masked<String>) -> Result<OrderSummary, PeerError>;
}
