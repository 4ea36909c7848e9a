use async_trait::async_trait;
use paysync_core::peer::{
    CartFetcher, CartItem, CartSnapshot, CommitAck, OrderCommand, OrderCommitter, OrderHistory,
    OrderSummary, PeerError,
};
use paysync_core::UserId;
use paysync_shared::Masked;
use reqwest::{Client, IntoUrl, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::upstream::{decode, endpoint, object_url, Envelope, Reply};

const CONFLICT: u16 = 409;

/// Client for the cart/order service. Forwards the caller's bearer token.
pub struct PeerServiceClient {
    client: Client,
    base_url: String,
}

impl PeerServiceClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, credential: &Masked<String>, operation: &str) -> Result<Reply, PeerError> {
        let response = request.bearer_auth(credential.expose()).send().await.map_err(|e| {
            error!("Peer {} failed: {}", operation, e);
            PeerError::Unavailable(e.to_string())
        })?;

        Reply::read(response).await.map_err(|e| {
            error!("Peer {} body read failed: {}", operation, e);
            PeerError::Unavailable(e.to_string())
        })
    }

    /// Map a non-success reply to a peer error.
    fn failure(reply: Reply, operation: &str) -> PeerError {
        match reply {
            Reply::ClientError { status, body } => {
                warn!("Peer {} answered {}: {}", operation, status, body);
                PeerError::Rejected {
                    status,
                    message: describe(&body, status),
                }
            }
            Reply::ServerError { status, body } => {
                error!("Peer {} answered {}: {}", operation, status, body);
                PeerError::Unavailable(format!("status {}", status))
            }
            Reply::Success { status, .. } => PeerError::Decode(format!("unexpected status {}", status)),
        }
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        url: impl IntoUrl,
        credential: &Masked<String>,
        operation: &str,
    ) -> Result<Option<T>, PeerError> {
        let reply = self.send(self.client.get(url), credential, operation).await?;
        match reply {
            Reply::Success { body, .. } => {
                let envelope: Envelope<T> = decode(&body).map_err(|e| {
                    error!("Peer {} returned an unexpected body: {} ({})", operation, e, body);
                    PeerError::Decode(e.to_string())
                })?;
                Ok(envelope.data)
            }
            other => Err(Self::failure(other, operation)),
        }
    }
}

/// The peer writes errors as a bare JSON string; fall back to the status.
fn describe(body: &str, status: u16) -> String {
    decode::<String>(body).unwrap_or_else(|_| format!("status {}", status))
}

#[async_trait]
impl CartFetcher for PeerServiceClient {
    async fn fetch_cart(&self, user_id: UserId, credential: &Masked<String>) -> Result<CartSnapshot, PeerError> {
        let items: Option<Vec<CartItem>> = self.get_data(self.url("/users/cart"), credential, "fetch cart").await?;
        let snapshot = CartSnapshot::from_items(items.unwrap_or_default());
        info!(
            "Fetched cart for user {}: {} item(s), total {}",
            user_id,
            snapshot.items.len(),
            snapshot.total
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl OrderCommitter for PeerServiceClient {
    async fn create_order(&self, command: &OrderCommand, credential: &Masked<String>) -> Result<CommitAck, PeerError> {
        let request = self.client.post(self.url("/users/order")).json(command);
        let reply = self.send(request, credential, "create order").await?;

        match reply {
            Reply::Success { .. } => {
                info!("Peer created order {} for user {}", command.order_ref, command.user_id);
                Ok(CommitAck::Created)
            }
            Reply::ClientError { status: CONFLICT, .. } => {
                info!("Peer already holds order {}", command.order_ref);
                Ok(CommitAck::AlreadyExists)
            }
            other => Err(Self::failure(other, "create order")),
        }
    }

    async fn clear_cart(&self, user_id: UserId, credential: &Masked<String>) -> Result<(), PeerError> {
        let request = self.client.delete(self.url("/users/cart"));
        match self.send(request, credential, "clear cart").await? {
            Reply::Success { .. } => {
                info!("Cleared cart for user {}", user_id);
                Ok(())
            }
            other => Err(Self::failure(other, "clear cart")),
        }
    }
}

#[async_trait]
impl OrderHistory for PeerServiceClient {
    async fn list_orders(&self, credential: &Masked<String>) -> Result<Vec<OrderSummary>, PeerError> {
        let orders: Option<Vec<OrderSummary>> = self.get_data(self.url("/users/order"), credential, "list orders").await?;
        Ok(orders.unwrap_or_default())
    }

    async fn get_order(&self, order_id: &str, credential: &Masked<String>) -> Result<OrderSummary, PeerError> {
        let url = object_url(&self.base_url, "/users/order", order_id).map_err(|e| {
            error!("Peer get order has no usable url: {}", e);
            PeerError::Unavailable(e)
        })?;
        self.get_data(url, credential, "get order")
            .await?
            .ok_or_else(|| PeerError::Rejected {
                status: 404,
                message: format!("order {} not found", order_id),
            })
    }
}
