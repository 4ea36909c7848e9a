use async_trait::async_trait;
use paysync_core::payment::{
    CheckoutSession, IntentStatus, PaymentIntent, ProcessorError, ProcessorGateway,
    SessionPaymentStatus, SessionStatus,
};
use paysync_core::UserId;
use paysync_shared::money::{from_minor_units, to_minor_units};
use paysync_shared::Masked;
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::app_config::ProcessorConfig;
use crate::upstream::{decode, endpoint, object_url, Reply};

const LINE_ITEM_NAME: &str = "Order Payment";

/// Stripe over its REST API. The secret key lives in this value only.
pub struct StripeGateway {
    client: Client,
    secret_key: Masked<String>,
    base_url: String,
    currency: String,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    id: String,
    url: Option<String>,
    payment_status: String,
}

#[derive(Debug, Deserialize)]
struct IntentBody {
    id: String,
    amount: i64,
    currency: String,
    status: IntentStatus,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(client: Client, config: &ProcessorConfig) -> Self {
        Self {
            client,
            secret_key: Masked::new(config.secret_key.clone()),
            base_url: config.base_url.clone(),
            currency: config.currency.to_lowercase(),
            success_url: config.success_url.trim_end_matches('/').to_string(),
            cancel_url: config.cancel_url.trim_end_matches('/').to_string(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.secret_key.expose())
    }

    fn minor_units(amount: Decimal) -> Result<i64, ProcessorError> {
        to_minor_units(amount).map_err(|e| ProcessorError::Rejected(e.to_string()))
    }

    fn metadata(user_id: UserId, order_ref: &str) -> [(String, String); 2] {
        [
            ("metadata[userId]".to_string(), user_id.to_string()),
            ("metadata[orderId]".to_string(), order_ref.to_string()),
        ]
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Reply, ProcessorError> {
        let response = self.authorized(request).send().await.map_err(|e| {
            error!("Stripe {} transport failure: {}", operation, e);
            ProcessorError::Unavailable(e.to_string())
        })?;

        Reply::read(response).await.map_err(|e| {
            error!("Stripe {} body read failure: {}", operation, e);
            ProcessorError::Unavailable(e.to_string())
        })
    }

    /// Returns the raw body of a 2xx reply; anything else becomes an error.
    fn into_body(reply: Reply, operation: &str) -> Result<String, ProcessorError> {
        match reply {
            Reply::Success { body, .. } => Ok(body),
            Reply::ClientError { status, body } => {
                warn!("Stripe {} rejected with {}: {}", operation, status, body);
                Err(ProcessorError::Rejected(error_message(&body, status)))
            }
            Reply::ServerError { status, body } => {
                error!("Stripe {} failed with {}: {}", operation, status, body);
                Err(ProcessorError::Unavailable(format!("status {}", status)))
            }
        }
    }

    async fn execute(&self, request: RequestBuilder, operation: &str) -> Result<String, ProcessorError> {
        let reply = self.send(request, operation).await?;
        Self::into_body(reply, operation)
    }

    /// GET one object by id. A 404 here means the id is unknown.
    async fn lookup(&self, collection: &str, id: &str, operation: &str) -> Result<String, ProcessorError> {
        let url = object_url(&self.base_url, collection, id).map_err(|e| {
            error!("Stripe {} has no usable url: {}", operation, e);
            ProcessorError::Unavailable(e)
        })?;

        match self.send(self.client.get(url), operation).await? {
            Reply::ClientError { status: 404, body } => {
                warn!("Stripe {} found no object {}", operation, id);
                Err(ProcessorError::NotFound(error_message(&body, 404)))
            }
            other => Self::into_body(other, operation),
        }
    }

    fn decode_body<T: serde::de::DeserializeOwned>(body: &str, operation: &str) -> Result<T, ProcessorError> {
        decode(body).map_err(|e| {
            error!("Stripe {} returned an unexpected body: {} ({})", operation, e, body);
            ProcessorError::Unavailable(format!("undecodable response: {}", e))
        })
    }

    fn into_intent(parsed: IntentBody, raw: String) -> PaymentIntent {
        PaymentIntent {
            id: parsed.id,
            amount: from_minor_units(parsed.amount),
            currency: parsed.currency,
            status: parsed.status,
            client_secret: parsed.client_secret,
            raw,
        }
    }
}

fn error_message(body: &str, status: u16) -> String {
    decode::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| format!("status {}", status))
}

#[async_trait]
impl ProcessorGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        amount: Decimal,
        user_id: UserId,
        order_ref: &str,
    ) -> Result<CheckoutSession, ProcessorError> {
        let unit_amount = Self::minor_units(amount)?;

        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("line_items[0][price_data][currency]".to_string(), self.currency.clone()),
            ("line_items[0][price_data][unit_amount]".to_string(), unit_amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                LINE_ITEM_NAME.to_string(),
            ),
            (
                "success_url".to_string(),
                format!("{}/#/success?session_id={{CHECKOUT_SESSION_ID}}", self.success_url),
            ),
            ("cancel_url".to_string(), format!("{}/#/cart", self.cancel_url)),
        ];
        form.extend(Self::metadata(user_id, order_ref));

        let request = self
            .client
            .post(endpoint(&self.base_url, "/v1/checkout/sessions"))
            .header("Idempotency-Key", order_ref)
            .form(&form);

        let body = self.execute(request, "create checkout session").await?;
        let parsed: SessionBody = Self::decode_body(&body, "create checkout session")?;

        let checkout_url = parsed.url.ok_or_else(|| {
            error!("Stripe checkout session {} has no hosted url", parsed.id);
            ProcessorError::Unavailable("checkout session has no url".to_string())
        })?;

        info!("Created checkout session {} for order {}", parsed.id, order_ref);
        Ok(CheckoutSession {
            session_id: parsed.id,
            checkout_url,
        })
    }

    async fn get_checkout_session(&self, session_id: &str) -> Result<SessionStatus, ProcessorError> {
        let body = self
            .lookup("/v1/checkout/sessions", session_id, "get checkout session")
            .await?;
        let parsed: SessionBody = Self::decode_body(&body, "get checkout session")?;
        if parsed.id != session_id {
            error!("Stripe answered session {} when asked for {}", parsed.id, session_id);
            return Err(ProcessorError::Unavailable(format!(
                "response names session {} instead of {}",
                parsed.id, session_id
            )));
        }

        Ok(SessionStatus {
            session_id: parsed.id,
            status: SessionPaymentStatus::from_processor(&parsed.payment_status),
            raw: body,
        })
    }

    async fn create_payment_intent(
        &self,
        amount: Decimal,
        user_id: UserId,
        order_ref: &str,
    ) -> Result<PaymentIntent, ProcessorError> {
        let minor = Self::minor_units(amount)?;

        let mut form = vec![
            ("amount".to_string(), minor.to_string()),
            ("currency".to_string(), self.currency.clone()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
        ];
        form.extend(Self::metadata(user_id, order_ref));

        let request = self
            .client
            .post(endpoint(&self.base_url, "/v1/payment_intents"))
            .header("Idempotency-Key", format!("pi-{}", order_ref))
            .form(&form);

        let body = self.execute(request, "create payment intent").await?;
        let parsed: IntentBody = Self::decode_body(&body, "create payment intent")?;

        info!("Created payment intent {} for order {}", parsed.id, order_ref);
        Ok(Self::into_intent(parsed, body))
    }

    async fn get_payment_status(&self, intent_id: &str) -> Result<PaymentIntent, ProcessorError> {
        let body = self
            .lookup("/v1/payment_intents", intent_id, "get payment intent")
            .await?;
        let parsed: IntentBody = Self::decode_body(&body, "get payment intent")?;

        Ok(Self::into_intent(parsed, body))
    }
}
