use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use paysync_api::{app, middleware::AuthPipeline, AppState};
use paysync_core::payment::{
    CheckoutSession, PaymentIntent, PaymentStatus, ProcessorError, ProcessorGateway, SessionPaymentStatus,
    SessionStatus,
};
use paysync_core::peer::{CartItem, CartSnapshot, CommitAck, OrderCommand, OrderSummary, PeerError};
use paysync_core::{
    AuthError, CartFetcher, OrderCommitter, OrderHistory, PaymentLedger, Role, TokenUser, TokenVerifier, UserId,
};
use paysync_order::ReconciliationEngine;
use paysync_shared::Masked;
use paysync_store::InMemoryPaymentLedger;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

// ============================================================================
// Fakes
// ============================================================================

struct FakeVerifier {
    outcome: Mutex<Result<TokenUser, AuthError>>,
}

#[async_trait]
impl TokenVerifier for FakeVerifier {
    async fn verify(&self, _token: &Masked<String>) -> Result<TokenUser, AuthError> {
        self.outcome.lock().unwrap().clone()
    }

    async fn authorize_by_role(&self, token: &Masked<String>, _role: Role) -> Result<TokenUser, AuthError> {
        self.verify(token).await
    }
}

#[derive(Default)]
struct FakeProcessor {
    lookups: AtomicUsize,
    paid: Mutex<bool>,
}

#[async_trait]
impl ProcessorGateway for FakeProcessor {
    async fn create_checkout_session(
        &self,
        _amount: Decimal,
        _user_id: UserId,
        _order_ref: &str,
    ) -> Result<CheckoutSession, ProcessorError> {
        Ok(CheckoutSession {
            session_id: "cs_test_api".to_string(),
            checkout_url: "https://checkout.example/cs_test_api".to_string(),
        })
    }

    async fn get_checkout_session(&self, session_id: &str) -> Result<SessionStatus, ProcessorError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if session_id.starts_with("cs_bogus") {
            return Err(ProcessorError::NotFound(format!("No such checkout.session: '{}'", session_id)));
        }
        let paid = *self.paid.lock().unwrap();
        Ok(SessionStatus {
            session_id: session_id.to_string(),
            status: if paid { SessionPaymentStatus::Paid } else { SessionPaymentStatus::Unpaid },
            raw: r#"{"payment_status":"paid"}"#.to_string(),
        })
    }

    async fn create_payment_intent(
        &self,
        _amount: Decimal,
        _user_id: UserId,
        _order_ref: &str,
    ) -> Result<PaymentIntent, ProcessorError> {
        Err(ProcessorError::Unavailable("not used".to_string()))
    }

    async fn get_payment_status(&self, _intent_id: &str) -> Result<PaymentIntent, ProcessorError> {
        Err(ProcessorError::Unavailable("not used".to_string()))
    }
}

#[derive(Default)]
struct FakePeer {
    items: Mutex<Vec<CartItem>>,
    commits: AtomicUsize,
}

#[async_trait]
impl CartFetcher for FakePeer {
    async fn fetch_cart(&self, _user_id: UserId, _credential: &Masked<String>) -> Result<CartSnapshot, PeerError> {
        Ok(CartSnapshot::from_items(self.items.lock().unwrap().clone()))
    }
}

#[async_trait]
impl OrderCommitter for FakePeer {
    async fn create_order(&self, _command: &OrderCommand, _credential: &Masked<String>) -> Result<CommitAck, PeerError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(CommitAck::Created)
    }

    async fn clear_cart(&self, _user_id: UserId, _credential: &Masked<String>) -> Result<(), PeerError> {
        self.items.lock().unwrap().clear();
        Ok(())
    }
}

#[async_trait]
impl OrderHistory for FakePeer {
    async fn list_orders(&self, _credential: &Masked<String>) -> Result<Vec<OrderSummary>, PeerError> {
        Ok(vec![])
    }

    async fn get_order(&self, order_id: &str, _credential: &Masked<String>) -> Result<OrderSummary, PeerError> {
        Err(PeerError::Rejected {
            status: 404,
            message: format!("order {} not found", order_id),
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

struct TestApp {
    router: Router,
    verifier: Arc<FakeVerifier>,
    processor: Arc<FakeProcessor>,
    peer: Arc<FakePeer>,
    ledger: Arc<InMemoryPaymentLedger>,
}

fn buyer() -> TokenUser {
    TokenUser {
        id: 21,
        email: "buyer@example.com".to_string(),
        role: Role::Buyer,
    }
}

fn test_app() -> TestApp {
    let verifier = Arc::new(FakeVerifier {
        outcome: Mutex::new(Ok(buyer())),
    });
    let processor = Arc::new(FakeProcessor::default());
    let peer = Arc::new(FakePeer::default());
    let ledger = Arc::new(InMemoryPaymentLedger::new());

    let engine = ReconciliationEngine::new(ledger.clone(), processor.clone(), peer.clone(), peer.clone());
    let state = AppState {
        engine: Arc::new(engine),
        orders: peer.clone(),
        auth: Arc::new(AuthPipeline::authenticated(verifier.clone())),
    };

    TestApp {
        router: app(state, &[]),
        verifier,
        processor,
        peer,
        ledger,
    }
}

fn fill_cart(app: &TestApp) {
    *app.peer.items.lock().unwrap() = vec![
        CartItem {
            id: 1,
            user_id: 21,
            product_id: 1,
            name: "Mug".to_string(),
            image_url: String::new(),
            seller_id: 4,
            price: dec!(10.00),
            qty: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        CartItem {
            id: 2,
            user_id: 21,
            product_id: 2,
            name: "Tee".to_string(),
            image_url: String::new(),
            seller_id: 4,
            price: dec!(29.99),
            qty: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
    ];
}

async fn get(router: &Router, uri: &str, authorization: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }

    let response = router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

const BEARER: Option<&str> = Some("Bearer tok-abc");

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn health_needs_no_token() {
    let app = test_app();
    let (status, body) = get(&app.router, "/buyer/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_header_is_unauthorized() {
    let app = test_app();
    let (status, body) = get(&app.router, "/buyer/checkout", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Missing authorization token");
}

#[tokio::test]
async fn wrong_scheme_is_unauthorized() {
    let app = test_app();
    let (status, _) = get(&app.router, "/buyer/checkout", Some("Token tok-abc")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejected_token_is_unauthorized() {
    let app = test_app();
    *app.verifier.outcome.lock().unwrap() = Err(AuthError::Rejected("token is expired".to_string()));

    let (status, body) = get(&app.router, "/buyer/checkout", BEARER).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn empty_cart_is_bad_request() {
    let app = test_app();
    let (status, body) = get(&app.router, "/buyer/checkout", BEARER).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "cart is empty");
    assert!(app.ledger.find_active(21).await.unwrap().is_none());
}

#[tokio::test]
async fn checkout_returns_session_and_records_payment() {
    let app = test_app();
    fill_cart(&app);

    let (status, body) = get(&app.router, "/buyer/checkout", BEARER).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Checkout session created");
    assert_eq!(body["session_id"], "cs_test_api");
    assert_eq!(body["checkout_url"], "https://checkout.example/cs_test_api");

    let active = app.ledger.find_active(21).await.unwrap().unwrap();
    assert_eq!(active.amount, dec!(49.99));
    assert_eq!(active.status, PaymentStatus::Initial);
}

#[tokio::test]
async fn verify_without_session_id_is_bad_request() {
    let app = test_app();
    let (status, body) = get(&app.router, "/buyer/verify", BEARER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "session_id is required");
}

#[tokio::test]
async fn unreachable_identity_service_is_bad_gateway() {
    let app = test_app();
    fill_cart(&app);
    get(&app.router, "/buyer/checkout", BEARER).await;
    *app.processor.paid.lock().unwrap() = true;
    *app.verifier.outcome.lock().unwrap() = Err(AuthError::Unreachable("connect timeout".to_string()));

    let (status, _) = get(&app.router, "/buyer/verify?session_id=cs_test_api", BEARER).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(app.processor.lookups.load(Ordering::SeqCst), 0);
    assert_eq!(app.peer.commits.load(Ordering::SeqCst), 0);
    let active = app.ledger.find_active(21).await.unwrap().unwrap();
    assert_eq!(active.status, PaymentStatus::Initial);
}

#[tokio::test]
async fn unpaid_session_is_bad_request() {
    let app = test_app();
    fill_cart(&app);
    get(&app.router, "/buyer/checkout", BEARER).await;

    let (status, body) = get(&app.router, "/buyer/verify?session_id=cs_test_api", BEARER).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "payment not completed");
    assert_eq!(app.peer.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn paid_session_creates_order_once() {
    let app = test_app();
    fill_cart(&app);
    get(&app.router, "/buyer/checkout", BEARER).await;
    *app.processor.paid.lock().unwrap() = true;
    let order_ref = app.ledger.find_active(21).await.unwrap().unwrap().order_ref;

    let (status, body) = get(&app.router, "/buyer/verify?session_id=cs_test_api", BEARER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Payment successful and order created");
    assert_eq!(body["order_id"], order_ref.as_str());

    let (status, body) = get(&app.router, "/buyer/verify?session_id=cs_test_api", BEARER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Payment already verified and order created");
    assert_eq!(body["order_id"], order_ref.as_str());

    assert_eq!(app.peer.commits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = test_app();
    *app.processor.paid.lock().unwrap() = true;

    let (status, body) = get(&app.router, "/buyer/verify?session_id=cs_other", BEARER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "payment not found");
}

#[tokio::test]
async fn session_unknown_to_processor_is_not_found() {
    let app = test_app();
    fill_cart(&app);
    get(&app.router, "/buyer/checkout", BEARER).await;

    let (status, body) = get(&app.router, "/buyer/verify?session_id=cs_bogus", BEARER).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "payment not found");
    assert_eq!(app.peer.commits.load(Ordering::SeqCst), 0);
    let active = app.ledger.find_active(21).await.unwrap().unwrap();
    assert_eq!(active.status, PaymentStatus::Initial);
}

#[tokio::test]
async fn payment_history_hides_raw_response() {
    let app = test_app();
    fill_cart(&app);
    get(&app.router, "/buyer/checkout", BEARER).await;
    *app.processor.paid.lock().unwrap() = true;
    get(&app.router, "/buyer/verify?session_id=cs_test_api", BEARER).await;

    let (status, body) = get(&app.router, "/buyer/payments", BEARER).await;

    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "SUCCESS");
    assert_eq!(rows[0]["amount"], 49.99);
    assert!(rows[0].get("raw_response").is_none());
}

#[tokio::test]
async fn missing_order_passes_through_as_not_found() {
    let app = test_app();
    let (status, body) = get(&app.router, "/buyer/order/77", BEARER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "order not found");
}

#[tokio::test]
async fn orders_are_listed() {
    let app = test_app();
    let (status, body) = get(&app.router, "/buyer/orders", BEARER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], Value::Array(vec![]));
}
