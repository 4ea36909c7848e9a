use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod checkout;
pub mod error;
pub mod middleware;
pub mod orders;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    let protected = Router::new()
        .route("/checkout", get(checkout::create_checkout))
        .route("/verify", get(checkout::verify_payment))
        .route("/payments", get(checkout::list_payments))
        .route("/orders", get(orders::list_orders))
        .route("/order/{id}", get(orders::get_order))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_user));

    let buyer = Router::new().route("/health", get(health)).merge(protected);

    Router::new()
        .nest("/buyer", buyer)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Empty origin list means any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ])
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
