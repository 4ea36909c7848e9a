use axum::{
    extract::{Path, State},
    Extension, Json,
};
use paysync_core::peer::OrderSummary;
use serde::Serialize;

use crate::{error::AppError, middleware::AuthenticatedUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub message: &'static str,
    pub data: Vec<OrderSummary>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub message: &'static str,
    pub data: OrderSummary,
}

/// Buyer's orders, read through from the order service.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<OrdersResponse>, AppError> {
    let orders = state.orders.list_orders(&caller.credential).await?;
    Ok(Json(OrdersResponse {
        message: "orders",
        data: orders,
    }))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.orders.get_order(&order_id, &caller.credential).await?;
    Ok(Json(OrderResponse {
        message: "order",
        data: order,
    }))
}
