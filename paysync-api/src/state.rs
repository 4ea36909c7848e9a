use paysync_core::OrderHistory;
use paysync_order::ReconciliationEngine;
use std::sync::Arc;

use crate::middleware::AuthPipeline;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
    pub orders: Arc<dyn OrderHistory>,
    pub auth: Arc<AuthPipeline>,
}
