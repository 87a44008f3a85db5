pub mod handlers;

pub use handlers::*;

use crate::service::BillingService;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

/// 构建路由
pub fn router(service: Arc<BillingService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/upload-bill", post(upload_bill))
        .route("/analyze", post(analyze_bill))
        .route("/confirm-bill", post(confirm_bill))
        .route("/chat/start", post(start_chat))
        .route("/chat", post(chat))
        .route("/results/:session_id", get(get_results))
        .route("/results/:session_id/export", get(export_results))
        .route("/dispute/preview", post(dispute_preview))
        .route("/sessions/:session_id", delete(delete_session))
        .with_state(service)
}
