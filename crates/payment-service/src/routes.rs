//! 路由定义

use std::time::Duration;

use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers;
use crate::state::AppState;

/// API 路由表
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/users/{id}", get(handlers::get_user))
        .route("/api/transactions/{user_id}", get(handlers::get_transactions))
        .route("/api/transactions/pay", post(handlers::pay))
        .route("/api/transactions/void", post(handlers::void))
        .route("/api/transactions/refund", post(handlers::refund))
}

/// CORS 配置
///
/// 契约：任意来源的 GET / POST / OPTIONS，预检缓存 300 秒。
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .max_age(Duration::from_secs(300))
}
