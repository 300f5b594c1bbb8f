//! 应用状态定义
//!
//! Axum 路由共享的应用状态

use std::sync::Arc;

use crate::service::TransactionService;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 交易服务，通过 Arc 在 handler 间共享
    pub service: Arc<TransactionService>,
}

impl AppState {
    pub fn new(service: Arc<TransactionService>) -> Self {
        Self { service }
    }
}
