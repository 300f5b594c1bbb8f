//! 信用卡交易核心服务入口
//!
//! 加载配置，连接 PostgreSQL 与 Redis（失败即退出），
//! 装配风控引擎、清算调度器与交易服务，启动 HTTP 服务并支持优雅关闭。

use std::sync::Arc;
use std::time::Duration;

use payment_service::models::MerchantRates;
use payment_service::routes;
use payment_service::state::AppState;
use payment_service::{RiskEngine, RiskRules, SettlementScheduler, TransactionService};
use payment_shared::cache::Cache;
use payment_shared::config::AppConfig;
use payment_shared::database::Database;
use payment_shared::observability;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().unwrap_or_default();
    observability::init(&config.observability)?;

    info!(
        "Starting {} on {}",
        config.service_name,
        config.server_addr()
    );

    // 基础设施连接失败直接退出，不以降级状态提供支付服务
    let db = Database::connect(&config.database).await?;
    db.health_check().await?;
    info!("PostgreSQL connected");

    let cache = Arc::new(Cache::new(&config.redis)?);
    cache.health_check().await?;
    info!("Redis connected");

    if config.loadtest {
        warn!("LOADTEST mode enabled: risk thresholds relaxed");
    }
    let risk = RiskEngine::new(cache.clone(), RiskRules::new(config.loadtest));

    // 调度器与服务循环引用：先建调度器，服务构造完成后回填
    let scheduler = Arc::new(SettlementScheduler::new(Duration::from_secs(
        config.settlement.delay_seconds,
    )));
    let service = Arc::new(TransactionService::new(
        db.pool().clone(),
        risk,
        MerchantRates::default(),
        scheduler.clone(),
    ));
    scheduler.bind(service.clone()).await;

    let state = AppState::new(service);
    let app = routes::api_routes()
        .layer(routes::cors_layer())
        .with_state(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程：
/// 停止接收新连接并等待已有请求处理完毕。
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
