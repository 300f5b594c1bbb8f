//! 延迟清算调度器
//!
//! 进程内的协作式调度：每笔已提交的支付安排一个延迟任务，
//! 到期后调用交易服务的清算逻辑。任务在独立的 tokio task 中运行，
//! 客户端断开不会使 Pending 交易成为孤儿。
//!
//! 调度器与交易服务互相持有引用，服务句柄在初始化完成后延迟注入。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::service::TransactionService;

/// 清算调度器
pub struct SettlementScheduler {
    delay: Duration,
    /// 交易服务（延迟注入，避免循环依赖）
    service: RwLock<Option<Arc<TransactionService>>>,
}

impl SettlementScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            service: RwLock::new(None),
        }
    }

    /// 授权到清算之间的延迟
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 注入交易服务
    ///
    /// 调度器先于服务构造，服务初始化后通过此方法绑定。
    pub async fn bind(&self, service: Arc<TransactionService>) {
        let mut guard = self.service.write().await;
        *guard = Some(service);
        info!("SettlementScheduler bound to transaction service");
    }

    /// 安排一笔交易的延迟清算
    ///
    /// 任务按每笔支付派生（规格允许的简单模型）。未绑定服务时仅告警：
    /// 交易保持 Pending，属于可接受的运维问题而非请求错误。
    pub async fn schedule(&self, transaction_id: i64) {
        let service = {
            let guard = self.service.read().await;
            guard.clone()
        };

        let Some(service) = service else {
            warn!(
                transaction_id,
                "settlement scheduler not bound; transaction stays pending"
            );
            return;
        };

        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            service.settle(transaction_id).await;
        });
    }
}
