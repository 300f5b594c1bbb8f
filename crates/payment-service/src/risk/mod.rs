//! 风控引擎
//!
//! 支付前的风险评估，按固定顺序执行四项检查，首个失败即短路返回：
//!
//! 1. 金额上下限
//! 2. 频率（Redis 计数器，窗口内尝试次数）
//! 3. 退款滥用（数据库窗口计数）
//! 4. 重复交易（数据库窗口计数，同用户同商户同金额）
//!
//! 频率计数器按「尝试」递增，包含最终被拒绝的请求——尝试本身消耗额度。
//! 数据库侧检查在调用方的事务句柄上执行，与后续写入看到一致的快照。
//! Redis 故障是可重试的服务异常，不是对用户的风控拒绝。

mod rules;

pub use rules::RiskRules;

use rust_decimal::Decimal;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::instrument;

use payment_shared::cache::{Cache, CacheKey};

use crate::error::{PaymentError, Result};
use crate::repository::TransactionRepository;
use crate::txlog::TxLogger;

/// 风控引擎
///
/// 无状态评估器：规则固定，历史数据来自计数器存储与关系存储。
pub struct RiskEngine {
    cache: Arc<Cache>,
    rules: RiskRules,
}

impl RiskEngine {
    pub fn new(cache: Arc<Cache>, rules: RiskRules) -> Self {
        Self { cache, rules }
    }

    /// 评估一次支付尝试
    #[instrument(skip(self, tx, log))]
    pub async fn evaluate_payment_risk(
        &self,
        tx: &mut PgConnection,
        user_id: i32,
        amount: Decimal,
        merchant: &str,
        log: &mut TxLogger,
    ) -> Result<()> {
        log.info(format!(
            "[RISK] Starting Risk Evaluation for User {}...",
            user_id
        ));

        // 金额上下限
        if amount > self.rules.max_amount {
            log.info(format!(
                "[RISK] FAIL: Amount ${:.2} exceeds limit ${:.2}.",
                amount, self.rules.max_amount
            ));
            return Err(PaymentError::RiskAmountTooHigh);
        }
        if amount < self.rules.min_amount {
            log.info(format!(
                "[RISK] FAIL: Amount ${:.2} is below minimum ${:.2}.",
                amount, self.rules.min_amount
            ));
            return Err(PaymentError::RiskAmountTooLow);
        }
        log.info("[RISK] PASS: Amount limits check.");

        // 频率检查（Redis）
        let velocity_key = CacheKey::velocity(user_id);
        let (count, _first) = match self
            .cache
            .incr_with_expiry(&velocity_key, self.rules.velocity_window)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                log.info(format!("[RISK] ERROR: redis incr failed: {}", e));
                return Err(PaymentError::CounterUnavailable(e.to_string()));
            }
        };
        if count > self.rules.velocity_limit {
            log.info(format!(
                "[RISK] FAIL: Velocity limit reached (Redis: {} tx in window).",
                count
            ));
            return Err(PaymentError::RiskVelocityLimit);
        }
        log.info(format!(
            "[RISK] PASS: Velocity check (Redis: {}/{}).",
            count, self.rules.velocity_limit
        ));

        // 退款滥用（数据库）
        let refund_count = match TransactionRepository::count_refunds_since_in_tx(
            &mut *tx,
            user_id,
            self.rules.refund_window,
        )
        .await
        {
            Ok(c) => c,
            Err(e) => {
                log.info(format!("[RISK] ERROR: refund count query failed: {}", e));
                return Err(e);
            }
        };
        if refund_count >= self.rules.refund_limit {
            log.info(format!(
                "[RISK] FAIL: User has {} refunds in 24h. Account temporarily frozen.",
                refund_count
            ));
            return Err(PaymentError::RiskRefundAbuse);
        }
        log.info(format!(
            "[RISK] PASS: Refund history check ({} refunds in 24h).",
            refund_count
        ));

        // 重复交易（数据库）
        let dup_count = match TransactionRepository::count_duplicates_since_in_tx(
            &mut *tx,
            user_id,
            merchant,
            amount,
            self.rules.duplicate_window,
        )
        .await
        {
            Ok(c) => c,
            Err(e) => {
                log.info(format!("[RISK] ERROR: duplicate count query failed: {}", e));
                return Err(e);
            }
        };
        if dup_count > 0 {
            log.info("[RISK] FAIL: Duplicate transaction detected.");
            return Err(PaymentError::RiskDuplicate);
        }

        log.info("[RISK] PASS: Duplicate transaction check.");
        log.info("[RISK] [V] All Risk Checks Passed.");
        Ok(())
    }
}
