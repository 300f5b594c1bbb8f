//! 交易服务
//!
//! 两阶段「授权-清算」状态机的编排核心：
//!
//! - `pay`：风控 → 锁用户行 → 积分抵扣 → 额度检查 → 写入 Pending 交易，
//!   提交后安排延迟清算。余额与积分此时不动。
//! - `settle`：延迟到期后在独立事务内锁交易行，校验仍为 Pending，
//!   重检额度后落账（余额 + 积分 + 流水），置 Paid；额度不足置 Voided。
//! - `void` / `refund`：按状态机约束冲正，违规转移被状态守卫拒绝。
//!
//! 每个写操作在单个数据库事务内执行：先 `begin_logged` 开启事务，
//! 结束时 `commit_or_rollback` 统一提交或回滚并交还操作日志。
//! 任何提前返回（含取消）都由 sqlx 事务的 Drop 语义兜底回滚，
//! 连接在所有退出路径上都会归还。

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::error::{FailedOperation, PaymentError, Result};
use crate::models::{MerchantRates, Transaction, TxStatus, User};
use crate::repository::{PointsRepository, TransactionRepository, UserRepository};
use crate::risk::RiskEngine;
use crate::service::dto::{RefundResult, TxResult, VoidResult};
use crate::settlement::SettlementScheduler;
use crate::txlog::TxLogger;

type PgTx = SqlxTransaction<'static, Postgres>;

/// 交易服务
///
/// 持有连接池、风控引擎、商户倍率表与清算调度器，生命周期与进程一致。
pub struct TransactionService {
    pool: PgPool,
    risk: RiskEngine,
    rates: MerchantRates,
    scheduler: Arc<SettlementScheduler>,
    user_repo: UserRepository,
    tx_repo: TransactionRepository,
}

impl TransactionService {
    pub fn new(
        pool: PgPool,
        risk: RiskEngine,
        rates: MerchantRates,
        scheduler: Arc<SettlementScheduler>,
    ) -> Self {
        Self {
            user_repo: UserRepository::new(pool.clone()),
            tx_repo: TransactionRepository::new(pool.clone()),
            pool,
            risk,
            rates,
            scheduler,
        }
    }

    // ==================== 查询操作 ====================

    /// 查询用户账户
    pub async fn get_user_details(&self, user_id: i32) -> Result<User> {
        self.user_repo
            .get_user(user_id)
            .await?
            .ok_or(PaymentError::UserNotFound(user_id))
    }

    /// 查询用户交易历史（按创建时间倒序）
    pub async fn get_transaction_history(&self, user_id: i32) -> Result<Vec<Transaction>> {
        self.tx_repo.list_by_user(user_id).await
    }

    // ==================== 事务包装 ====================

    /// 开启事务并记录日志
    async fn begin_logged(&self, log: &mut TxLogger) -> Result<PgTx> {
        log.sql("START TRANSACTION;");
        Ok(self.pool.begin().await?)
    }

    /// 按结果提交或回滚事务，交还操作日志
    ///
    /// 成功则记录 COMMIT 并提交（提交失败以该错误返回）；
    /// 失败则记录 ROLLBACK 并显式回滚，原始错误原样传出。
    async fn commit_or_rollback<T>(
        tx: PgTx,
        mut log: TxLogger,
        result: Result<T>,
    ) -> (Result<T>, Vec<String>) {
        match result {
            Ok(value) => {
                log.sql("COMMIT;");
                match tx.commit().await {
                    Ok(()) => (Ok(value), log.into_logs()),
                    Err(e) => (Err(e.into()), log.into_logs()),
                }
            }
            Err(e) => {
                log.sql("ROLLBACK; -- Error occurred");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "事务回滚失败");
                }
                (Err(e), log.into_logs())
            }
        }
    }

    // ==================== 支付 ====================

    /// 处理一次支付请求
    ///
    /// 提交成功后安排延迟清算并返回结果（附操作日志）；
    /// 任何失败都带着截至失败点的操作日志返回。
    #[instrument(skip(self))]
    pub async fn pay(
        &self,
        user_id: i32,
        amount: Decimal,
        merchant: &str,
        use_points: bool,
    ) -> std::result::Result<TxResult, FailedOperation> {
        let mut log = TxLogger::new();
        let mut tx = match self.begin_logged(&mut log).await {
            Ok(tx) => tx,
            Err(e) => return Err(FailedOperation::new(e, log.into_logs())),
        };

        let result = self
            .pay_in_tx(&mut tx, &mut log, user_id, amount, merchant, use_points)
            .await;
        let (result, logs) = Self::commit_or_rollback(tx, log, result).await;

        match result {
            Ok(mut res) => {
                res.logs = logs;
                // 提交之后才安排清算：回滚掉的交易不能进入清算队列
                self.scheduler.schedule(res.transaction_id).await;
                Ok(res)
            }
            Err(error) => Err(FailedOperation::new(error, logs)),
        }
    }

    async fn pay_in_tx(
        &self,
        tx: &mut PgTx,
        log: &mut TxLogger,
        user_id: i32,
        amount: Decimal,
        merchant: &str,
        use_points: bool,
    ) -> Result<TxResult> {
        log.raw(format!(
            "\n> Processing: PAY at {}, User: {}, Total: ${:.2}\n",
            merchant, user_id, amount
        ));

        // 商户白名单
        let multiplier = self
            .rates
            .multiplier(merchant)
            .ok_or(PaymentError::InvalidMerchant)?;

        // 风控评估：数据库侧检查复用本事务的句柄
        self.risk
            .evaluate_payment_risk(&mut *tx, user_id, amount, merchant, log)
            .await?;

        // 锁定用户行
        log.info(format!(
            "[PAY] Starting transaction logic for User {}.",
            user_id
        ));
        log.sql(format!(
            "SELECT * FROM users WHERE user_id = {} FOR UPDATE;",
            user_id
        ));
        let user = UserRepository::get_user_for_update_in_tx(&mut *tx, user_id)
            .await?
            .ok_or(PaymentError::UserNotFound(user_id))?;

        // 积分抵扣：100 积分抵 $1，折扣取整数美元
        let mut final_amount = amount;
        let mut points_redeemed = 0;
        let mut discount = Decimal::ZERO;

        if use_points && user.current_points >= 100 {
            log.info(format!(
                "[Points Redemption] User has {} pts. Calculating discount...",
                user.current_points
            ));
            let redemption = compute_redemption(user.current_points, final_amount);
            if redemption.points_redeemed > 0 {
                points_redeemed = redemption.points_redeemed;
                discount = redemption.discount;
                final_amount -= discount;
                log.info(format!(
                    "Redeeming {} pts for ${:.2} discount.",
                    points_redeemed, discount
                ));
            } else {
                log.info("Points insufficient for minimum $1 discount or amount is too small.");
            }
        } else {
            log.info("No points redemption applied.");
        }

        log.info(format!(
            "Final Payment: ${:.2} - ${:.2} (Points) = ${:.2} (Cash)",
            amount, discount, final_amount
        ));

        // 额度检查
        if user.balance + final_amount > user.credit_limit {
            return Err(PaymentError::InsufficientCredit);
        }

        let earned = points_earned(final_amount, multiplier);
        log.info(format!(
            "[Rewards] Merchant: {} (x{}). Points Earned: floor({:.2})*{} = {}.",
            merchant, multiplier, final_amount, multiplier, earned
        ));
        let net_point_change = earned - points_redeemed;

        // 写入 Pending 交易。余额与积分此时不动，清算时落账。
        log.sql(format!(
            "INSERT INTO transactions (user_id, amount, status, point_change, merchant, source_transaction_id) \
             VALUES ({}, {:.2}, 'Pending', {}, '{}', NULL) RETURNING transaction_id;",
            user_id, final_amount, net_point_change, merchant
        ));
        let new_tx_id = TransactionRepository::create_in_tx(
            &mut *tx,
            user_id,
            final_amount,
            TxStatus::Pending,
            net_point_change,
            merchant,
            None,
        )
        .await?;

        log.info(format!(
            "Transaction {} created (Pending). Settlement in {}s.",
            new_tx_id,
            self.scheduler.delay().as_secs()
        ));

        Ok(TxResult {
            transaction_id: new_tx_id,
            final_amount,
            points_earned: earned,
            points_redeemed,
            logs: Vec::new(),
        })
    }

    // ==================== 清算 ====================

    /// 清算一笔交易（由调度器在延迟到期后调用）
    ///
    /// 在全新的不可取消上下文中运行；任何失败只记录日志，
    /// 行保持 Pending，不影响任何已返回的响应。
    #[instrument(skip(self))]
    pub async fn settle(&self, transaction_id: i64) {
        let mut log = TxLogger::new();
        let mut tx = match self.begin_logged(&mut log).await {
            Ok(tx) => tx,
            Err(e) => {
                error!(transaction_id, error = %e, "清算开启事务失败");
                return;
            }
        };

        let result = self.settle_in_tx(&mut tx, &mut log, transaction_id).await;
        let (result, logs) = Self::commit_or_rollback(tx, log, result).await;

        if let Err(e) = result {
            error!(transaction_id, error = %e, "清算失败，交易保持 Pending");
            for line in &logs {
                debug!("{}", line);
            }
        }
    }

    async fn settle_in_tx(
        &self,
        tx: &mut PgTx,
        log: &mut TxLogger,
        transaction_id: i64,
    ) -> Result<()> {
        log.raw(format!(
            "\n> Processing: SETTLE Transaction: {}\n",
            transaction_id
        ));

        // 锁定交易行；不存在不视为错误
        let t = match TransactionRepository::get_for_update_in_tx(&mut *tx, transaction_id).await? {
            Some(t) => t,
            None => {
                log.info("Transaction not found during settlement.");
                return Ok(());
            }
        };

        // 状态守卫：撤销可能先行提交
        if t.status != TxStatus::Pending {
            log.info(format!(
                "Transaction {} is '{}', skipping settlement.",
                transaction_id, t.status
            ));
            return Ok(());
        }

        // 锁定用户行并重检额度
        let user = UserRepository::get_user_for_update_in_tx(&mut *tx, t.user_id)
            .await?
            .ok_or(PaymentError::UserNotFound(t.user_id))?;

        if user.balance + t.amount > user.credit_limit {
            log.info(format!(
                "Insufficient credit (Bal: {:.2} + Amt: {:.2} > Lim: {:.2}). Voiding.",
                user.balance, t.amount, user.credit_limit
            ));
            TransactionRepository::update_status_in_tx(&mut *tx, transaction_id, TxStatus::Voided)
                .await?;
            // 提交 Voided 状态，不作为错误上抛
            return Ok(());
        }

        // 授权时只存了净变动，这里由 (amount, merchant, point_change) 反推
        let multiplier = self.rates.multiplier_or_default(&t.merchant);
        let earned = points_earned(t.amount, multiplier);
        let redeemed = earned - t.point_change;

        log.sql(format!(
            "UPDATE users SET balance += {:.2}, points += {}",
            t.amount, t.point_change
        ));
        UserRepository::adjust_balance_and_points_in_tx(
            &mut *tx,
            t.user_id,
            t.amount,
            t.point_change,
        )
        .await?;

        if redeemed > 0 {
            log.sql(format!("INSERT INTO points (Redeemed: -{})", redeemed));
            PointsRepository::append_in_tx(
                &mut *tx,
                t.user_id,
                t.transaction_id,
                -redeemed,
                "Redeemed",
            )
            .await?;
        }
        if earned > 0 {
            let reason = format!("Earned ({} x{})", t.merchant, multiplier);
            log.sql(format!("INSERT INTO points (Earned: +{})", earned));
            PointsRepository::append_in_tx(&mut *tx, t.user_id, t.transaction_id, earned, &reason)
                .await?;
        }

        log.sql("UPDATE transactions SET status='Paid'");
        TransactionRepository::update_status_in_tx(&mut *tx, transaction_id, TxStatus::Paid)
            .await?;

        log.info("Settlement successful.");
        Ok(())
    }

    // ==================== 撤销 ====================

    /// 撤销一笔交易
    #[instrument(skip(self))]
    pub async fn void(
        &self,
        user_id: i32,
        target_transaction_id: i64,
    ) -> std::result::Result<VoidResult, FailedOperation> {
        let mut log = TxLogger::new();
        let mut tx = match self.begin_logged(&mut log).await {
            Ok(tx) => tx,
            Err(e) => return Err(FailedOperation::new(e, log.into_logs())),
        };

        let result = self
            .void_in_tx(&mut tx, &mut log, user_id, target_transaction_id)
            .await;
        let (result, logs) = Self::commit_or_rollback(tx, log, result).await;

        match result {
            Ok(mut res) => {
                res.logs = logs;
                Ok(res)
            }
            Err(error) => Err(FailedOperation::new(error, logs)),
        }
    }

    async fn void_in_tx(
        &self,
        tx: &mut PgTx,
        log: &mut TxLogger,
        user_id: i32,
        target_transaction_id: i64,
    ) -> Result<VoidResult> {
        log.raw(format!(
            "\n> Processing: VOID, Target Transaction: {}\n",
            target_transaction_id
        ));

        let t = TransactionRepository::get_for_update_in_tx(&mut *tx, target_transaction_id)
            .await?
            .ok_or(PaymentError::TxNotFound(target_transaction_id))?;

        if t.user_id != user_id {
            return Err(PaymentError::TxForbidden);
        }

        match t.status {
            TxStatus::Pending => {
                // 资金尚未落账，改状态即可
                log.info("Voiding PENDING transaction. No balance/points reverted.");
                TransactionRepository::update_status_in_tx(
                    &mut *tx,
                    target_transaction_id,
                    TxStatus::Voided,
                )
                .await?;

                Ok(VoidResult {
                    success: true,
                    voided_amount: Decimal::ZERO,
                    restored_points: 0,
                    logs: Vec::new(),
                })
            }
            TxStatus::Paid => {
                log.sql(format!(
                    "UPDATE transactions SET status='Voided' WHERE transaction_id={};",
                    target_transaction_id
                ));
                TransactionRepository::update_status_in_tx(
                    &mut *tx,
                    target_transaction_id,
                    TxStatus::Voided,
                )
                .await?;

                let restored_points = -t.point_change;
                log.info(format!("Reverting Balance: -${:.2}", t.amount));
                if restored_points != 0 {
                    log.info(format!("Restoring Points: {}", restored_points));
                }
                UserRepository::adjust_balance_and_points_in_tx(
                    &mut *tx,
                    user_id,
                    -t.amount,
                    restored_points,
                )
                .await?;

                if restored_points != 0 {
                    PointsRepository::append_in_tx(
                        &mut *tx,
                        user_id,
                        target_transaction_id,
                        restored_points,
                        "Void Reversal",
                    )
                    .await?;
                }

                Ok(VoidResult {
                    success: true,
                    voided_amount: t.amount,
                    restored_points,
                    logs: Vec::new(),
                })
            }
            status => Err(PaymentError::TxInvalidStatus {
                action: "void",
                status,
            }),
        }
    }

    // ==================== 退款 ====================

    /// 退款一笔已清算交易
    ///
    /// 父交易置 Refunded，并生成负金额、负积分的退款子行
    /// （`source_transaction_id` 指向父交易）。
    #[instrument(skip(self))]
    pub async fn refund(
        &self,
        user_id: i32,
        target_transaction_id: i64,
    ) -> std::result::Result<RefundResult, FailedOperation> {
        let mut log = TxLogger::new();
        let mut tx = match self.begin_logged(&mut log).await {
            Ok(tx) => tx,
            Err(e) => return Err(FailedOperation::new(e, log.into_logs())),
        };

        let result = self
            .refund_in_tx(&mut tx, &mut log, user_id, target_transaction_id)
            .await;
        let (result, logs) = Self::commit_or_rollback(tx, log, result).await;

        match result {
            Ok(mut res) => {
                res.logs = logs;
                Ok(res)
            }
            Err(error) => Err(FailedOperation::new(error, logs)),
        }
    }

    async fn refund_in_tx(
        &self,
        tx: &mut PgTx,
        log: &mut TxLogger,
        user_id: i32,
        target_transaction_id: i64,
    ) -> Result<RefundResult> {
        log.raw(format!(
            "\n> Processing: REFUND, Target Transaction: {}\n",
            target_transaction_id
        ));

        let t = TransactionRepository::get_for_update_in_tx(&mut *tx, target_transaction_id)
            .await?
            .ok_or(PaymentError::TxNotFound(target_transaction_id))?;

        if t.user_id != user_id {
            return Err(PaymentError::TxForbidden);
        }
        if t.status != TxStatus::Paid {
            return Err(PaymentError::TxInvalidStatus {
                action: "refund",
                status: t.status,
            });
        }

        // 退款要收回原交易净赚的积分，用户必须仍持有它们
        let user = UserRepository::get_user_for_update_in_tx(&mut *tx, user_id)
            .await?
            .ok_or(PaymentError::UserNotFound(user_id))?;
        if user.current_points < t.point_change {
            return Err(PaymentError::InsufficientPoints);
        }

        TransactionRepository::update_status_in_tx(
            &mut *tx,
            target_transaction_id,
            TxStatus::Refunded,
        )
        .await?;

        let refund_amount = -t.amount;
        let refund_points = -t.point_change;

        log.sql(format!(
            "INSERT INTO transactions (user_id, amount, status, point_change, merchant, source_transaction_id) \
             VALUES ({}, {:.2}, 'Refunded', {}, '{}', {}) RETURNING transaction_id;",
            user_id, refund_amount, refund_points, t.merchant, target_transaction_id
        ));
        let refund_tx_id = TransactionRepository::create_in_tx(
            &mut *tx,
            user_id,
            refund_amount,
            TxStatus::Refunded,
            refund_points,
            &t.merchant,
            Some(target_transaction_id),
        )
        .await?;

        UserRepository::adjust_balance_and_points_in_tx(
            &mut *tx,
            user_id,
            refund_amount,
            refund_points,
        )
        .await?;

        PointsRepository::append_in_tx(&mut *tx, user_id, refund_tx_id, refund_points, "Refund")
            .await?;

        Ok(RefundResult {
            refund_transaction_id: refund_tx_id,
            logs: Vec::new(),
        })
    }
}

// ==================== 积分运算 ====================

struct Redemption {
    discount: Decimal,
    points_redeemed: i32,
}

/// 计算积分抵扣
///
/// 100 积分抵 $1，折扣为整数美元：
/// `max_discount = min(⌊points/100⌋, ⌊amount⌋)`，为 0 时不抵扣。
fn compute_redemption(current_points: i32, amount: Decimal) -> Redemption {
    let by_points = i64::from(current_points / 100);
    let by_amount = amount.floor().to_i64().unwrap_or(0);
    let max_discount = by_points.min(by_amount).max(0);

    Redemption {
        discount: Decimal::from(max_discount),
        points_redeemed: (max_discount * 100) as i32,
    }
}

/// 赚取积分：实付金额乘商户倍率后向下取整
fn points_earned(final_amount: Decimal, multiplier: Decimal) -> i32 {
    (final_amount * multiplier).floor().to_i32().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redemption_floor() {
        // 350 积分、$2.75：折扣 = min(3, 2) = 2，抵扣 200 积分
        let r = compute_redemption(350, Decimal::new(275, 2));
        assert_eq!(r.discount, Decimal::from(2));
        assert_eq!(r.points_redeemed, 200);
    }

    #[test]
    fn test_redemption_limited_by_points() {
        // 150 积分、$100：折扣 = min(1, 100) = 1
        let r = compute_redemption(150, Decimal::from(100));
        assert_eq!(r.discount, Decimal::ONE);
        assert_eq!(r.points_redeemed, 100);
    }

    #[test]
    fn test_redemption_zero_when_amount_below_one() {
        // 金额不足 $1 时折扣为 0，不发生抵扣
        let r = compute_redemption(500, Decimal::new(50, 2));
        assert_eq!(r.discount, Decimal::ZERO);
        assert_eq!(r.points_redeemed, 0);
    }

    #[test]
    fn test_points_earned_floor() {
        assert_eq!(points_earned(Decimal::from(100), Decimal::from(2)), 200);
        // $0.75 × 1 = 0.75 → 0
        assert_eq!(points_earned(Decimal::new(75, 2), Decimal::ONE), 0);
        // $2.50 × 1.5 = 3.75 → 3
        assert_eq!(
            points_earned(Decimal::new(250, 2), Decimal::new(15, 1)),
            3
        );
    }

    #[test]
    fn test_settle_recomputes_redeemed_from_net() {
        // 清算用 (amount, merchant, point_change) 反推两笔流水：
        // $98 × 2 = 196 赚取；净变动 -4 ⇒ 抵扣 200
        let earned = points_earned(Decimal::from(98), Decimal::from(2));
        let net_point_change = -4;
        assert_eq!(earned, 196);
        assert_eq!(earned - net_point_change, 200);
    }
}
