//! 交易仓储
//!
//! 交易行的创建、锁定、状态更新与历史查询，以及风控所需的窗口计数。

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use super::LookbackWindow;
use crate::error::Result;
use crate::models::{Transaction, TxStatus};

const TX_COLUMNS: &str = "transaction_id, user_id, amount, status, point_change, \
                          merchant, source_transaction_id, created_at";

/// 交易仓储
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 查询用户交易历史，按创建时间倒序
    pub async fn list_by_user(&self, user_id: i32) -> Result<Vec<Transaction>> {
        let txs = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TX_COLUMNS}
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(txs)
    }

    // ==================== 事务操作 ====================

    /// 在事务中创建交易
    ///
    /// `transaction_id` 由数据库 identity 生成并通过 RETURNING 取回，
    /// 调用方不得预先计算。
    pub async fn create_in_tx(
        tx: &mut PgConnection,
        user_id: i32,
        amount: Decimal,
        status: TxStatus,
        point_change: i32,
        merchant: &str,
        source_transaction_id: Option<i64>,
    ) -> Result<i64> {
        let new_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO transactions (user_id, amount, status, point_change, merchant, source_transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING transaction_id
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(status)
        .bind(point_change)
        .bind(merchant)
        .bind(source_transaction_id)
        .fetch_one(tx)
        .await?;

        Ok(new_id)
    }

    /// 在事务中获取交易（带行级锁）
    ///
    /// 撤销与清算竞争同一笔 Pending 交易时在此串行化，
    /// 先提交者决定终态，后来者观察到非 Pending 状态。
    pub async fn get_for_update_in_tx(
        tx: &mut PgConnection,
        transaction_id: i64,
    ) -> Result<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TX_COLUMNS}
            FROM transactions
            WHERE transaction_id = $1
            FOR UPDATE
            "#,
        ))
        .bind(transaction_id)
        .fetch_optional(tx)
        .await?;

        Ok(transaction)
    }

    /// 在事务中更新交易状态
    pub async fn update_status_in_tx(
        tx: &mut PgConnection,
        transaction_id: i64,
        status: TxStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .bind(status)
        .execute(tx)
        .await?;

        Ok(())
    }

    // ==================== 风控窗口计数 ====================
    //
    // 两个计数都在调用方的事务句柄上执行，与后续写入看到一致的快照；
    // 窗口基于存储侧 NOW() 计算。

    /// 统计窗口内该用户状态为 Refunded 的交易数
    pub async fn count_refunds_since_in_tx(
        tx: &mut PgConnection,
        user_id: i32,
        window: LookbackWindow,
    ) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM transactions
            WHERE user_id = $1
              AND status = $2
              AND created_at > NOW() - make_interval(secs => $3)
            "#,
        )
        .bind(user_id)
        .bind(TxStatus::Refunded)
        .bind(window.as_secs_f64())
        .fetch_one(tx)
        .await?;

        Ok(count)
    }

    /// 统计窗口内 (用户, 商户, 金额) 完全相同的交易数
    pub async fn count_duplicates_since_in_tx(
        tx: &mut PgConnection,
        user_id: i32,
        merchant: &str,
        amount: Decimal,
        window: LookbackWindow,
    ) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM transactions
            WHERE user_id = $1
              AND merchant = $2
              AND amount = $3
              AND created_at > NOW() - make_interval(secs => $4)
            "#,
        )
        .bind(user_id)
        .bind(merchant)
        .bind(amount)
        .bind(window.as_secs_f64())
        .fetch_one(tx)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_columns_cover_model() {
        // 列清单要与 Transaction 的 FromRow 字段保持同步
        for field in [
            "transaction_id",
            "user_id",
            "amount",
            "status",
            "point_change",
            "merchant",
            "source_transaction_id",
            "created_at",
        ] {
            assert!(TX_COLUMNS.contains(field), "missing column: {field}");
        }
    }
}
