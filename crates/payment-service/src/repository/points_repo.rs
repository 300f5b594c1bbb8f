//! 积分流水仓储
//!
//! 只追加的积分变动记录，支持审计核对。

use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::PointsLedgerEntry;

/// 积分流水仓储
pub struct PointsRepository {
    pool: PgPool,
}

impl PointsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 列出某笔交易关联的积分流水
    pub async fn list_by_transaction(
        &self,
        transaction_id: i64,
    ) -> Result<Vec<PointsLedgerEntry>> {
        let entries = sqlx::query_as::<_, PointsLedgerEntry>(
            r#"
            SELECT id, user_id, transaction_id, change_amount, reason, created_at
            FROM points
            WHERE transaction_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// 用户全部流水之和
    ///
    /// 审计用途：应恒等于该用户的 `current_points`。不在热路径查询。
    pub async fn sum_for_user(&self, user_id: i32) -> Result<i64> {
        let sum = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(change_amount), 0)
            FROM points
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum)
    }

    // ==================== 事务操作 ====================

    /// 在事务中追加一条流水
    pub async fn append_in_tx(
        tx: &mut PgConnection,
        user_id: i32,
        transaction_id: i64,
        change_amount: i32,
        reason: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO points (user_id, transaction_id, change_amount, reason)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(transaction_id)
        .bind(change_amount)
        .bind(reason)
        .execute(tx)
        .await?;

        Ok(())
    }
}
