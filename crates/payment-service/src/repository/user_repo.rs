//! 用户账户仓储
//!
//! 提供用户账户的数据访问，支持事务和行级锁

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::User;

/// 用户账户仓储
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 获取用户（无锁读取）
    pub async fn get_user(&self, user_id: i32) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, balance, current_points, credit_limit
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    // ==================== 事务操作 ====================

    /// 在事务中获取用户（带行级锁）
    ///
    /// `FOR UPDATE` 锁定该行直到事务结束，同一用户的并发写路径在此串行化。
    pub async fn get_user_for_update_in_tx(
        tx: &mut PgConnection,
        user_id: i32,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, balance, current_points, credit_limit
            FROM users
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(tx)
        .await?;

        Ok(user)
    }

    /// 在事务中对余额与积分做增量调整
    ///
    /// 使用增量更新而非覆盖，返回更新后的账户。
    pub async fn adjust_balance_and_points_in_tx(
        tx: &mut PgConnection,
        user_id: i32,
        balance_change: Decimal,
        point_change: i32,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET balance = balance + $2, current_points = current_points + $3
            WHERE user_id = $1
            RETURNING user_id, username, balance, current_points, credit_limit
            "#,
        )
        .bind(user_id)
        .bind(balance_change)
        .bind(point_change)
        .fetch_one(tx)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_repository_methods_exist() {
        // 类型检查：确保方法签名正确
        // 实际测试需要配合测试数据库，见 tests/payment_flow_test.rs
    }
}
