//! 用户账户模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 用户账户
///
/// 不变量：每次已提交操作之后 `balance <= credit_limit` 且
/// `current_points >= 0`。账户的任何变更都必须在持有该行排他锁
/// （`FOR UPDATE`）的数据库事务内进行。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub user_id: i32,
    pub username: String,
    /// 未偿余额（已清算消费的累计），两位小数
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub current_points: i32,
    /// 信用额度，建档时确定
    #[serde(with = "rust_decimal::serde::float")]
    pub credit_limit: Decimal,
}
