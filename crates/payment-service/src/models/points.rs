//! 积分流水模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 积分流水记录
///
/// 只追加、不修改。某用户全部 `change_amount` 之和必须等于其
/// `current_points`（冗余保留用于审计，不在热路径查询）。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PointsLedgerEntry {
    pub id: i64,
    pub user_id: i32,
    pub transaction_id: i64,
    pub change_amount: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
