//! 交易模型与状态机

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 交易状态
///
/// 状态机：
///
/// ```text
///        (创建)               清算成功
///   ∅ ────────▶ Pending ──────────────▶ Paid ─── 退款 ──▶ Refunded
///                  │                     │
///                  │ 撤销 / 清算额度不足  │ 撤销
///                  ▼                     ▼
///               Voided                Voided
/// ```
///
/// `Voided` 与 `Refunded` 为终态，任何后续变更都会被状态守卫拒绝。
/// 退款会额外生成一笔负金额的子交易，父子两行的状态均为 `Refunded`，
/// 子行以非空的 `source_transaction_id` 区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum TxStatus {
    Pending,
    Paid,
    Voided,
    Refunded,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
            Self::Voided => "Voided",
            Self::Refunded => "Refunded",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 交易记录
///
/// `transaction_id` 由数据库生成（INSERT … RETURNING），调用方不得预先计算。
/// `amount` 带符号：消费为正，退款子行为负。`point_change` 为授权时的
/// 净积分变动（赚取 − 抵扣）。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub transaction_id: i64,
    pub user_id: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: TxStatus,
    pub point_change: i32,
    pub merchant: String,
    /// 仅退款子行非空，指向被退款的父交易
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_transaction_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        // 状态以首字母大写的原值入库和出 JSON
        assert_eq!(
            serde_json::to_string(&TxStatus::Pending).unwrap(),
            "\"Pending\""
        );
        assert_eq!(
            serde_json::from_str::<TxStatus>("\"Refunded\"").unwrap(),
            TxStatus::Refunded
        );
        assert_eq!(TxStatus::Voided.to_string(), "Voided");
    }

    #[test]
    fn test_transaction_json_shape() {
        let tx = Transaction {
            transaction_id: 42,
            user_id: 1,
            amount: Decimal::new(-10000, 2),
            status: TxStatus::Refunded,
            point_change: -300,
            merchant: "Apple Store".to_string(),
            source_transaction_id: Some(41),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["transaction_id"], 42);
        assert_eq!(json["amount"], -100.0);
        assert_eq!(json["status"], "Refunded");
        assert_eq!(json["source_transaction_id"], 41);
    }

    #[test]
    fn test_source_id_omitted_when_absent() {
        let tx = Transaction {
            transaction_id: 1,
            user_id: 1,
            amount: Decimal::from(50),
            status: TxStatus::Pending,
            point_change: 100,
            merchant: "Steam".to_string(),
            source_transaction_id: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&tx).unwrap();
        assert!(json.get("source_transaction_id").is_none());
    }
}
