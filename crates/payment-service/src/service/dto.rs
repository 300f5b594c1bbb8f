//! 操作结果数据传输对象
//!
//! 对外 JSON 采用 camelCase（与既有前端契约一致）；
//! 操作日志随成功结果一并返回。

use rust_decimal::Decimal;
use serde::Serialize;

/// 支付结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxResult {
    pub transaction_id: i64,
    /// 抵扣后的实付金额
    #[serde(with = "rust_decimal::serde::float")]
    pub final_amount: Decimal,
    pub points_earned: i32,
    pub points_redeemed: i32,
    pub logs: Vec<String>,
}

/// 撤销结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoidResult {
    pub success: bool,
    /// 被冲正的金额；撤销 Pending 交易时为 0（资金尚未落账）
    #[serde(with = "rust_decimal::serde::float")]
    pub voided_amount: Decimal,
    pub restored_points: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
}

/// 退款结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResult {
    pub refund_transaction_id: i64,
    pub logs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_result_camel_case() {
        let result = TxResult {
            transaction_id: 7,
            final_amount: Decimal::new(7525, 2),
            points_earned: 150,
            points_redeemed: 200,
            logs: vec!["[INFO] ok".to_string()],
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["transactionId"], 7);
        assert_eq!(json["finalAmount"], 75.25);
        assert_eq!(json["pointsEarned"], 150);
        assert_eq!(json["pointsRedeemed"], 200);
        assert_eq!(json["logs"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_void_result_omits_empty_logs() {
        let result = VoidResult {
            success: true,
            voided_amount: Decimal::ZERO,
            restored_points: 0,
            logs: Vec::new(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["voidedAmount"], 0.0);
        assert!(json.get("logs").is_none());
    }

    #[test]
    fn test_refund_result_camel_case() {
        let result = RefundResult {
            refund_transaction_id: 99,
            logs: Vec::new(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["refundTransactionId"], 99);
    }
}
