//! HTTP 处理器
//!
//! 五个业务端点加健康检查的薄适配层：解析与校验请求、调用服务层、
//! 映射结果与错误。核心语义都在服务层，这里不做业务判断。
//!
//! 写操作统一带 10 秒的请求预算；超时请求被取消，
//! 进行中的数据库事务随 Drop 回滚释放行锁。

use std::future::Future;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::error::{FailedOperation, PaymentError, Result};
use crate::models::{Transaction, User};
use crate::service::{RefundResult, TxResult, VoidResult};
use crate::state::AppState;

/// 每个写操作的请求预算
const REQUEST_BUDGET: Duration = Duration::from_secs(10);

/// 支付请求体
#[derive(Debug, Deserialize, Validate)]
pub struct PayRequest {
    #[validate(range(min = 1))]
    pub user_id: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[validate(length(min = 1))]
    pub merchant: String,
    #[serde(default)]
    pub use_points: bool,
}

/// 撤销 / 退款请求体
#[derive(Debug, Deserialize, Validate)]
pub struct ActionRequest {
    #[validate(range(min = 1))]
    pub user_id: i32,
    #[validate(range(min = 1))]
    pub target_transaction_id: i64,
}

/// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
    }))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    let user_id = parse_user_id(&id)?;
    let user = state.service.get_user_details(user_id).await?;
    Ok(Json(user))
}

/// GET /api/transactions/{user_id}
///
/// 无记录时返回空数组而非 404
pub async fn get_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Transaction>>> {
    let user_id = parse_user_id(&user_id)?;
    let transactions = state.service.get_transaction_history(user_id).await?;
    Ok(Json(transactions))
}

/// POST /api/transactions/pay
pub async fn pay(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PayRequest>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<TxResult>), FailedOperation> {
    let Json(req) = payload.map_err(|_| FailedOperation::bare(PaymentError::BadJson))?;
    validate_pay(&req).map_err(FailedOperation::bare)?;

    let result = with_deadline(state.service.pay(
        req.user_id,
        req.amount,
        &req.merchant,
        req.use_points,
    ))
    .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// POST /api/transactions/void
pub async fn void(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ActionRequest>, JsonRejection>,
) -> std::result::Result<Json<VoidResult>, FailedOperation> {
    let req = parse_action(payload)?;
    let result =
        with_deadline(state.service.void(req.user_id, req.target_transaction_id)).await?;
    Ok(Json(result))
}

/// POST /api/transactions/refund
pub async fn refund(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ActionRequest>, JsonRejection>,
) -> std::result::Result<Json<RefundResult>, FailedOperation> {
    let req = parse_action(payload)?;
    let result =
        with_deadline(state.service.refund(req.user_id, req.target_transaction_id)).await?;
    Ok(Json(result))
}

// ==================== 私有辅助 ====================

fn parse_user_id(raw: &str) -> Result<i32> {
    match raw.parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(PaymentError::InvalidUserId),
    }
}

fn validate_pay(req: &PayRequest) -> Result<()> {
    req.validate()?;
    // validator 不支持 Decimal 的 range 约束，金额单独校验
    if req.amount <= Decimal::ZERO {
        return Err(PaymentError::ValidationFailed(
            "amount must be positive".to_string(),
        ));
    }
    Ok(())
}

fn parse_action(
    payload: std::result::Result<Json<ActionRequest>, JsonRejection>,
) -> std::result::Result<ActionRequest, FailedOperation> {
    let Json(req) = payload.map_err(|_| FailedOperation::bare(PaymentError::BadJson))?;
    req.validate()
        .map_err(|e| FailedOperation::bare(PaymentError::from(e)))?;
    Ok(req)
}

/// 在请求预算内执行写操作
///
/// 超时即取消：被 Drop 的事务自动回滚并释放锁。
async fn with_deadline<T, F>(fut: F) -> std::result::Result<T, FailedOperation>
where
    F: Future<Output = std::result::Result<T, FailedOperation>>,
{
    match tokio::time::timeout(REQUEST_BUDGET, fut).await {
        Ok(result) => result,
        Err(_) => Err(FailedOperation::bare(PaymentError::Internal(
            "request deadline exceeded".to_string(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        assert!(parse_user_id("1").is_ok());
        assert!(matches!(
            parse_user_id("0"),
            Err(PaymentError::InvalidUserId)
        ));
        assert!(matches!(
            parse_user_id("-3"),
            Err(PaymentError::InvalidUserId)
        ));
        assert!(matches!(
            parse_user_id("abc"),
            Err(PaymentError::InvalidUserId)
        ));
    }

    #[test]
    fn test_pay_request_validation() {
        let valid = PayRequest {
            user_id: 1,
            amount: Decimal::from(50),
            merchant: "Steam".to_string(),
            use_points: false,
        };
        assert!(validate_pay(&valid).is_ok());

        let bad_user = PayRequest {
            user_id: 0,
            ..pay_request(Decimal::from(50))
        };
        assert_eq!(
            validate_pay(&bad_user).unwrap_err().error_code(),
            "VALIDATION_FAILED"
        );

        let bad_amount = pay_request(Decimal::ZERO);
        assert_eq!(
            validate_pay(&bad_amount).unwrap_err().error_code(),
            "VALIDATION_FAILED"
        );

        let empty_merchant = PayRequest {
            merchant: String::new(),
            ..pay_request(Decimal::from(50))
        };
        assert!(validate_pay(&empty_merchant).is_err());
    }

    #[test]
    fn test_pay_request_use_points_defaults_false() {
        let req: PayRequest =
            serde_json::from_str(r#"{"user_id":1,"amount":10.5,"merchant":"7-11"}"#).unwrap();
        assert!(!req.use_points);
        assert_eq!(req.amount, Decimal::new(105, 1));
    }

    fn pay_request(amount: Decimal) -> PayRequest {
        PayRequest {
            user_id: 1,
            amount,
            merchant: "Steam".to_string(),
            use_points: false,
        }
    }
}
