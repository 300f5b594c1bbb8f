//! 交易服务错误类型
//!
//! 定义完整的错误分类：错误码、HTTP 状态码与对外响应的映射。
//! 支付/撤销/退款的失败响应会附带本次请求捕获的操作日志
//! （见 [`FailedOperation`]）。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::models::TxStatus;

/// 交易服务错误类型
#[derive(Debug, Error)]
pub enum PaymentError {
    // === 请求格式错误 ===
    #[error("Invalid user ID format")]
    InvalidUserId,

    #[error("Invalid JSON body")]
    BadJson,

    #[error("Validation failed")]
    ValidationFailed(String),

    #[error("Invalid merchant")]
    InvalidMerchant,

    // === 风控拒绝 ===
    #[error("Transaction amount exceeds maximum limit")]
    RiskAmountTooHigh,

    #[error("Transaction amount is too low")]
    RiskAmountTooLow,

    #[error("Too many transactions in short period")]
    RiskVelocityLimit,

    #[error("Account temporarily frozen due to excessive refunds")]
    RiskRefundAbuse,

    #[error("Potential duplicate transaction detected")]
    RiskDuplicate,

    // === 查找与归属 ===
    #[error("User not found")]
    UserNotFound(i32),

    #[error("Transaction not found")]
    TxNotFound(i64),

    #[error("Unauthorized access")]
    TxForbidden,

    // === 状态与约束冲突 ===
    #[error("Cannot {action} transaction with status: {status}")]
    TxInvalidStatus {
        action: &'static str,
        status: TxStatus,
    },

    #[error("Insufficient credit")]
    InsufficientCredit,

    #[error("Insufficient points to rollback transaction")]
    InsufficientPoints,

    // === 系统错误 ===
    #[error("Risk system temporarily unavailable")]
    CounterUnavailable(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 交易服务 Result 类型别名
pub type Result<T> = std::result::Result<T, PaymentError>;

impl PaymentError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidUserId
            | Self::BadJson
            | Self::ValidationFailed(_)
            | Self::InvalidMerchant
            | Self::RiskAmountTooHigh
            | Self::RiskAmountTooLow => StatusCode::BAD_REQUEST,

            Self::UserNotFound(_) | Self::TxNotFound(_) => StatusCode::NOT_FOUND,

            Self::TxForbidden | Self::RiskRefundAbuse => StatusCode::FORBIDDEN,

            Self::RiskDuplicate
            | Self::TxInvalidStatus { .. }
            | Self::InsufficientCredit
            | Self::InsufficientPoints => StatusCode::CONFLICT,

            Self::RiskVelocityLimit => StatusCode::TOO_MANY_REQUESTS,

            Self::CounterUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,

            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（API 响应的 code 字段）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidUserId => "INVALID_USER_ID",
            Self::BadJson => "BAD_JSON",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::InvalidMerchant => "INVALID_MERCHANT",
            Self::RiskAmountTooHigh => "RISK_AMOUNT_TOO_HIGH",
            Self::RiskAmountTooLow => "RISK_AMOUNT_TOO_LOW",
            Self::RiskVelocityLimit => "RISK_VELOCITY_LIMIT",
            Self::RiskRefundAbuse => "RISK_REFUND_ABUSE",
            Self::RiskDuplicate => "RISK_DUPLICATE",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::TxNotFound(_) => "TX_NOT_FOUND",
            Self::TxForbidden => "TX_FORBIDDEN",
            Self::TxInvalidStatus { .. } => "TX_INVALID_STATUS",
            Self::InsufficientCredit => "INSUFFICIENT_CREDIT",
            Self::InsufficientPoints => "INSUFFICIENT_POINTS",
            Self::CounterUnavailable(_) => "REDIS_UNAVAILABLE",
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 生成对外的错误消息
    ///
    /// 系统级错误只返回通用提示，详细信息仅记录日志，防止信息泄露。
    fn client_message(&self) -> String {
        match self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "Internal Server Error".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "Internal Server Error".to_string()
            }
            Self::CounterUnavailable(e) => {
                tracing::error!(error = %e, "Redis 计数器不可用");
                self.to_string()
            }
            Self::ValidationFailed(detail) => {
                tracing::debug!(detail = %detail, "请求参数校验失败");
                self.to_string()
            }
            Self::UserNotFound(user_id) => {
                tracing::debug!(user_id, "用户不存在");
                self.to_string()
            }
            Self::TxNotFound(transaction_id) => {
                tracing::debug!(transaction_id, "交易不存在");
                self.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// 错误响应包体：`{code, error, logs?}`
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    logs: Vec<String>,
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            code: self.error_code(),
            error: self.client_message(),
            logs: Vec::new(),
        };
        (status, axum::Json(body)).into_response()
    }
}

/// 携带操作日志的失败结果
///
/// 支付/撤销/退款操作无论成败都要把操作日志原样交还给调用方，
/// 失败路径用此类型把错误与日志一并送出。
#[derive(Debug)]
pub struct FailedOperation {
    pub error: PaymentError,
    pub logs: Vec<String>,
}

impl FailedOperation {
    pub fn new(error: PaymentError, logs: Vec<String>) -> Self {
        Self { error, logs }
    }

    /// 尚未进入事务阶段的失败，没有操作日志
    pub fn bare(error: PaymentError) -> Self {
        Self {
            error,
            logs: Vec::new(),
        }
    }
}

impl IntoResponse for FailedOperation {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorBody {
            code: self.error.error_code(),
            error: self.error.client_message(),
            logs: self.logs,
        };
        (status, axum::Json(body)).into_response()
    }
}

/// 从基础设施错误转换
///
/// Redis 故障映射为可重试的服务不可用，而不是用户侧拒绝；
/// 数据库错误保持原样以便统一归入 INTERNAL_ERROR。
impl From<payment_shared::error::SharedError> for PaymentError {
    fn from(err: payment_shared::error::SharedError) -> Self {
        use payment_shared::error::SharedError;
        match err {
            SharedError::Database(e) => Self::Database(e),
            SharedError::Redis(e) => Self::CounterUnavailable(e.to_string()),
            SharedError::Internal(msg) => Self::Internal(msg),
        }
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for PaymentError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::ValidationFailed(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    /// 构造全部错误变体及其期望的 (StatusCode, error_code) 映射。
    /// 表驱动方式避免逐个变体写重复断言，新增变体只需在一处维护。
    fn all_error_variants() -> Vec<(PaymentError, StatusCode, &'static str)> {
        vec![
            (PaymentError::InvalidUserId, StatusCode::BAD_REQUEST, "INVALID_USER_ID"),
            (PaymentError::BadJson, StatusCode::BAD_REQUEST, "BAD_JSON"),
            (
                PaymentError::ValidationFailed("amount".into()),
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
            ),
            (PaymentError::InvalidMerchant, StatusCode::BAD_REQUEST, "INVALID_MERCHANT"),
            (
                PaymentError::RiskAmountTooHigh,
                StatusCode::BAD_REQUEST,
                "RISK_AMOUNT_TOO_HIGH",
            ),
            (
                PaymentError::RiskAmountTooLow,
                StatusCode::BAD_REQUEST,
                "RISK_AMOUNT_TOO_LOW",
            ),
            (PaymentError::UserNotFound(1), StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            (PaymentError::TxNotFound(9), StatusCode::NOT_FOUND, "TX_NOT_FOUND"),
            (PaymentError::TxForbidden, StatusCode::FORBIDDEN, "TX_FORBIDDEN"),
            (PaymentError::RiskRefundAbuse, StatusCode::FORBIDDEN, "RISK_REFUND_ABUSE"),
            (PaymentError::RiskDuplicate, StatusCode::CONFLICT, "RISK_DUPLICATE"),
            (
                PaymentError::TxInvalidStatus {
                    action: "void",
                    status: TxStatus::Refunded,
                },
                StatusCode::CONFLICT,
                "TX_INVALID_STATUS",
            ),
            (
                PaymentError::InsufficientCredit,
                StatusCode::CONFLICT,
                "INSUFFICIENT_CREDIT",
            ),
            (
                PaymentError::InsufficientPoints,
                StatusCode::CONFLICT,
                "INSUFFICIENT_POINTS",
            ),
            (
                PaymentError::RiskVelocityLimit,
                StatusCode::TOO_MANY_REQUESTS,
                "RISK_VELOCITY_LIMIT",
            ),
            (
                PaymentError::CounterUnavailable("connection refused".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "REDIS_UNAVAILABLE",
            ),
            (
                PaymentError::Internal("unexpected state".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ]
    }

    /// 状态码与错误码是 API 契约的一部分，客户端据此做条件分支，
    /// 任何变更都是破坏性变更，必须逐一锁定。
    #[test]
    fn test_all_variants_status_and_code() {
        for (error, expected_status, expected_code) in all_error_variants() {
            assert_eq!(
                error.status_code(),
                expected_status,
                "状态码不匹配: {expected_code}"
            );
            assert_eq!(error.error_code(), expected_code);
        }
    }

    #[test]
    fn test_invalid_status_message_names_action() {
        let err = PaymentError::TxInvalidStatus {
            action: "refund",
            status: TxStatus::Voided,
        };
        assert_eq!(
            err.to_string(),
            "Cannot refund transaction with status: Voided"
        );
    }

    #[test]
    fn test_shared_error_conversion() {
        use payment_shared::error::SharedError;

        let err: PaymentError = SharedError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, PaymentError::Database(_)));

        let err: PaymentError = SharedError::Internal("boom".into()).into();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_validation_errors_conversion() {
        use validator::{ValidationError, ValidationErrors};

        let mut errors = ValidationErrors::new();
        errors.add("user_id", ValidationError::new("range"));

        let err: PaymentError = errors.into();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        // 对外消息保持通用，字段细节只进日志
        assert_eq!(err.to_string(), "Validation failed");
    }

    /// 错误响应体是 `{code, error, logs?}`：logs 仅在非空时出现。
    #[tokio::test]
    async fn test_into_response_envelope() {
        let response = PaymentError::InsufficientCredit.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "INSUFFICIENT_CREDIT");
        assert_eq!(body["error"], "Insufficient credit");
        assert!(body.get("logs").is_none());
    }

    #[tokio::test]
    async fn test_failed_operation_carries_logs() {
        let failed = FailedOperation::new(
            PaymentError::RiskVelocityLimit,
            vec!["[RISK] FAIL: Velocity limit reached".to_string()],
        );
        let response = failed.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "RISK_VELOCITY_LIMIT");
        assert_eq!(body["logs"].as_array().unwrap().len(), 1);
    }

    /// 系统级错误不得向客户端泄露内部细节
    #[tokio::test]
    async fn test_system_errors_hide_internal_details() {
        let err = PaymentError::Internal("stack trace at service.rs:42".into());
        let response = err.into_response();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        let message = body["error"].as_str().unwrap();
        assert_eq!(message, "Internal Server Error");
        assert!(!message.contains("service.rs"));
    }
}
