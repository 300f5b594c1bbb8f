//! 统一基础设施错误
//!
//! 数据库与 Redis 层共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 业务语义的错误由服务层自行定义并通过 `From` 转换。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum SharedError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, SharedError>;
