//! 领域模型定义
//!
//! 实体结构与数据库列一一对应（sqlx::FromRow），JSON 字段名与对外契约
//! 保持一致。金额使用 Decimal（NUMERIC），序列化为 JSON 数字。

mod points;
mod rewards;
mod transaction;
mod user;

pub use points::PointsLedgerEntry;
pub use rewards::MerchantRates;
pub use transaction::{Transaction, TxStatus};
pub use user::User;
