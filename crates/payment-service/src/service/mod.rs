//! 服务层
//!
//! 交易状态机与编排逻辑，协调风控、仓储与清算调度。
//!
//! ## 模块结构
//!
//! - `dto`: 操作结果的数据传输对象
//! - `transaction_service`: 支付 / 清算 / 撤销 / 退款 与查询

pub mod dto;
mod transaction_service;

pub use dto::{RefundResult, TxResult, VoidResult};
pub use transaction_service::TransactionService;
