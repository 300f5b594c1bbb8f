//! 信用卡交易核心服务
//!
//! 模拟信用卡服务的事务处理核心：客户端对白名单商户发起支付，核心完成
//! 风控评估、积分抵扣、额度预留，落库一笔 Pending 交易，并在固定延迟后
//! 异步清算。撤销与退款按状态机约束反向冲正金额与积分。
//!
//! ## 核心流程
//!
//! 支付采用两阶段「授权-清算」：授权阶段锁定用户行、完成额度检查后只写入
//! Pending 交易，不动余额与积分；清算任务在延迟到期后重新校验额度并落账，
//! 失败则将交易置为 Voided。所有用户写路径都在持有行级锁的数据库事务内
//! 串行化。
//!
//! ## 模块结构
//!
//! - `models`: 领域模型（用户、交易、积分流水、商户倍率表）
//! - `error`: 错误分类与 HTTP 映射
//! - `txlog`: 随请求返回的操作日志
//! - `repository`: 数据库仓储层（行级锁、窗口计数）
//! - `risk`: 风控引擎（限额、频率、退款滥用、重复交易）
//! - `service`: 交易服务（状态机与编排）
//! - `settlement`: 延迟清算调度器
//! - `handlers` / `routes` / `state`: HTTP 适配层

pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod risk;
pub mod routes;
pub mod service;
pub mod settlement;
pub mod state;
pub mod txlog;

pub use error::{FailedOperation, PaymentError, Result};
pub use models::*;
pub use risk::{RiskEngine, RiskRules};
pub use service::TransactionService;
pub use settlement::SettlementScheduler;
