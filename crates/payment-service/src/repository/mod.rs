//! 数据库仓储层
//!
//! 提供所有实体的数据访问接口，封装 SQL 操作细节。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 池化读取为实例方法；事务内操作为关联函数，显式接收 `&mut PgConnection`
//! - 行级锁（`FOR UPDATE`）由需要互斥的读取显式声明
//! - 事务控制由调用方（服务层）决定
//! - 时间窗口一律换算为数据库侧 `NOW()` 的区间，避免调用方与存储之间的时钟偏差

mod points_repo;
mod transaction_repo;
mod user_repo;

pub use points_repo::PointsRepository;
pub use transaction_repo::TransactionRepository;
pub use user_repo::UserRepository;

use std::time::Duration;

/// 回溯时间窗口
///
/// 以抽象时长描述「最近 N 分钟/小时」一类的查询窗口，由仓储翻译为
/// `NOW() - make_interval(secs => …)` 的存储侧时间运算。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookbackWindow(Duration);

impl LookbackWindow {
    pub fn seconds(n: u64) -> Self {
        Self(Duration::from_secs(n))
    }

    pub fn minutes(n: u64) -> Self {
        Self(Duration::from_secs(n * 60))
    }

    pub fn hours(n: u64) -> Self {
        Self(Duration::from_secs(n * 3600))
    }

    /// 窗口长度（秒），用于绑定到 `make_interval(secs => $n)`
    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_conversions() {
        assert_eq!(LookbackWindow::seconds(90).as_secs_f64(), 90.0);
        assert_eq!(LookbackWindow::minutes(5), LookbackWindow::seconds(300));
        assert_eq!(LookbackWindow::hours(24), LookbackWindow::seconds(86400));
    }
}
