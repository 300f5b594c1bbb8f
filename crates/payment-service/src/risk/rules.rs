//! 风控规则配置

use rust_decimal::Decimal;
use std::time::Duration;

use crate::repository::LookbackWindow;

/// 压测模式下视同无限的阈值
const UNLIMITED: i64 = 1 << 60;

/// 风控规则
///
/// 四项检查的阈值与窗口。压测模式通过单个布尔一次性放宽全部限制：
/// 频率与退款阈值拉到视同无限，重复检测窗口缩到 1 秒。
#[derive(Debug, Clone)]
pub struct RiskRules {
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub velocity_limit: i64,
    pub velocity_window: Duration,
    pub duplicate_window: LookbackWindow,
    pub refund_limit: i64,
    pub refund_window: LookbackWindow,
}

impl RiskRules {
    pub fn new(loadtest: bool) -> Self {
        if loadtest {
            return Self {
                min_amount: Decimal::ONE,
                max_amount: Decimal::from(10_000),
                velocity_limit: UNLIMITED,
                velocity_window: Duration::from_secs(1),
                duplicate_window: LookbackWindow::seconds(1),
                refund_limit: UNLIMITED,
                refund_window: LookbackWindow::hours(24),
            };
        }

        Self {
            min_amount: Decimal::ONE,
            max_amount: Decimal::from(10_000),
            velocity_limit: 3,
            velocity_window: Duration::from_secs(60),
            duplicate_window: LookbackWindow::minutes(5),
            refund_limit: 3,
            refund_window: LookbackWindow::hours(24),
        }
    }
}

impl Default for RiskRules {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = RiskRules::default();
        assert_eq!(rules.min_amount, Decimal::ONE);
        assert_eq!(rules.max_amount, Decimal::from(10_000));
        assert_eq!(rules.velocity_limit, 3);
        assert_eq!(rules.velocity_window, Duration::from_secs(60));
        assert_eq!(rules.duplicate_window, LookbackWindow::minutes(5));
        assert_eq!(rules.refund_limit, 3);
        assert_eq!(rules.refund_window, LookbackWindow::hours(24));
    }

    #[test]
    fn test_loadtest_flips_all_four() {
        let rules = RiskRules::new(true);
        // 金额上下限不变
        assert_eq!(rules.min_amount, Decimal::ONE);
        assert_eq!(rules.max_amount, Decimal::from(10_000));
        // 频率与退款视同无限，重复窗口收缩到 1 秒
        assert!(rules.velocity_limit > 1_000_000_000);
        assert!(rules.refund_limit > 1_000_000_000);
        assert_eq!(rules.duplicate_window, LookbackWindow::seconds(1));
    }
}
