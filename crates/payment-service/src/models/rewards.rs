//! 商户积分倍率表

use rust_decimal::Decimal;
use std::collections::HashMap;

/// 商户白名单与积分倍率
///
/// 固定只读映射，启动时构造一次后不再变更。不在表中的商户直接拒绝。
#[derive(Debug, Clone)]
pub struct MerchantRates {
    rates: HashMap<&'static str, Decimal>,
}

impl Default for MerchantRates {
    fn default() -> Self {
        let mut rates = HashMap::new();
        rates.insert("7-11", Decimal::ONE);
        rates.insert("Steam", Decimal::from(2));
        rates.insert("Apple Store", Decimal::from(3));
        rates.insert("Amazon", Decimal::new(15, 1));
        Self { rates }
    }
}

impl MerchantRates {
    /// 查询商户倍率，不在白名单返回 None
    pub fn multiplier(&self, merchant: &str) -> Option<Decimal> {
        self.rates.get(merchant).copied()
    }

    /// 查询商户倍率，未知商户回退为 1
    ///
    /// 清算路径使用：历史数据里的商户即使后来被移出白名单，
    /// 落账也不能失败。
    pub fn multiplier_or_default(&self, merchant: &str) -> Decimal {
        self.multiplier(merchant).unwrap_or(Decimal::ONE)
    }
}
