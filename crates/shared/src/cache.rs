//! Redis 计数器管理模块
//!
//! 提供 Redis 连接管理和风控所需的原子计数操作。

use crate::config::RedisConfig;
use crate::error::{Result, SharedError};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{info, warn};

/// Redis 客户端封装
#[derive(Clone)]
pub struct Cache {
    client: Client,
}

impl Cache {
    /// 创建 Redis 客户端
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url().as_str())?;
        info!("Redis client created");
        Ok(Self { client })
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(SharedError::from)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(SharedError::from)
    }

    /// 原子递增并在窗口首次递增时设置过期
    ///
    /// 契约：INCR 原子递增；当计数器从零起步（递增后为 1）时设置 TTL 等于
    /// `window`，窗口内的后续递增不会续期。返回递增后的值和是否为窗口内
    /// 首次递增。
    ///
    /// EXPIRE 失败只记录告警：计数值本身已写入，宁可让 key 略微长寿，
    /// 也不能把一次成功的递增报告为失败。
    pub async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<(i64, bool)> {
        let mut conn = self.get_conn().await?;
        let value: i64 = conn.incr(key, 1).await?;

        let first_in_window = value == 1;
        if first_in_window {
            if let Err(e) = conn.expire::<_, ()>(key, window.as_secs() as i64).await {
                warn!(key = %key, error = %e, "counter expire failed");
            }
        }

        Ok((value, first_in_window))
    }
}

/// 计数器键生成器
///
/// 所有 key 以用途前缀隔离，避免与其他系统共用实例时冲突。
pub struct CacheKey;

impl CacheKey {
    pub fn velocity(user_id: i32) -> String {
        format!("risk:velocity:user:{}", user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_generation() {
        assert_eq!(CacheKey::velocity(123), "risk:velocity:user:123");
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_incr_with_expiry_sets_ttl_once() {
        let cache = Cache::new(&RedisConfig::default()).unwrap();
        let key = "risk:velocity:user:999999";

        let (v1, first1) = cache
            .incr_with_expiry(key, Duration::from_secs(60))
            .await
            .unwrap();
        let (v2, first2) = cache
            .incr_with_expiry(key, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(v2, v1 + 1);
        assert!(first1);
        assert!(!first2);
    }
}
