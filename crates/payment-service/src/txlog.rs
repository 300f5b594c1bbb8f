//! 操作日志
//!
//! 每个请求持有一份只追加的日志，记录本次操作执行的每个人类可读步骤，
//! 成功与失败都会原样返回给调用方。只存在于请求生命周期内，不落库，
//! 也不跨任务共享。

/// 请求级操作日志
#[derive(Debug, Default)]
pub struct TxLogger {
    logs: Vec<String>,
}

impl TxLogger {
    pub fn new() -> Self {
        Self {
            logs: Vec::with_capacity(64),
        }
    }

    /// 记录一条业务步骤
    pub fn info(&mut self, msg: impl AsRef<str>) {
        self.logs.push(format!("[INFO] {}", msg.as_ref()));
    }

    /// 记录一条 SQL 轨迹
    pub fn sql(&mut self, msg: impl AsRef<str>) {
        self.logs.push(format!("[SQL] {}", msg.as_ref()));
    }

    /// 记录一条原始文本（分节标题等）
    pub fn raw(&mut self, msg: impl Into<String>) {
        self.logs.push(msg.into());
    }

    /// 取出全部日志，消耗自身
    pub fn into_logs(self) -> Vec<String> {
        self.logs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_prefixes_and_order() {
        let mut log = TxLogger::new();
        log.raw("\n> Processing: PAY at Steam, User: 1, Total: $100.00\n");
        log.info("Starting risk evaluation");
        log.sql("START TRANSACTION;");

        let logs = log.into_logs();
        assert_eq!(logs.len(), 3);
        assert!(logs[0].starts_with("\n> Processing"));
        assert_eq!(logs[1], "[INFO] Starting risk evaluation");
        assert_eq!(logs[2], "[SQL] START TRANSACTION;");
    }
}
