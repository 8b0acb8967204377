//! 代理配置数据结构
//!
//! 配置在启动时加载一次，之后以 `Arc<AgentConfig>` 的形式只读共享给所有组件。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// 代理配置根结构
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AgentConfig {
    /// Webhook 地址（兼容旧字段名 `slack_webhook_url`）
    #[serde(alias = "slack_webhook_url")]
    #[validate(url)]
    pub webhook_url: String,

    /// 被监听的目录（非递归）
    pub monitor_directory: PathBuf,

    /// 触发告警的关键词，大小写敏感的子串匹配
    #[validate(length(min = 1))]
    pub alert_on_keywords: Vec<String>,

    /// CPU 使用率阈值（百分比）
    #[validate(range(min = 0.0, max = 100.0))]
    pub cpu_threshold: f64,

    #[serde(default)]
    #[validate(nested)]
    pub agent: AgentSettings,
}

/// 代理运行参数（全部可选）
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AgentSettings {
    #[validate(length(min = 1, max = 32))]
    pub log_suffix: String,

    #[validate(range(min = 1, max = 10000))]
    pub cold_start_lines: usize,

    #[validate(range(min = 100, max = 60000))]
    pub sample_window_ms: u64,

    #[validate(range(min = 1, max = 86400))]
    pub check_interval_secs: u64,

    /// 连续 CPU 告警的去抖窗口；`None` 表示每次超阈值都告警
    pub cpu_debounce_secs: Option<u64>,

    #[validate(range(min = 1, max = 65536))]
    pub event_channel_capacity: usize,

    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            log_suffix: ".log".to_string(),
            cold_start_lines: 10,
            sample_window_ms: 1000,
            check_interval_secs: 10,
            cpu_debounce_secs: None,
            event_channel_capacity: 1024,
            request_timeout_secs: 10,
        }
    }
}

impl AgentSettings {
    pub fn sample_window(&self) -> Duration {
        Duration::from_millis(self.sample_window_ms)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn cpu_debounce(&self) -> Option<Duration> {
        self.cpu_debounce_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AgentConfig {
    /// 判断路径是否为需要跟踪的日志文件
    pub fn is_log_path(&self, path: &std::path::Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(&self.agent.log_suffix))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn sample_config() -> AgentConfig {
        AgentConfig {
            webhook_url: "https://hooks.example.com/services/T000".to_string(),
            monitor_directory: PathBuf::from("/var/log/app"),
            alert_on_keywords: vec!["ERROR".to_string()],
            cpu_threshold: 80.0,
            agent: AgentSettings::default(),
        }
    }

    #[test]
    fn test_default_settings_validate() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = sample_config();
        config.cpu_threshold = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_log_path() {
        let config = sample_config();
        assert!(config.is_log_path(Path::new("/var/log/app/server.log")));
        assert!(!config.is_log_path(Path::new("/var/log/app/server.log.gz")));
        assert!(!config.is_log_path(Path::new("/var/log/app/notes.txt")));
        assert!(!config.is_log_path(Path::new("/")));
    }
}
