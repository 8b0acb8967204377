//! Log Sentinel - 日志与主机监控代理
//!
//! 监听一个目录中的日志文件，对新追加的行做关键词匹配；
//! 同时周期性采样 CPU 使用率。任一条件命中时向 webhook 发送文本告警。
//!
//! 模块划分：
//! - `infrastructure`: 配置加载
//! - `models`: 配置与告警数据模型
//! - `services`: 文件监听、增量读取、关键词扫描、事件路由、告警分发
//! - `monitoring`: CPU 采样循环
//! - `supervisor`: 并发活动的启动与关闭

pub mod error;
pub mod infrastructure;
pub mod models;
pub mod monitoring;
pub mod services;
pub mod supervisor;

pub use error::{AppError, DeliveryError, Result};
pub use infrastructure::config::{ConfigLoader, DEFAULT_CONFIG_PATH};
pub use models::{AgentConfig, AlertMessage, AlertSource};
pub use supervisor::{AgentReport, AgentSupervisor};
