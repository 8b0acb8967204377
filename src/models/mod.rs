pub mod alert;
pub mod config;

// 重新导出核心类型
pub use alert::{AlertMessage, AlertSource, ChangeEvent, ChangeKind, CpuSample, Delivered};
pub use config::{AgentConfig, AgentSettings};
