use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 告警来源
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertSource {
    Log,
    Cpu,
}

impl AlertSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSource::Log => "log",
            AlertSource::Cpu => "cpu",
        }
    }
}

impl fmt::Display for AlertSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 告警消息，生产者产生后交给分发器，投递尝试后即丢弃
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AlertMessage {
    pub text: String,
    pub source: AlertSource,
    pub timestamp: DateTime<Utc>,
}

impl AlertMessage {
    /// 日志关键词告警
    pub fn from_log_line(line: &str) -> Self {
        Self {
            text: format!("Alert: {}", line.trim()),
            source: AlertSource::Log,
            timestamp: Utc::now(),
        }
    }

    /// CPU 超阈值告警
    pub fn from_cpu_sample(sample: &CpuSample) -> Self {
        Self {
            text: format!("High CPU usage detected: {:.1}%", sample.percent),
            source: AlertSource::Cpu,
            timestamp: sample.timestamp,
        }
    }
}

/// 一次 CPU 采样结果
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CpuSample {
    pub percent: f32,
    pub timestamp: DateTime<Utc>,
}

impl CpuSample {
    pub fn new(percent: f32) -> Self {
        Self {
            percent,
            timestamp: Utc::now(),
        }
    }
}

/// 投递成功的回执（HTTP 状态码）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delivered {
    pub status: u16,
}

/// 文件变化类型
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed,
}

/// 文件变化事件
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Modified)
    }
}
