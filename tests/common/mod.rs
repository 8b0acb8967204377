//! 集成测试共享工具

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log_sentinel::error::{AppError, DeliveryError, Result};
use log_sentinel::models::{AgentConfig, AgentSettings, CpuSample, Delivered};
use log_sentinel::monitoring::CpuProbe;
use log_sentinel::services::{AlertDispatcher, Notifier, WebhookPayload};

/// 记录所有收到的告警文本
#[derive(Default)]
pub struct RecordingNotifier {
    texts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    /// 等待至少 `count` 条告警，超时返回已收到的内容
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let texts = self.texts();
            if texts.len() >= count || tokio::time::Instant::now() >= deadline {
                return texts;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, payload: &WebhookPayload) -> std::result::Result<Delivered, DeliveryError> {
        self.texts.lock().unwrap().push(payload.text.clone());
        Ok(Delivered { status: 200 })
    }
}

/// 按脚本返回读数，脚本耗尽后重复最后一个读数
pub struct ScriptedProbe {
    readings: VecDeque<f32>,
    last: Option<f32>,
}

impl ScriptedProbe {
    pub fn new(readings: &[f32]) -> Self {
        Self {
            readings: readings.iter().copied().collect(),
            last: None,
        }
    }
}

#[async_trait]
impl CpuProbe for ScriptedProbe {
    async fn sample(&mut self, window: Duration) -> Result<CpuSample> {
        tokio::time::sleep(window).await;
        if let Some(next) = self.readings.pop_front() {
            self.last = Some(next);
        }
        self.last
            .map(CpuSample::new)
            .ok_or_else(|| AppError::sample_error("empty script"))
    }
}

pub fn recording_dispatcher() -> (Arc<AlertDispatcher>, Arc<RecordingNotifier>) {
    let recorder = Arc::new(RecordingNotifier::default());
    (Arc::new(AlertDispatcher::new(recorder.clone())), recorder)
}

/// 阈值 80、关键词 ERROR 的测试配置
pub fn agent_config(dir: &Path) -> AgentConfig {
    AgentConfig {
        webhook_url: "http://localhost/hook".to_string(),
        monitor_directory: dir.to_path_buf(),
        alert_on_keywords: vec!["ERROR".to_string()],
        cpu_threshold: 80.0,
        agent: AgentSettings {
            sample_window_ms: 10,
            check_interval_secs: 3600,
            ..AgentSettings::default()
        },
    }
}
