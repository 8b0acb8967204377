//! CPU 采样循环
//!
//! 状态机：`Sampling → Waiting → Sampling`，除取消外没有终止状态。
//! 每个周期在测量窗口内取一次样本，超过阈值则产生一条告警，随后等待固定间隔。
//! 取消信号在采样、投递与等待阶段都会被立即响应。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::System;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::models::{AgentConfig, AlertMessage, CpuSample};
use crate::services::alert_dispatcher::AlertDispatcher;

/// CPU 使用率测量原语
#[async_trait]
pub trait CpuProbe: Send {
    /// 在 `window` 时长内测量一次全局 CPU 使用率
    async fn sample(&mut self, window: Duration) -> Result<CpuSample>;
}

/// 基于 sysinfo 的 CPU 测量
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CpuProbe for SysinfoProbe {
    async fn sample(&mut self, window: Duration) -> Result<CpuSample> {
        // 两次刷新之间的间隔过短时 sysinfo 给出的数值不可靠
        let window = window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);

        self.system.refresh_cpu_usage();
        tokio::time::sleep(window).await;
        self.system.refresh_cpu_usage();

        if self.system.cpus().is_empty() {
            return Err(AppError::sample_error("no CPUs reported by the system"));
        }

        let percent = self.system.global_cpu_usage();
        if !percent.is_finite() {
            return Err(AppError::sample_error(format!(
                "invalid CPU reading: {}",
                percent
            )));
        }

        Ok(CpuSample::new(percent))
    }
}

/// 采样循环所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerPhase {
    Sampling,
    Waiting,
}

/// 采样循环统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SamplerReport {
    pub cycles: u64,
    pub failed_samples: u64,
    pub alerts_produced: u64,
    pub alerts_suppressed: u64,
}

/// CPU 采样循环
pub struct CpuSamplerLoop {
    threshold: f64,
    window: Duration,
    interval: Duration,
    debounce: Option<Duration>,
    last_alert: Option<Instant>,
    probe: Box<dyn CpuProbe>,
    dispatcher: Arc<AlertDispatcher>,
    report: SamplerReport,
}

impl CpuSamplerLoop {
    pub fn new(
        config: &AgentConfig,
        probe: Box<dyn CpuProbe>,
        dispatcher: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            threshold: config.cpu_threshold,
            window: config.agent.sample_window(),
            interval: config.agent.check_interval(),
            debounce: config.agent.cpu_debounce(),
            last_alert: None,
            probe,
            dispatcher,
            report: SamplerReport::default(),
        }
    }

    /// 判断一次样本是否需要告警
    ///
    /// `percent <= threshold` 从不告警；启用去抖时，窗口内的重复超限被抑制。
    pub fn evaluate(&mut self, sample: &CpuSample) -> Option<AlertMessage> {
        if f64::from(sample.percent) <= self.threshold {
            return None;
        }

        let now = Instant::now();
        if let (Some(window), Some(last)) = (self.debounce, self.last_alert) {
            if now.duration_since(last) < window {
                self.report.alerts_suppressed += 1;
                debug!(
                    percent = sample.percent,
                    since_last_ms = now.duration_since(last).as_millis() as u64,
                    "CPU alert suppressed by debounce"
                );
                return None;
            }
        }

        self.last_alert = Some(now);
        Some(AlertMessage::from_cpu_sample(sample))
    }

    /// 运行采样循环直到取消
    pub async fn run(mut self, shutdown: CancellationToken) -> SamplerReport {
        info!(
            threshold = self.threshold,
            interval_secs = self.interval.as_secs(),
            debounce = ?self.debounce,
            "CPU sampler started"
        );

        let mut phase = SamplerPhase::Sampling;
        loop {
            match phase {
                SamplerPhase::Sampling => {
                    let window = self.window;
                    let result = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        result = self.probe.sample(window) => result,
                    };

                    self.report.cycles += 1;
                    if let Some(alert) = self.handle_sample(result) {
                        tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => break,
                            // 投递失败已由分发器记录
                            _ = self.dispatcher.dispatch(&alert) => {}
                        }
                    }
                    phase = SamplerPhase::Waiting;
                }
                SamplerPhase::Waiting => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.interval) => phase = SamplerPhase::Sampling,
                    }
                }
            }
        }

        info!(cycles = self.report.cycles, alerts = self.report.alerts_produced, "CPU sampler stopped");
        self.report
    }

    fn handle_sample(&mut self, result: Result<CpuSample>) -> Option<AlertMessage> {
        let sample = match result {
            Ok(sample) => sample,
            Err(e) => {
                self.report.failed_samples += 1;
                warn!(error = %e, "CPU sample failed, skipping cycle");
                return None;
            }
        };

        debug!(percent = sample.percent, "CPU sampled");

        let alert = self.evaluate(&sample)?;
        self.report.alerts_produced += 1;
        warn!(
            percent = sample.percent,
            threshold = self.threshold,
            "CPU threshold exceeded"
        );
        Some(alert)
    }
}
