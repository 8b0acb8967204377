//! 代理监督者
//!
//! 负责启动并托管两个并发活动：
//! - 日志变化路由（文件监听 → 读取追加 → 关键词扫描 → 告警）
//! - CPU 采样循环
//!
//! 两者各持有关闭令牌的子令牌。收到关闭信号后监督者取消两者并等待其退出。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::Result;
use crate::models::{AgentConfig, ChangeEvent};
use crate::monitoring::{CpuProbe, CpuSamplerLoop, SamplerReport};
use crate::services::alert_dispatcher::AlertDispatcher;
use crate::services::event_router::{ChangeEventRouter, RouterReport};
use crate::services::file_watcher::FsChangeSource;

/// 代理运行汇总
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AgentReport {
    pub router: RouterReport,
    pub sampler: SamplerReport,
}

impl AgentReport {
    pub fn total_alerts(&self) -> u64 {
        self.router.alerts_produced + self.sampler.alerts_produced
    }
}

/// 代理监督者
pub struct AgentSupervisor {
    config: Arc<AgentConfig>,
    dispatcher: Arc<AlertDispatcher>,
    probe: Box<dyn CpuProbe>,
}

impl AgentSupervisor {
    pub fn new(
        config: Arc<AgentConfig>,
        dispatcher: Arc<AlertDispatcher>,
        probe: Box<dyn CpuProbe>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            probe,
        }
    }

    /// 建立目录监听后运行，直到 `shutdown` 被取消
    ///
    /// # Errors
    ///
    /// 无法监听监控目录时返回 `AppError::WatchSetup`，此时不会启动任何活动
    pub async fn run_with_watcher(self, shutdown: CancellationToken) -> Result<AgentReport> {
        let (source, events) = FsChangeSource::start(
            &self.config.monitor_directory,
            self.config.agent.event_channel_capacity,
        )?;

        let report = self.run(events, shutdown).await;

        // 活动全部退出后再停止监听
        drop(source);
        Ok(report)
    }

    /// 以给定事件流运行，直到 `shutdown` 被取消
    pub async fn run(
        self,
        events: mpsc::Receiver<ChangeEvent>,
        shutdown: CancellationToken,
    ) -> AgentReport {
        let Self {
            config,
            dispatcher,
            probe,
        } = self;

        info!(
            directory = %config.monitor_directory.display(),
            keywords = ?config.alert_on_keywords,
            cpu_threshold = config.cpu_threshold,
            "Agent starting"
        );

        let router = ChangeEventRouter::new(Arc::clone(&config), Arc::clone(&dispatcher));
        let sampler = CpuSamplerLoop::new(&config, probe, dispatcher);

        let router_handle = tokio::spawn(router.run(events, shutdown.child_token()));
        let sampler_handle = tokio::spawn(sampler.run(shutdown.child_token()));

        shutdown.cancelled().await;
        info!("Shutdown requested, waiting for activities to finish");

        let mut report = AgentReport::default();

        match router_handle.await {
            Ok(router) => report.router = router,
            Err(e) => error!(error = %e, "Change event router terminated abnormally"),
        }
        match sampler_handle.await {
            Ok(sampler) => report.sampler = sampler,
            Err(e) => error!(error = %e, "CPU sampler terminated abnormally"),
        }

        info!(
            log_alerts = report.router.alerts_produced,
            cpu_alerts = report.sampler.alerts_produced,
            "Agent stopped"
        );
        report
    }
}
