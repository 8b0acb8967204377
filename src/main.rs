//! Log Sentinel - 主入口
//!
//! 应用程序入口点，负责：
//! - 解析命令行参数
//! - 初始化日志系统
//! - 加载并校验配置
//! - 启动代理并在 Ctrl+C 时优雅关闭

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log_sentinel::monitoring::SysinfoProbe;
use log_sentinel::services::{AlertDispatcher, LogNotifier, Notifier, WebhookNotifier};
use log_sentinel::{AgentSupervisor, ConfigLoader, DEFAULT_CONFIG_PATH};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "log-sentinel", version)]
#[command(about = "Watch log files and CPU usage, post alerts to a webhook")]
struct Cli {
    /// 配置文件路径（YAML / TOML / JSON）
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// 未设置 RUST_LOG 时使用的日志级别
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 只记录告警，不发送 webhook
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // 初始化日志：RUST_LOG 优先
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Log Sentinel v{} - 启动中...", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(ConfigLoader::new(&cli.config).load()?);
    info!(path = %cli.config.display(), "✅ 配置加载成功");

    let notifier: Arc<dyn Notifier> = if cli.dry_run {
        warn!("Dry run enabled, alerts will only be logged");
        Arc::new(LogNotifier)
    } else {
        Arc::new(WebhookNotifier::from_config(&config)?)
    };
    let dispatcher = Arc::new(AlertDispatcher::new(notifier));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 收到中断信号，正在关闭...");
                signal_token.cancel();
            }
            // 无法安装信号处理时代理继续运行，只能由外部终止
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    let supervisor = AgentSupervisor::new(config, dispatcher, Box::new(SysinfoProbe::new()));
    let report = supervisor.run_with_watcher(shutdown).await?;

    info!(
        log_alerts = report.router.alerts_produced,
        cpu_alerts = report.sampler.alerts_produced,
        delivered = report.router.alerts_delivered,
        "👋 Log Sentinel 已退出"
    );
    Ok(())
}
