use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/**
 * 代理错误类型 - 使用 miette 提供用户友好的错误诊断
 *
 * 只有 `Config` 与 `WatchSetup` 会终止进程，其余错误在产生它的组件内部消化
 */
#[derive(Error, Debug, Diagnostic)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(sentinel::config_error),
        help("Check webhook_url, monitor_directory, alert_on_keywords and cpu_threshold in the config file")
    )]
    Config(String),

    #[error("Watch setup error for {path}: {message}")]
    #[diagnostic(
        code(sentinel::watch_setup_error),
        help("Ensure monitor_directory exists and is readable by the agent")
    )]
    WatchSetup { message: String, path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    #[diagnostic(code(sentinel::read_error))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(sentinel::delivery_error))]
    Delivery(#[from] DeliveryError),

    #[error("CPU sample error: {0}")]
    #[diagnostic(code(sentinel::sample_error))]
    Sample(String),
}

/// Webhook 投递失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("webhook rejected alert with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("webhook transport failure: {0}")]
    Transport(String),
}

impl AppError {
    /**
     * 创建配置错误
     */
    pub fn config_error(message: impl Into<String>) -> Self {
        AppError::Config(message.into())
    }

    /**
     * 创建监听初始化错误
     */
    pub fn watch_setup(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        AppError::WatchSetup {
            message: message.into(),
            path: path.into(),
        }
    }

    /**
     * 创建文件读取错误
     */
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Read {
            path: path.into(),
            source,
        }
    }

    /**
     * 创建 CPU 采样错误
     */
    pub fn sample_error(message: impl Into<String>) -> Self {
        AppError::Sample(message.into())
    }

    /// 是否为启动期致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::WatchSetup { .. })
    }
}

/**
 * 统一结果类型
 */
pub type Result<T> = std::result::Result<T, AppError>;
