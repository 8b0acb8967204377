//! 配置加载基础设施层
//!
//! 分层来源（后者覆盖前者）：
//! - 配置文件（YAML / TOML / JSON，按扩展名识别）
//! - 环境变量 `LOG_SENTINEL__<KEY>`，嵌套键用 `__` 分隔
//!
//! 加载完成后执行 `validator` 校验，任何缺失或非法字段都视为启动期致命错误。

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::{debug, info};
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::AgentConfig;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "LOG_SENTINEL";

/// 配置加载器
pub struct ConfigLoader {
    path: PathBuf,
    use_env: bool,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            use_env: true,
        }
    }

    /// 关闭环境变量覆盖（测试中避免进程环境干扰）
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载并校验配置
    pub fn load(&self) -> Result<AgentConfig> {
        if !self.path.is_file() {
            return Err(AppError::config_error(format!(
                "config file not found: {}",
                self.path.display()
            )));
        }

        let mut builder = Config::builder().add_source(File::from(self.path.as_path()));

        if self.use_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("alert_on_keywords")
                    .try_parsing(true),
            );
        }

        let raw = builder
            .build()
            .map_err(|e| AppError::config_error(format!("{}: {}", self.path.display(), e)))?;

        let config: AgentConfig = raw
            .try_deserialize()
            .map_err(|e| AppError::config_error(format!("{}: {}", self.path.display(), e)))?;

        config
            .validate()
            .map_err(|e| AppError::config_error(format!("invalid configuration: {}", e)))?;

        debug!(?config, "Configuration validated");
        info!(
            path = %self.path.display(),
            directory = %config.monitor_directory.display(),
            keywords = config.alert_on_keywords.len(),
            cpu_threshold = config.cpu_threshold,
            "Configuration loaded"
        );

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}
