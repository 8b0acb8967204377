//! 告警分发
//!
//! 分发器把 `AlertMessage` 序列化为 `{"text": ...}` 并交给 `Notifier` 发送。
//! 投递失败只记录诊断信息并返回 `DeliveryError`：不重试、不批量、不阻塞后续告警。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{AppError, DeliveryError, Result};
use crate::models::{AgentConfig, AlertMessage, Delivered};

/// 诊断日志中保留的响应体最大长度
const MAX_LOGGED_BODY: usize = 512;

/// Webhook 请求体
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookPayload {
    pub text: String,
}

impl From<&AlertMessage> for WebhookPayload {
    fn from(alert: &AlertMessage) -> Self {
        Self {
            text: alert.text.clone(),
        }
    }
}

/// 通知传输层
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, payload: &WebhookPayload) -> std::result::Result<Delivered, DeliveryError>;
}

/// 基于 HTTP POST 的 webhook 通知
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("log-sentinel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config_error(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(config.webhook_url.clone(), config.agent.request_timeout())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, payload: &WebhookPayload) -> std::result::Result<Delivered, DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(Delivered {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body: truncate_body(body),
        })
    }
}

/// 只写日志的通知（`--dry-run`）
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, payload: &WebhookPayload) -> std::result::Result<Delivered, DeliveryError> {
        info!(text = %payload.text, "Dry run: alert not sent");
        Ok(Delivered { status: 200 })
    }
}

/// 告警分发器
///
/// 可被事件路由与 CPU 采样并发调用，每次调用互不共享可变状态。
#[derive(Clone)]
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// 投递一条告警
    pub async fn dispatch(
        &self,
        alert: &AlertMessage,
    ) -> std::result::Result<Delivered, DeliveryError> {
        let payload = WebhookPayload::from(alert);
        let source = alert.source.as_str();

        match self.notifier.send(&payload).await {
            Ok(delivered) => {
                metrics::counter!("log_sentinel_alerts_delivered_total", "source" => source)
                    .increment(1);
                debug!(source, status = delivered.status, "Alert delivered");
                Ok(delivered)
            }
            Err(e) => {
                metrics::counter!("log_sentinel_alerts_failed_total", "source" => source)
                    .increment(1);
                match &e {
                    DeliveryError::Rejected { status, body } => error!(
                        source,
                        text = %alert.text,
                        status,
                        body = %body,
                        "Failed to send notification"
                    ),
                    DeliveryError::Transport(reason) => error!(
                        source,
                        text = %alert.text,
                        error = %reason,
                        "Failed to send notification"
                    ),
                }
                Err(e)
            }
        }
    }

    /// 依次投递多条告警，返回成功条数
    pub async fn dispatch_all(&self, alerts: &[AlertMessage]) -> usize {
        let mut delivered = 0;
        for alert in alerts {
            if self.dispatch(alert).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_LOGGED_BODY {
        let mut cut = MAX_LOGGED_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
