//! Outbound notification delivery
//!
//! Workflow operations never talk to a mail system directly. They
//! enqueue `OutboundMessage`s into the outbox in the same transaction as
//! the state change; the `OutboxDispatcher` later drains the outbox
//! through a `Notifier`:
//! - Log (development default)
//! - Webhook (JSON POST to a mail relay)
//! - Memory (tests)

mod dispatcher;

pub use dispatcher::{DispatchStats, DispatcherSettings, OutboxDispatcher};

use crate::config::NotifyConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A message produced by a workflow operation, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient: String,
    pub subject: String,
    pub html: String,
}

/// Delivery state of an outbox row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl From<String> for DeliveryStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "sent" => DeliveryStatus::Sent,
            "failed" => DeliveryStatus::Failed,
            _ => DeliveryStatus::Pending,
        }
    }
}

impl From<DeliveryStatus> for String {
    fn from(status: DeliveryStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A persisted outbox row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub message: OutboundMessage,
    pub status: DeliveryStatus,
    /// Attempts made so far, including the one in flight after a claim
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Durable queue of outbound messages
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Lease up to `limit` due messages and count the attempt
    async fn claim_due(&self, limit: u64) -> Result<Vec<OutboxEntry>>;

    async fn mark_sent(&self, id: Uuid) -> Result<()>;

    /// Record a failed attempt; `retry_at = None` parks the message as failed
    async fn mark_failed(&self, id: Uuid, error: &str, retry_at: Option<DateTime<Utc>>) -> Result<()>;

    /// Most recent rows, newest first (audit trail)
    async fn recent(&self, limit: u64) -> Result<Vec<OutboxEntry>>;
}

/// A fully addressed email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Trait for message transports
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a single message
    async fn send(&self, email: &Email) -> Result<()>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

/// Writes messages to the log instead of sending them
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &Email) -> Result<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Notification (log provider)"
        );
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "log"
    }
}

/// Posts messages as JSON to an HTTP mail relay
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, url })
    }

    async fn post(&self, email: &Email) -> std::result::Result<(), backoff::Error<AppError>> {
        let response = self
            .client
            .post(&self.url)
            .json(email)
            .send()
            .await
            .map_err(|e| {
                backoff::Error::transient(AppError::Notification {
                    message: format!("Relay request failed: {}", e),
                })
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let err = AppError::Notification {
            message: format!("Relay returned {}: {}", status, body),
        };

        // Client errors will not improve on retry
        if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(backoff::Error::permanent(err))
        } else {
            Err(backoff::Error::transient(err))
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, email: &Email) -> Result<()> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(Duration::from_secs(10)))
            .build();

        backoff::future::retry_notify(
            policy,
            || self.post(email),
            |err: AppError, delay: Duration| {
                tracing::warn!(
                    to = %email.to,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Relay delivery failed, retrying"
                );
            },
        )
        .await
    }

    fn provider_name(&self) -> &str {
        "webhook"
    }
}

/// Keeps every message in memory for assertions
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Email>>,
    fail_remaining: Mutex<u32>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` sends
    pub async fn fail_next(&self, count: u32) {
        *self.fail_remaining.lock().await = count;
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, email: &Email) -> Result<()> {
        let mut remaining = self.fail_remaining.lock().await;
        if *remaining > 0 {
            *remaining -= 1;
            return Err(AppError::Notification {
                message: "memory notifier told to fail".to_string(),
            });
        }
        drop(remaining);

        self.sent.lock().await.push(email.clone());
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}

/// Create a notifier based on configuration
pub fn create_notifier(config: &NotifyConfig) -> Result<Arc<dyn Notifier>> {
    match config.provider.as_str() {
        "webhook" => {
            let url = config.webhook_url.clone().ok_or_else(|| AppError::Configuration {
                message: "notify.webhook_url is required for the webhook provider".to_string(),
            })?;
            Ok(Arc::new(WebhookNotifier::new(
                url,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        "log" => Ok(Arc::new(LogNotifier)),
        other => {
            tracing::warn!(provider = other, "Unknown notification provider, using log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email {
            from: "Research System <no-reply@example.com>".to_string(),
            to: "author@example.org".to_string(),
            subject: "Paper Submitted".to_string(),
            html: "<p>ok</p>".to_string(),
        }
    }

    #[test]
    fn test_delivery_status_strings() {
        assert_eq!(DeliveryStatus::from("sent".to_string()), DeliveryStatus::Sent);
        assert_eq!(DeliveryStatus::from("garbage".to_string()), DeliveryStatus::Pending);
        assert_eq!(String::from(DeliveryStatus::Failed), "failed");
    }

    #[test]
    fn test_factory_requires_webhook_url() {
        let config = NotifyConfig {
            provider: "webhook".to_string(),
            ..NotifyConfig::default()
        };
        assert!(matches!(
            create_notifier(&config),
            Err(AppError::Configuration { .. })
        ));

        let log = create_notifier(&NotifyConfig::default()).unwrap();
        assert_eq!(log.provider_name(), "log");
    }

    #[tokio::test]
    async fn test_memory_notifier_failure_budget() {
        let notifier = MemoryNotifier::new();
        notifier.fail_next(1).await;

        assert!(notifier.send(&email()).await.is_err());
        assert!(notifier.send(&email()).await.is_ok());
        assert_eq!(notifier.sent().await.len(), 1);
    }
}
