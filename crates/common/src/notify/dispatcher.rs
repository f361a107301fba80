//! Outbox dispatcher
//!
//! Drains pending outbox rows through a notifier. A failed send never
//! affects the workflow state that produced it; the row is retried with
//! exponential spacing and parked after `max_attempts`.

use super::{Email, Notifier, OutboxEntry, OutboxStore};
use crate::config::NotifyConfig;
use crate::errors::Result;
use crate::metrics;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Longest gap between two attempts for the same message
const MAX_RETRY_DELAY_SECS: i64 = 600;

const MAX_FAILURES: u32 = 5;
const CIRCUIT_BREAK_DURATION: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub from_address: String,
    pub batch_size: u64,
    pub poll_interval: Duration,
    pub max_attempts: i32,
}

impl From<&NotifyConfig> for DispatcherSettings {
    fn from(config: &NotifyConfig) -> Self {
        Self {
            from_address: config.from_address.clone(),
            batch_size: config.batch_size,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_attempts: config.max_attempts,
        }
    }
}

/// Outcome of one drain pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub parked: usize,
}

pub struct OutboxDispatcher {
    outbox: Arc<dyn OutboxStore>,
    notifier: Arc<dyn Notifier>,
    settings: DispatcherSettings,
}

impl OutboxDispatcher {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        notifier: Arc<dyn Notifier>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            outbox,
            notifier,
            settings,
        }
    }

    /// Claim one batch and attempt delivery of each message
    #[instrument(skip(self), fields(provider = %self.notifier.provider_name()))]
    pub async fn drain_once(&self) -> Result<DispatchStats> {
        let entries = self.outbox.claim_due(self.settings.batch_size).await?;
        metrics::record_outbox_batch(entries.len());

        let mut stats = DispatchStats {
            claimed: entries.len(),
            ..DispatchStats::default()
        };

        for entry in entries {
            let email = Email {
                from: self.settings.from_address.clone(),
                to: entry.message.recipient.clone(),
                subject: entry.message.subject.clone(),
                html: entry.message.html.clone(),
            };

            let started = Instant::now();
            let outcome = self.notifier.send(&email).await;
            metrics::record_notification(
                started.elapsed().as_secs_f64(),
                self.notifier.provider_name(),
                outcome.is_ok(),
            );

            match outcome {
                Ok(()) => {
                    self.outbox.mark_sent(entry.id).await?;
                    debug!(message_id = %entry.id, to = %email.to, "Notification sent");
                    stats.sent += 1;
                }
                Err(e) => {
                    let retry_at = self.next_attempt(&entry, Utc::now());
                    if retry_at.is_some() {
                        stats.retried += 1;
                        warn!(
                            message_id = %entry.id,
                            attempts = entry.attempts,
                            error = %e,
                            "Notification failed, will retry"
                        );
                    } else {
                        stats.parked += 1;
                        error!(
                            message_id = %entry.id,
                            attempts = entry.attempts,
                            error = %e,
                            "Notification failed permanently"
                        );
                    }
                    self.outbox
                        .mark_failed(entry.id, &e.to_string(), retry_at)
                        .await?;
                }
            }
        }

        Ok(stats)
    }

    /// When to try again, or `None` once the attempt budget is spent
    fn next_attempt(&self, entry: &OutboxEntry, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if entry.attempts >= self.settings.max_attempts {
            return None;
        }
        let exponent = entry.attempts.clamp(0, 16) as u32;
        let delay = (5_i64 << exponent).min(MAX_RETRY_DELAY_SECS);
        Some(now + chrono::Duration::seconds(delay))
    }

    /// Poll until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            provider = %self.notifier.provider_name(),
            batch_size = self.settings.batch_size,
            "Outbox dispatcher started"
        );

        let mut consecutive_failures = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            if consecutive_failures >= MAX_FAILURES {
                warn!(
                    failures = consecutive_failures,
                    "Circuit breaker open, pausing..."
                );
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(CIRCUIT_BREAK_DURATION) => {}
                }
                consecutive_failures = 0;
                info!("Circuit breaker reset, resuming...");
            }

            let idle = match self.drain_once().await {
                Ok(stats) => {
                    if stats.sent > 0 || stats.claimed == 0 {
                        consecutive_failures = 0;
                    } else {
                        consecutive_failures += 1;
                    }
                    if stats.claimed > 0 {
                        info!(
                            claimed = stats.claimed,
                            sent = stats.sent,
                            retried = stats.retried,
                            parked = stats.parked,
                            "Outbox batch processed"
                        );
                    }
                    (stats.claimed as u64) < self.settings.batch_size
                }
                Err(e) => {
                    consecutive_failures += 1;
                    error!(error = %e, failures = consecutive_failures, "Failed to drain outbox");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(self.settings.poll_interval) => {}
                }
            }
        }

        info!("Outbox dispatcher stopped");
    }
}
