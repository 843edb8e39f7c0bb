//! Ordered, resumable batch delivery.

use super::format::{truncate_message, MessageFormatter, TELEGRAM_MAX_LEN};
use super::retry::{RetryDecision, RetryPolicy};
use crate::error::{RelayError, Result};
use crate::reconcile::PendingBatch;
use crate::shutdown::Shutdown;
use crate::store::DeliveryStore;
use crate::transport::MessageSink;
use crate::types::{ChatId, Timestamp, VersionEntry};
use std::borrow::Cow;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Dispatcher tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Per-send retry behaviour.
    pub retry: RetryPolicy,
    /// Pause between consecutive sends.
    pub message_delay: Duration,
    /// Longest message the destination accepts, in characters.
    pub max_message_len: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            message_delay: Duration::from_secs(2),
            max_message_len: TELEGRAM_MAX_LEN,
        }
    }
}

impl DispatchConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_message_delay(mut self, delay: Duration) -> Self {
        self.message_delay = delay;
        self
    }

    pub fn with_max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = len;
        self
    }
}

/// The entry that ended a batch early.
#[derive(Debug)]
pub struct DeliveryFailure {
    pub version: String,
    pub error: RelayError,
}

/// What happened to a batch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Versions sent and marked delivered, in send order.
    pub delivered: Vec<String>,
    /// Set when a send failed for good; the rest of the batch was skipped.
    pub failure: Option<DeliveryFailure>,
    /// Set when cancellation stopped the batch.
    pub cancelled: bool,
    /// Retry waits taken across the batch.
    pub retries: u32,
    /// Entries in the batch that were not delivered.
    pub remaining: usize,
}

impl DispatchReport {
    /// Whether every entry in the batch was delivered.
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// Sends pending batches through a [`MessageSink`].
pub struct Dispatcher<S> {
    sink: S,
    destination: ChatId,
    formatter: MessageFormatter,
    config: DispatchConfig,
    shutdown: Shutdown,
}

impl<S: MessageSink> Dispatcher<S> {
    pub fn new(
        sink: S,
        destination: ChatId,
        formatter: MessageFormatter,
        config: DispatchConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            sink,
            destination,
            formatter,
            config,
            shutdown,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn destination(&self) -> &ChatId {
        &self.destination
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Send `batch` in order, marking each acknowledged entry delivered.
    ///
    /// Send failures and cancellation end the batch and are reported, not
    /// returned; the affected entries stay undelivered for the next pass.
    /// Store errors are returned.
    pub fn deliver(&self, batch: &PendingBatch, store: &DeliveryStore) -> Result<DispatchReport> {
        let total = batch.len();
        let mut report = DispatchReport::default();

        for (i, entry) in batch.iter().enumerate() {
            if self.shutdown.is_cancelled() {
                info!(version = %entry.version, "Shutdown requested, stopping batch");
                report.cancelled = true;
                break;
            }

            info!(
                version = %entry.version,
                position = i + 1,
                total,
                "Sending release notes"
            );

            match self.send_with_retry(entry, &mut report.retries) {
                Ok(()) => {}
                Err(RelayError::Cancelled) => {
                    info!(version = %entry.version, "Shutdown requested during retry wait");
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    error!(version = %entry.version, error = %e, "Failed to send, stopping batch");
                    report.failure = Some(DeliveryFailure {
                        version: entry.version.clone(),
                        error: e,
                    });
                    break;
                }
            }

            if !store.mark_delivered(&entry.version, Timestamp::now())? {
                error!(
                    version = %entry.version,
                    "Sent a version that was never recorded; it will not be tracked as delivered"
                );
            }
            info!(version = %entry.version, "Delivered");
            report.delivered.push(entry.version.clone());

            if i + 1 < total {
                debug!(delay_ms = self.config.message_delay.as_millis() as u64, "Pacing");
                if !self.shutdown.sleep(self.config.message_delay) {
                    info!("Shutdown requested during pacing delay");
                    report.cancelled = true;
                    break;
                }
            }
        }

        report.remaining = total - report.delivered.len();
        if report.delivered.is_empty() {
            info!(pending = total, "No messages delivered");
        } else {
            info!(
                delivered = report.delivered.len(),
                remaining = report.remaining,
                "Batch finished"
            );
        }

        Ok(report)
    }

    /// Render an entry as the exact text that will be sent.
    pub fn render(&self, entry: &VersionEntry) -> String {
        let full = self.formatter.format(entry);
        let text = truncate_message(&full, self.config.max_message_len);
        if matches!(text, Cow::Owned(_)) {
            warn!(
                version = %entry.version,
                from = full.chars().count(),
                to = text.chars().count(),
                "Message truncated"
            );
        }
        text.into_owned()
    }

    fn send_with_retry(&self, entry: &VersionEntry, retries: &mut u32) -> Result<()> {
        let text = self.render(entry);
        let policy = &self.config.retry;
        let max_attempts = policy.max_retries + 1;
        let mut attempt = 0u32;

        loop {
            debug!(
                version = %entry.version,
                attempt = attempt + 1,
                max_attempts,
                chars = text.chars().count(),
                "Send attempt"
            );
            let outcome = self.sink.send(&self.destination, &text);

            match policy.decide(attempt, &outcome) {
                RetryDecision::Done => return Ok(()),
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        version = %entry.version,
                        outcome = ?outcome,
                        wait_secs = delay.as_secs_f64(),
                        attempt = attempt + 1,
                        max_attempts,
                        "Send not acknowledged, retrying"
                    );
                    *retries += 1;
                    if !self.shutdown.sleep(delay) {
                        return Err(RelayError::Cancelled);
                    }
                    attempt += 1;
                }
                RetryDecision::GiveUp(e) => {
                    error!(
                        version = %entry.version,
                        attempts = attempt + 1,
                        error = %e,
                        "Giving up on send"
                    );
                    return Err(e);
                }
            }
        }
    }
}
