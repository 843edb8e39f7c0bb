//! Scripted in-memory transports.

use super::{ChangelogSource, MessageSink, SendOutcome};
use crate::error::{RelayError, Result};
use crate::types::ChatId;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A changelog source that serves scripted responses.
///
/// Queued responses are served first, in order; once the queue is empty
/// every fetch returns the standing document set with
/// [`set_document`](Self::set_document).
#[derive(Debug, Default)]
pub struct MockChangelogSource {
    queued: Mutex<VecDeque<std::result::Result<String, String>>>,
    document: Mutex<Option<String>>,
    fetches: AtomicUsize,
}

impl MockChangelogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source that always serves `document`.
    pub fn with_document(document: impl Into<String>) -> Self {
        let source = Self::new();
        source.set_document(document);
        source
    }

    /// Replace the standing document.
    pub fn set_document(&self, document: impl Into<String>) {
        *self.document.lock() = Some(document.into());
    }

    /// Serve `document` once, ahead of the standing document.
    pub fn push_document(&self, document: impl Into<String>) {
        self.queued.lock().push_back(Ok(document.into()));
    }

    /// Fail one fetch with a transport error.
    pub fn push_error(&self, message: impl Into<String>) {
        self.queued.lock().push_back(Err(message.into()));
    }

    /// Number of fetches served so far, successful or not.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ChangelogSource for MockChangelogSource {
    fn fetch_text(&self, _url: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(next) = self.queued.lock().pop_front() {
            return next.map_err(RelayError::Transport);
        }

        self.document
            .lock()
            .clone()
            .ok_or_else(|| RelayError::Transport("no document configured".into()))
    }
}

/// One attempted send, as seen by [`MockSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub destination: ChatId,
    pub text: String,
    pub outcome: SendOutcome,
}

/// A message sink that records every attempt and replies from a script.
///
/// Attempts consume queued outcomes in order; with the queue empty every
/// attempt is [`SendOutcome::Delivered`].
#[derive(Debug, Default)]
pub struct MockSink {
    outcomes: Mutex<VecDeque<SendOutcome>>,
    attempts: Mutex<Vec<SentMessage>>,
    probe_error: Mutex<Option<String>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of a future attempt.
    pub fn push_outcome(&self, outcome: SendOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Make [`probe`](MessageSink::probe) fail.
    pub fn fail_probe(&self, message: impl Into<String>) {
        *self.probe_error.lock() = Some(message.into());
    }

    /// Every attempt so far, in order.
    pub fn attempts(&self) -> Vec<SentMessage> {
        self.attempts.lock().clone()
    }

    /// Texts of attempts that were acknowledged.
    pub fn delivered(&self) -> Vec<String> {
        self.attempts
            .lock()
            .iter()
            .filter(|m| m.outcome.is_delivered())
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }
}

impl MessageSink for MockSink {
    fn send(&self, destination: &ChatId, text: &str) -> SendOutcome {
        let outcome = self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or(SendOutcome::Delivered);

        self.attempts.lock().push(SentMessage {
            destination: destination.clone(),
            text: text.to_string(),
            outcome: outcome.clone(),
        });

        outcome
    }

    fn probe(&self, _destination: &ChatId) -> Result<()> {
        match self.probe_error.lock().clone() {
            Some(message) => Err(RelayError::Transport(message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_serves_queue_then_document() {
        let source = MockChangelogSource::with_document("standing");
        source.push_document("first");
        source.push_error("boom");

        assert_eq!(source.fetch_text("u").unwrap(), "first");
        assert!(matches!(source.fetch_text("u"), Err(RelayError::Transport(_))));
        assert_eq!(source.fetch_text("u").unwrap(), "standing");
        assert_eq!(source.fetch_count(), 3);
    }

    #[test]
    fn test_sink_records_attempts() {
        let sink = MockSink::new();
        sink.push_outcome(SendOutcome::TimedOut);
        let chat = ChatId::new("-100");

        assert_eq!(sink.send(&chat, "a"), SendOutcome::TimedOut);
        assert_eq!(sink.send(&chat, "a"), SendOutcome::Delivered);
        assert_eq!(sink.attempt_count(), 2);
        assert_eq!(sink.delivered(), vec!["a"]);
    }
}
