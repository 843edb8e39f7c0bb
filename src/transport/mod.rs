//! Collaborators at the edges of the relay.
//!
//! The relay itself never talks HTTP. It fetches the changelog through a
//! [`ChangelogSource`] and sends messages through a [`MessageSink`]; both
//! own their connection and timeout handling and only report outcomes.
//!
//! - [`HttpChangelogSource`] / [`TelegramSink`]: blocking `reqwest` clients
//! - [`MockChangelogSource`] / [`MockSink`]: scripted in-memory doubles

mod http;
mod mock;
mod telegram;

pub use http::HttpChangelogSource;
pub use mock::{MockChangelogSource, MockSink, SentMessage};
pub use telegram::{TelegramSink, TELEGRAM_API_BASE};

use crate::error::Result;
use crate::types::ChatId;
use std::time::Duration;

/// Fetches the raw changelog document.
pub trait ChangelogSource: Send + Sync {
    /// Fetch the document at `url`. Non-success statuses are errors.
    fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Outcome of a single send attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The destination acknowledged the message.
    Delivered,
    /// Flood control; the destination asked us to wait.
    RateLimited { retry_after: Duration },
    /// The request timed out; the message may or may not have arrived.
    TimedOut,
    /// Any other failure. Not retried.
    Failed { cause: String },
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered)
    }
}

/// Sends text to a chat destination.
pub trait MessageSink: Send + Sync {
    /// Attempt to deliver `text` once. Implementations do not retry.
    fn send(&self, destination: &ChatId, text: &str) -> SendOutcome;

    /// Check that the destination is reachable with our credentials.
    ///
    /// Informational only; the relay logs a failure and carries on.
    fn probe(&self, _destination: &ChatId) -> Result<()> {
        Ok(())
    }
}

impl<T: ChangelogSource + ?Sized> ChangelogSource for std::sync::Arc<T> {
    fn fetch_text(&self, url: &str) -> Result<String> {
        (**self).fetch_text(url)
    }
}

impl<T: MessageSink + ?Sized> MessageSink for std::sync::Arc<T> {
    fn send(&self, destination: &ChatId, text: &str) -> SendOutcome {
        (**self).send(destination, text)
    }

    fn probe(&self, destination: &ChatId) -> Result<()> {
        (**self).probe(destination)
    }
}
