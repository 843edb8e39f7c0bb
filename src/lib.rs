//! # Changelog Relay
//!
//! Watches a Markdown changelog and posts every released version to a chat,
//! oldest first, exactly once per version.
//!
//! ## Core Concepts
//!
//! - **Changelog**: `## X.Y.Z` sections parsed newest-first from the document
//! - **Delivery store**: durable per-version record of content and delivery
//! - **Reconciliation**: merges a parsed changelog into the store and yields
//!   the pending batch in release order
//! - **Dispatch**: sends a batch with retry, pacing and cancellation, marking
//!   each version delivered only after the destination acknowledges it
//! - **Relay**: drains the backlog once at startup, then polls
//!
//! ## Example
//!
//! ```no_run
//! use changelog_relay::{
//!     DeliveryStore, HttpChangelogSource, Relay, RelayConfig, Shutdown, TelegramSink,
//! };
//!
//! # fn main() -> changelog_relay::Result<()> {
//! let mut config = RelayConfig::default()
//!     .with_bot_token("123:abc")
//!     .with_chat_id("-100200300");
//! config.validate()?;
//!
//! let store = DeliveryStore::open(&config.store_path)?;
//! let relay = Relay::new(
//!     &config,
//!     HttpChangelogSource::new()?,
//!     TelegramSink::new(config.bot_token.clone())?,
//!     store,
//!     Shutdown::new(),
//! );
//! relay.run()?;
//! # Ok(())
//! # }
//! ```

pub mod changelog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod reconcile;
pub mod relay;
pub mod shutdown;
pub mod store;
pub mod transport;
pub mod types;

// Re-exports
pub use changelog::{parse_changelog, Changelog};
pub use config::RelayConfig;
pub use dispatch::{DispatchConfig, DispatchReport, Dispatcher, MessageFormatter, RetryPolicy};
pub use error::{RelayError, Result};
pub use reconcile::{reconcile, PendingBatch, Reconciliation};
pub use relay::{Relay, RelayState, RelayStats};
pub use shutdown::Shutdown;
pub use store::DeliveryStore;
pub use transport::{
    ChangelogSource, HttpChangelogSource, MessageSink, MockChangelogSource, MockSink,
    SendOutcome, TelegramSink,
};
pub use types::*;
