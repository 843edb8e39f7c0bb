//! Relay configuration.

use crate::dispatch::DispatchConfig;
use crate::error::{RelayError, Result};
use crate::types::ChatId;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Changelog watched when none is configured.
pub const DEFAULT_CHANGELOG_URL: &str =
    "https://raw.githubusercontent.com/anthropics/claude-code/main/CHANGELOG.md";

/// Default product name used in message titles.
pub const DEFAULT_PRODUCT_NAME: &str = "Claude Code";

/// Default seconds between polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;

/// Default store location.
pub const DEFAULT_STORE_PATH: &str = "data/relay.db";

/// Everything the relay needs to run.
#[derive(Clone)]
pub struct RelayConfig {
    /// Where to fetch the changelog from.
    pub changelog_url: String,

    /// Bot API credential.
    pub bot_token: String,

    /// Destination chat.
    pub chat_id: String,

    /// Pause between polls.
    pub poll_interval: Duration,

    /// Delivery store file.
    pub store_path: PathBuf,

    /// Shown in every message title.
    pub product_name: String,

    /// Send pipeline tuning.
    pub dispatch: DispatchConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            changelog_url: DEFAULT_CHANGELOG_URL.to_string(),
            bot_token: String::new(),
            chat_id: String::new(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn with_changelog_url(mut self, url: impl Into<String>) -> Self {
        self.changelog_url = url.into();
        self
    }

    pub fn with_bot_token(mut self, token: impl Into<String>) -> Self {
        self.bot_token = token.into();
        self
    }

    pub fn with_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = chat_id.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = name.into();
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Destination as a typed id.
    pub fn destination(&self) -> ChatId {
        ChatId::new(self.chat_id.trim())
    }

    /// Check required settings, trimming credentials in place.
    ///
    /// Every missing variable is named in one error.
    pub fn validate(&mut self) -> Result<()> {
        self.bot_token = self.bot_token.trim().to_string();
        self.chat_id = self.chat_id.trim().to_string();

        let mut missing = Vec::new();
        if self.bot_token.is_empty() {
            missing.push("TELEGRAM_BOT_TOKEN");
        }
        if self.chat_id.is_empty() {
            missing.push("TELEGRAM_CHAT_ID");
        }
        if !missing.is_empty() {
            return Err(RelayError::Config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(RelayError::Config("Poll interval must be positive".into()));
        }
        if self.changelog_url.trim().is_empty() {
            return Err(RelayError::Config("Changelog URL must not be empty".into()));
        }

        Ok(())
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.bot_token.is_empty() { "MISSING" } else { "***" };
        f.debug_struct("RelayConfig")
            .field("changelog_url", &self.changelog_url)
            .field("bot_token", &token)
            .field("chat_id", &self.chat_id)
            .field("poll_interval", &self.poll_interval)
            .field("store_path", &self.store_path)
            .field("product_name", &self.product_name)
            .field("dispatch", &self.dispatch)
            .finish()
    }
}
