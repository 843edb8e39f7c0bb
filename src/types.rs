//! Core types for the changelog relay.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Content fingerprint for a version entry (SHA-256).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Fingerprint a version and its release notes.
    ///
    /// Each body line has its trailing whitespace stripped and lines are
    /// rejoined with `\n`, so CRLF vs LF and trailing spaces never change
    /// the digest while any other edit does.
    pub fn of_entry(version: &str, body: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(version.as_bytes());
        hasher.update(b"\n\n");
        for (i, line) in body.lines().enumerate() {
            if i > 0 {
                hasher.update(b"\n");
            }
            hasher.update(line.trim_end().as_bytes());
        }
        ContentHash(hasher.finalize().into())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(ContentHash(arr))
    }

    /// First eight hex characters, for log lines and listings.
    pub fn short(&self) -> String {
        hex::encode(&self.0[0..4])
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}...)", self.short())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as i64)
    }

    /// Render as RFC 3339 in UTC, e.g. `2025-06-01T12:00:00.000000Z`.
    pub fn to_rfc3339(&self) -> String {
        match DateTime::<Utc>::from_timestamp_micros(self.0) {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Micros, true),
            None => format!("@{}us", self.0),
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

/// One version section of the changelog.
///
/// Rebuilt on every fetch; never persisted directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionEntry {
    /// Version token from the header, e.g. `1.0.42`.
    pub version: String,

    /// Release notes, with leading and trailing blank lines removed.
    pub body: String,
}

impl VersionEntry {
    pub fn new(version: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            body: body.into(),
        }
    }

    /// Stable fingerprint over version and normalized body.
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of_entry(&self.version, &self.body)
    }
}

/// Durable delivery state for one version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Fingerprint of the last-seen body.
    pub content_hash: ContentHash,

    /// Last-seen body.
    pub content: String,

    /// When the send was confirmed.
    pub posted_at: Option<Timestamp>,

    /// Set once, only after the transport acknowledged the send.
    pub delivered: bool,
}

/// Opaque chat destination identifier (numeric id or `@channel` name).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        ChatId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChatId({})", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_roundtrip() {
        let hash = ContentHash::of_entry("1.0.0", "- Fixed a bug");
        let hex = hash.to_hex();
        let parsed = ContentHash::from_hex(&hex).unwrap();
        assert_eq!(hash, parsed);
        assert_eq!(hash.short().len(), 8);
    }

    #[test]
    fn test_hash_ignores_trailing_whitespace_and_crlf() {
        let a = ContentHash::of_entry("1.0.0", "- one\n- two\n\n- three");
        let b = ContentHash::of_entry("1.0.0", "- one   \r\n- two\t\r\n\r\n- three  ");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_sensitive_to_content() {
        let base = ContentHash::of_entry("1.0.0", "- one\n- two");
        assert_ne!(base, ContentHash::of_entry("1.0.1", "- one\n- two"));
        assert_ne!(base, ContentHash::of_entry("1.0.0", "- one\n-  two"));
        assert_ne!(base, ContentHash::of_entry("1.0.0", " - one\n- two"));
        assert_ne!(base, ContentHash::of_entry("1.0.0", "- one\n\n- two"));
    }

    #[test]
    fn test_hash_matches_digest_layout() {
        let mut hasher = Sha256::new();
        hasher.update(b"2.1.0\n\n- a\n- b");
        let expected = ContentHash(hasher.finalize().into());
        assert_eq!(ContentHash::of_entry("2.1.0", "- a  \n- b"), expected);
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = Timestamp(1_700_000_000_000_000);
        assert_eq!(ts.to_rfc3339(), "2023-11-14T22:13:20.000000Z");
        assert!(Timestamp::now() > ts);
    }
}
