//! Changelog parsing.
//!
//! The source document is a markdown file with one `## X.Y.Z` section per
//! release, newest release first. Parsing turns it into an ordered
//! [`Changelog`] of [`VersionEntry`](crate::types::VersionEntry) values.
//!
//! # Example
//!
//! ```
//! use changelog_relay::changelog::parse_changelog;
//!
//! let changelog = parse_changelog("# Changelog\n\n## 1.1.0\n\n- New\n\n## 1.0.0\n\n- First\n");
//! let versions: Vec<_> = changelog.oldest_first().map(|e| e.version.as_str()).collect();
//! assert_eq!(versions, ["1.0.0", "1.1.0"]);
//! ```

mod parser;

pub use parser::{parse_changelog, Changelog};
