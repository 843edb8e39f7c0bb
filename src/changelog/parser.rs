//! Line-oriented changelog parser.

use crate::types::VersionEntry;
use regex::Regex;
use std::sync::OnceLock;

/// `## X.Y.Z` with optional trailing whitespace and nothing else.
const VERSION_HEADER_PATTERN: &str = r"^##\s+(\d+\.\d+\.\d+)\s*$";

fn version_header() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| Regex::new(VERSION_HEADER_PATTERN).expect("valid header pattern"))
}

/// Parsed changelog in document order (newest release first).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Changelog {
    entries: Vec<VersionEntry>,
}

impl Changelog {
    /// Build from entries already in newest-first order.
    pub fn from_newest_first(entries: Vec<VersionEntry>) -> Self {
        Self { entries }
    }

    /// Entries in document order, newest first.
    pub fn newest_first(&self) -> impl DoubleEndedIterator<Item = &VersionEntry> + '_ {
        self.entries.iter()
    }

    /// Entries in release order, oldest first.
    pub fn oldest_first(&self) -> impl DoubleEndedIterator<Item = &VersionEntry> + '_ {
        self.entries.iter().rev()
    }

    /// Version tokens in document order.
    pub fn versions(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.version.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<VersionEntry> {
        self.entries
    }
}

/// Entry being accumulated while scanning.
struct OpenSection<'a> {
    version: &'a str,
    lines: Vec<&'a str>,
}

impl OpenSection<'_> {
    fn finish(self) -> VersionEntry {
        let lines = &self.lines;
        let start = lines
            .iter()
            .position(|l| !l.trim().is_empty())
            .unwrap_or(lines.len());
        let end = lines
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .map_or(start, |i| i + 1);

        VersionEntry::new(self.version, lines[start..end].join("\n"))
    }
}

/// Parse a changelog document.
///
/// Lines before the first version header are treated as preamble and
/// dropped. Anything that is not a well-formed header (e.g. `## 1.2`,
/// `## Unreleased`) is body text of the section it appears in. Duplicate
/// headers produce duplicate entries, in document order.
pub fn parse_changelog(document: &str) -> Changelog {
    let header = version_header();
    let mut entries = Vec::new();
    let mut current: Option<OpenSection<'_>> = None;

    for line in document.lines() {
        if let Some(caps) = header.captures(line) {
            if let Some(section) = current.take() {
                entries.push(section.finish());
            }
            let version = caps.get(1).map_or("", |m| m.as_str());
            current = Some(OpenSection {
                version,
                lines: Vec::new(),
            });
        } else if let Some(section) = current.as_mut() {
            section.lines.push(line);
        }
    }

    if let Some(section) = current.take() {
        entries.push(section.finish());
    }

    Changelog { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Changelog

## 2.0.0

- Breaking change
- Another

  Indented continuation

## 1.1.0
- Feature

## 1.0.0

- Initial release
";

    #[test]
    fn test_parse_sections_newest_first() {
        let changelog = parse_changelog(SAMPLE);
        assert_eq!(changelog.versions(), vec!["2.0.0", "1.1.0", "1.0.0"]);

        let entries = changelog.into_entries();
        assert_eq!(
            entries[0].body,
            "- Breaking change\n- Another\n\n  Indented continuation"
        );
        assert_eq!(entries[1].body, "- Feature");
        assert_eq!(entries[2].body, "- Initial release");
    }

    #[test]
    fn test_body_excludes_header_lines() {
        let changelog = parse_changelog(SAMPLE);
        for entry in changelog.newest_first() {
            assert!(!entry.body.contains("## "));
        }
    }

    #[test]
    fn test_oldest_first_is_reverse() {
        let changelog = parse_changelog(SAMPLE);
        let oldest: Vec<_> = changelog.oldest_first().map(|e| e.version.clone()).collect();
        assert_eq!(oldest, vec!["1.0.0", "1.1.0", "2.0.0"]);
    }

    #[test]
    fn test_empty_and_preamble_only() {
        assert!(parse_changelog("").is_empty());
        assert!(parse_changelog("# Changelog\n\nSome intro text\n").is_empty());
    }

    #[test]
    fn test_malformed_headers_are_body_text() {
        let doc = "## 1.0.0\n- a\n## 1.0\n## Unreleased\n###  2.0.0\n## v3.0.0\n";
        let changelog = parse_changelog(doc);
        assert_eq!(changelog.versions(), vec!["1.0.0"]);
        let entry = &changelog.into_entries()[0];
        assert_eq!(entry.body, "- a\n## 1.0\n## Unreleased\n###  2.0.0\n## v3.0.0");
    }

    #[test]
    fn test_header_tolerates_trailing_whitespace_and_crlf() {
        let doc = "## 1.2.3   \r\n- fix\r\n##\t1.2.2\r\n- older\r\n";
        let changelog = parse_changelog(doc);
        assert_eq!(changelog.versions(), vec!["1.2.3", "1.2.2"]);
        assert_eq!(changelog.into_entries()[0].body, "- fix");
    }

    #[test]
    fn test_header_with_trailing_text_is_not_a_header() {
        let changelog = parse_changelog("## 1.0.0\n- a\n## 1.1.0 (beta)\n- b\n");
        assert_eq!(changelog.versions(), vec!["1.0.0"]);
    }

    #[test]
    fn test_empty_section_has_empty_body() {
        let changelog = parse_changelog("## 1.0.1\n\n\n## 1.0.0\n- x\n");
        let entries = changelog.into_entries();
        assert_eq!(entries[0].version, "1.0.1");
        assert_eq!(entries[0].body, "");
    }

    #[test]
    fn test_duplicate_headers_kept_in_order() {
        let changelog = parse_changelog("## 1.0.0\n- newer\n## 1.0.0\n- older\n");
        let entries = changelog.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].body, "- newer");
        assert_eq!(entries[1].body, "- older");
    }
}
