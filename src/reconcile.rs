//! Reconciliation of a parsed changelog against delivery state.
//!
//! Two passes: every parsed entry is upserted first (so fingerprints track
//! the document even for delivered versions), then the store's undelivered
//! set is intersected with the document and ordered by the document. The
//! store has no notion of release order; the changelog is the only source
//! of chronology.

use crate::changelog::Changelog;
use crate::error::Result;
use crate::store::DeliveryStore;
use crate::types::VersionEntry;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Entries awaiting delivery, oldest release first.
///
/// Only [`reconcile`] builds these, from the changelog's own order, so a
/// batch is always in release order and never holds a version twice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingBatch {
    entries: Vec<VersionEntry>,
}

impl PendingBatch {
    pub fn entries(&self) -> &[VersionEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VersionEntry> {
        self.entries.iter()
    }

    pub fn versions(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.version.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a PendingBatch {
    type Item = &'a VersionEntry;
    type IntoIter = std::slice::Iter<'a, VersionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Outcome of one reconciliation pass.
#[derive(Clone, Debug, Default)]
pub struct Reconciliation {
    /// Distinct versions in the document.
    pub parsed: usize,

    /// Versions the store had never seen before this pass, oldest first.
    pub new_versions: Vec<String>,

    /// Everything that still needs a send attempt, new or old.
    pub pending: PendingBatch,
}

/// Bring the store up to date with `changelog` and compute what to send.
///
/// When a version header appears more than once, the topmost section wins
/// and the others are ignored.
pub fn reconcile(changelog: &Changelog, store: &DeliveryStore) -> Result<Reconciliation> {
    let known = store.get_known_versions();

    let mut seen = HashSet::new();
    let mut unique: Vec<&VersionEntry> = Vec::with_capacity(changelog.len());
    for entry in changelog.newest_first() {
        if seen.insert(entry.version.as_str()) {
            unique.push(entry);
        } else {
            warn!(version = %entry.version, "Duplicate version header, keeping the topmost section");
        }
    }
    unique.reverse();
    let chronological = unique;

    for entry in &chronological {
        store.upsert(&entry.version, entry.content_hash(), &entry.body, None)?;
    }

    let undelivered: HashSet<String> = store.get_undelivered_versions().into_iter().collect();

    let new_versions: Vec<String> = chronological
        .iter()
        .filter(|e| !known.contains(&e.version))
        .map(|e| e.version.clone())
        .collect();

    let entries: Vec<VersionEntry> = chronological
        .iter()
        .filter(|e| undelivered.contains(&e.version))
        .map(|e| (*e).clone())
        .collect();

    debug!(
        parsed = chronological.len(),
        known = known.len(),
        new = new_versions.len(),
        pending = entries.len(),
        "Reconciled changelog"
    );

    Ok(Reconciliation {
        parsed: chronological.len(),
        new_versions,
        pending: PendingBatch { entries },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::parse_changelog;
    use crate::types::Timestamp;
    use tempfile::TempDir;

    const DOC: &str = "# Changelog\n\n## 3.0.0\n- c\n\n## 2.0.0\n- b\n\n## 1.0.0\n- a\n";

    fn open(dir: &TempDir) -> DeliveryStore {
        DeliveryStore::open(dir.path().join("relay.db")).unwrap()
    }

    #[test]
    fn test_fresh_store_everything_pending_oldest_first() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        let result = reconcile(&parse_changelog(DOC), &store).unwrap();
        assert_eq!(result.parsed, 3);
        assert_eq!(result.pending.versions(), vec!["1.0.0", "2.0.0", "3.0.0"]);
        assert_eq!(result.new_versions, vec!["1.0.0", "2.0.0", "3.0.0"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_resumes_undelivered_in_document_order() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        let old = parse_changelog("## 2.0.0\n- b\n## 1.0.0\n- a\n");
        reconcile(&old, &store).unwrap();
        store.mark_delivered("1.0.0", Timestamp::now()).unwrap();

        let result = reconcile(&parse_changelog(DOC), &store).unwrap();
        assert_eq!(result.pending.versions(), vec!["2.0.0", "3.0.0"]);
        assert_eq!(result.new_versions, vec!["3.0.0"]);
    }

    #[test]
    fn test_order_follows_document_not_version_strings() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        let doc = "## 1.10.0\n- x\n## 1.9.0\n- y\n## 1.2.0\n- z\n";
        let result = reconcile(&parse_changelog(doc), &store).unwrap();
        assert_eq!(result.pending.versions(), vec!["1.2.0", "1.9.0", "1.10.0"]);
    }

    #[test]
    fn test_content_change_does_not_requeue_delivered() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        reconcile(&parse_changelog("## 1.0.0\n- a\n"), &store).unwrap();
        store.mark_delivered("1.0.0", Timestamp(1)).unwrap();

        let result = reconcile(&parse_changelog("## 1.0.0\n- a, reworded\n"), &store).unwrap();
        assert!(result.pending.is_empty());

        let record = store.get("1.0.0").unwrap();
        assert_eq!(record.content, "- a, reworded");
        assert!(record.delivered);
        assert_eq!(record.posted_at, Some(Timestamp(1)));
    }

    #[test]
    fn test_undelivered_versions_missing_from_document_are_not_pending() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        reconcile(&parse_changelog("## 0.9.0\n- gone later\n"), &store).unwrap();

        let result = reconcile(&parse_changelog(DOC), &store).unwrap();
        assert_eq!(result.pending.versions(), vec!["1.0.0", "2.0.0", "3.0.0"]);
        assert!(store.get("0.9.0").is_some());
    }

    #[test]
    fn test_duplicate_headers_topmost_wins() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        let doc = "## 2.0.0\n- top\n## 1.0.0\n- a\n## 2.0.0\n- bottom\n";
        let result = reconcile(&parse_changelog(doc), &store).unwrap();

        assert_eq!(result.parsed, 2);
        assert_eq!(result.pending.versions(), vec!["1.0.0", "2.0.0"]);
        assert_eq!(result.pending.entries()[1].body, "- top");
        assert_eq!(store.get("2.0.0").unwrap().content, "- top");
    }

    #[test]
    fn test_empty_changelog() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        let result = reconcile(&parse_changelog(""), &store).unwrap();
        assert_eq!(result.parsed, 0);
        assert!(result.pending.is_empty());
        assert!(store.is_empty());
    }
}
