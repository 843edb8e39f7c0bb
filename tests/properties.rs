//! Property tests for fingerprinting, parsing, reconciliation and truncation.

use changelog_relay::dispatch::{truncate_message, ELLIPSIS};
use changelog_relay::{parse_changelog, reconcile, ContentHash, DeliveryStore, Timestamp};
use proptest::prelude::*;
use std::collections::BTreeSet;
use tempfile::TempDir;

prop_compose! {
    fn arb_versions()(
        set in prop::collection::btree_set((0u32..20, 0u32..50, 0u32..200), 0..12),
    ) -> Vec<String> {
        set.into_iter()
            .rev()
            .map(|(major, minor, patch)| format!("{}.{}.{}", major, minor, patch))
            .collect()
    }
}

fn arb_body() -> impl Strategy<Value = String> {
    prop::collection::vec("- [a-z]{1,10}( [a-z]{1,10}){0,3}", 0..5).prop_map(|lines| lines.join("\n"))
}

fn render(versions: &[String], bodies: &[String]) -> String {
    let mut doc = String::from("# Changelog\n\n");
    for (version, body) in versions.iter().zip(bodies) {
        doc.push_str(&format!("## {}\n\n{}\n\n", version, body));
    }
    doc
}

proptest! {
    #[test]
    fn fingerprint_ignores_trailing_whitespace(
        lines in prop::collection::vec(("[a-z0-9-][a-z0-9 .]{0,20}", "[ \t]{0,3}"), 1..8),
        crlf in any::<bool>(),
    ) {
        let clean: Vec<&str> = lines.iter().map(|(text, _)| text.as_str()).collect();
        let padded: Vec<String> = lines.iter().map(|(text, pad)| format!("{}{}", text, pad)).collect();
        let sep = if crlf { "\r\n" } else { "\n" };

        prop_assert_eq!(
            ContentHash::of_entry("1.0.0", &clean.join("\n")),
            ContentHash::of_entry("1.0.0", &padded.join(sep))
        );
    }

    #[test]
    fn fingerprint_depends_on_version(body in arb_body()) {
        prop_assert_ne!(
            ContentHash::of_entry("1.0.0", &body),
            ContentHash::of_entry("1.0.1", &body)
        );
    }

    #[test]
    fn parse_recovers_rendered_sections(
        (versions, bodies) in arb_versions().prop_flat_map(|versions| {
            let n = versions.len();
            (Just(versions), prop::collection::vec(arb_body(), n))
        })
    ) {
        let changelog = parse_changelog(&render(&versions, &bodies));

        let parsed: Vec<&str> = changelog.versions();
        let expected: Vec<&str> = versions.iter().map(String::as_str).collect();
        prop_assert_eq!(parsed, expected);

        for (entry, body) in changelog.newest_first().zip(&bodies) {
            prop_assert_eq!(&entry.body, body);
        }
    }

    #[test]
    fn truncation_respects_limit(text in "\\PC{0,300}", max_len in 1usize..200) {
        let out = truncate_message(&text, max_len);
        let len = out.chars().count();

        prop_assert!(len <= max_len);
        if text.chars().count() <= max_len {
            prop_assert_eq!(out.as_ref(), text.as_str());
        } else {
            prop_assert_eq!(len, max_len);
            prop_assert!(out.ends_with(ELLIPSIS));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pending_is_undelivered_in_release_order(
        (versions, delivered) in arb_versions().prop_flat_map(|versions| {
            let n = versions.len();
            (Just(versions), prop::collection::vec(any::<bool>(), n))
        })
    ) {
        let dir = TempDir::new().unwrap();
        let store = DeliveryStore::open(dir.path().join("relay.db")).unwrap();
        let bodies = vec![String::from("- notes"); versions.len()];
        let changelog = parse_changelog(&render(&versions, &bodies));

        reconcile(&changelog, &store).unwrap();
        let mut marked = BTreeSet::new();
        for (version, &done) in versions.iter().zip(&delivered) {
            if done {
                store.mark_delivered(version, Timestamp(1)).unwrap();
                marked.insert(version.clone());
            }
        }

        let pending = reconcile(&changelog, &store).unwrap().pending;
        let expected: Vec<&str> = versions
            .iter()
            .rev()
            .filter(|v| !marked.contains(*v))
            .map(String::as_str)
            .collect();
        prop_assert_eq!(pending.versions(), expected);
    }
}
