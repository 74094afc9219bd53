//! Merging freshly extracted messages into a curated catalog.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    plural::{PluralRule, default_plural_forms},
    types::{Catalog, Entry, Header, Key},
};

/// What happens to baseline entries that no source mentions any more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Keep them untouched.
    #[default]
    Retain,
    /// Drop them from the merged catalog.
    Prune,
}

impl MergePolicy {
    pub fn from_prune_flag(prune: bool) -> Self {
        if prune {
            MergePolicy::Prune
        } else {
            MergePolicy::Retain
        }
    }
}

/// Counts of what a merge did, by entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MergeReport {
    /// Extracted keys the baseline did not have.
    pub added: usize,
    /// Extracted keys already in the baseline.
    pub updated: usize,
    /// Baseline keys no longer extracted but kept.
    pub retained_stale: usize,
    /// Baseline keys no longer extracted and dropped.
    pub pruned: usize,
}

/// Fills in the header fields a catalog for `locale` needs, leaving fields
/// that are already present alone.
pub fn seed_header(header: &mut Header, domain: &str, locale: &str) {
    let defaults = [
        ("Project-Id-Version", domain.to_string()),
        ("Language", locale.to_string()),
        ("MIME-Version", "1.0".to_string()),
        ("Content-Type", "text/plain; charset=UTF-8".to_string()),
        ("Content-Transfer-Encoding", "8bit".to_string()),
        ("Plural-Forms", default_plural_forms(locale).to_string()),
    ];
    for (name, value) in defaults {
        if header.get(name).is_none() {
            header.set(name, value);
        }
    }
}

/// Merges `extracted` into `baseline` and returns a new catalog.
///
/// For a key present in both, the baseline's translations, flags and
/// translator comments are kept while references, extracted comments and the
/// plural id come from the extraction. A baseline plural message that the
/// sources now use as a singular keeps its plural id and every form. New keys start untranslated, with one
/// empty form per plural form for plural messages. The baseline is not
/// modified; `None` stands for a catalog that does not exist yet.
pub fn merge(
    baseline: Option<&Catalog>,
    extracted: &BTreeMap<Key, Entry>,
    domain: &str,
    locale: &str,
    policy: MergePolicy,
) -> (Catalog, MergeReport) {
    let mut merged = Catalog::new(domain, locale);
    merged.header = baseline.map(|b| b.header.clone()).unwrap_or_default();
    seed_header(&mut merged.header, domain, locale);

    let nplurals = PluralRule::from_header(&merged.header).nplurals();
    let mut report = MergeReport::default();

    for (key, fresh) in extracted {
        let entry = match baseline.and_then(|b| b.entries.get(key)) {
            Some(existing) => {
                report.updated += 1;
                let mut entry = existing.clone();
                entry.references = fresh.references.clone();
                entry.extracted_comments = fresh.extracted_comments.clone();
                match (&existing.msgid_plural, &fresh.msgid_plural) {
                    (Some(kept), None) => tracing::warn!(
                        key = %key,
                        msgid_plural = %kept,
                        "plural message now used as singular, keeping its plural forms"
                    ),
                    (_, fresh_plural) => entry.msgid_plural = fresh_plural.clone(),
                }
                fit_forms(&mut entry, nplurals);
                entry
            }
            None => {
                report.added += 1;
                let mut entry = fresh.clone();
                entry.set_translations(Vec::new());
                fit_forms(&mut entry, nplurals);
                entry
            }
        };
        merged.insert(entry);
    }

    if let Some(baseline) = baseline {
        for (key, stale) in &baseline.entries {
            if key.is_header() || extracted.contains_key(key) {
                continue;
            }
            match policy {
                MergePolicy::Retain => {
                    report.retained_stale += 1;
                    merged.insert(stale.clone());
                }
                MergePolicy::Prune => {
                    tracing::debug!(key = %key, "pruning stale entry");
                    report.pruned += 1;
                }
            }
        }
    }

    (merged, report)
}

/// Pads plural entries to `nplurals` forms. Existing forms are never dropped.
fn fit_forms(entry: &mut Entry, nplurals: usize) {
    if entry.msgid_plural.is_some() && entry.translations.len() < nplurals {
        entry.translations.resize(nplurals, String::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceRef;

    fn extracted(entries: Vec<Entry>) -> BTreeMap<Key, Entry> {
        entries.into_iter().map(|e| (e.key(), e)).collect()
    }

    fn baseline() -> Catalog {
        let mut catalog = Catalog::new("messages", "es");
        catalog.header = Header::parse("Language: es\nPlural-Forms: nplurals=2; plural=(n != 1);\n");
        let mut hello = Entry::new(None, "Hello")
            .with_translations(["Hola"])
            .with_reference(SourceRef::new("old.php", 1));
        hello.flags.insert("fuzzy".to_string());
        hello.comments.push("greeting".to_string());
        catalog.insert(hello);
        catalog.insert(Entry::new(None, "Gone").with_translations(["Ido"]));
        catalog
    }

    #[test]
    fn test_merge_keeps_translations_and_replaces_references() {
        let fresh = extracted(vec![
            Entry::new(None, "Hello").with_reference(SourceRef::new("new.php", 7)),
            Entry::new(None, "World").with_reference(SourceRef::new("new.php", 8)),
        ]);
        let base = baseline();
        let (merged, report) = merge(Some(&base), &fresh, "messages", "es", MergePolicy::Retain);

        let hello = merged.get(None, "Hello").unwrap();
        assert_eq!(hello.translations, vec!["Hola"]);
        assert!(hello.is_fuzzy());
        assert_eq!(hello.comments, vec!["greeting"]);
        assert_eq!(
            hello.references.iter().collect::<Vec<_>>(),
            vec![&SourceRef::new("new.php", 7)]
        );
        assert_eq!(merged.get(None, "World").unwrap().translations, vec![""]);
        assert!(merged.get(None, "Gone").is_some());
        assert_eq!(
            report,
            MergeReport {
                added: 1,
                updated: 1,
                retained_stale: 1,
                pruned: 0
            }
        );
        // Baseline untouched.
        assert_eq!(base, baseline());
    }

    #[test]
    fn test_prune_drops_stale_entries() {
        let fresh = extracted(vec![Entry::new(None, "Hello")]);
        let (merged, report) =
            merge(Some(&baseline()), &fresh, "messages", "es", MergePolicy::Prune);
        assert!(merged.get(None, "Gone").is_none());
        assert_eq!(report.pruned, 1);
        assert_eq!(report.retained_stale, 0);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let fresh = extracted(vec![
            Entry::new(None, "Hello").with_reference(SourceRef::new("a.php", 1)),
            Entry::new(Some("nav"), "Home").with_reference(SourceRef::new("b.php", 2)),
            Entry::new(None, "file")
                .with_plural("files")
                .with_reference(SourceRef::new("c.php", 3)),
        ]);
        for policy in [MergePolicy::Retain, MergePolicy::Prune] {
            let (once, _) = merge(Some(&baseline()), &fresh, "messages", "es", policy);
            let (twice, report) = merge(Some(&once), &fresh, "messages", "es", policy);
            assert_eq!(once, twice);
            assert_eq!(report.added, 0);
        }
    }

    #[test]
    fn test_absent_baseline_seeds_header() {
        let fresh = extracted(vec![Entry::new(None, "file").with_plural("files")]);
        let (merged, report) = merge(None, &fresh, "messages", "ru", MergePolicy::Retain);
        assert_eq!(merged.locale, "ru");
        assert_eq!(merged.domain, "messages");
        assert_eq!(merged.header.language(), Some("ru"));
        assert_eq!(merged.header.charset(), "UTF-8");
        assert!(merged.header.plural_forms().unwrap().starts_with("nplurals=3"));
        assert_eq!(merged.get(None, "file").unwrap().translations, vec!["", "", ""]);
        assert_eq!(report.added, 1);
    }

    #[test]
    fn test_seed_header_keeps_existing_fields() {
        let mut header = Header::parse("Language: pt_BR\nPlural-Forms: nplurals=1; plural=0;\n");
        seed_header(&mut header, "messages", "pt");
        assert_eq!(header.language(), Some("pt_BR"));
        assert_eq!(header.plural_forms(), Some("nplurals=1; plural=0;"));
        assert_eq!(header.get("MIME-Version"), Some("1.0"));
    }

    #[test]
    fn test_plural_shape_change_keeps_curated_forms() {
        let mut base = Catalog::new("messages", "es");
        base.insert(
            Entry::new(None, "apple")
                .with_plural("apples")
                .with_translations(["manzana", "manzanas"]),
        );
        base.insert(Entry::new(None, "pear").with_translations(["pera"]));

        let fresh = extracted(vec![
            Entry::new(None, "apple"),
            Entry::new(None, "pear").with_plural("pears"),
        ]);
        let (merged, _) = merge(Some(&base), &fresh, "messages", "es", MergePolicy::Retain);
        let apple = merged.get(None, "apple").unwrap();
        assert_eq!(apple.msgid_plural.as_deref(), Some("apples"));
        assert_eq!(apple.translations, vec!["manzana", "manzanas"]);
        let pear = merged.get(None, "pear").unwrap();
        assert_eq!(pear.msgid_plural.as_deref(), Some("pears"));
        assert_eq!(pear.translations, vec!["pera", ""]);
    }

    #[test]
    fn test_policy_from_flag() {
        assert_eq!(MergePolicy::from_prune_flag(true), MergePolicy::Prune);
        assert_eq!(MergePolicy::from_prune_flag(false), MergePolicy::default());
    }
}
