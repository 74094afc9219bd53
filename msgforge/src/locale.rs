//! Locale resolution.
//!
//! Which locale a session uses is decided from three inputs: the configured
//! list of supported locales, a hint persisted by the host (cookie, session),
//! and a one-shot override hint (query parameter). Nothing here touches the
//! process environment; the resolved tag travels in a [`LocaleContext`].

use std::sync::Arc;

use serde::Serialize;
use unic_langid::LanguageIdentifier;

use crate::{error::Error, translator::Translator, types::Catalog};

/// Ordered, de-duplicated, non-empty list of locale tags. The first tag is the
/// default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedLocales {
    tags: Vec<String>,
}

impl SupportedLocales {
    /// Validates `tags` and moves `default` to the front.
    ///
    /// Tags may use underscores (`en_US`). Duplicates are dropped, keeping the
    /// first occurrence. An explicit `default` must be one of the tags.
    pub fn new<I, S>(tags: I, default: Option<&str>) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.into();
            parse_tag(&tag)?;
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        if unique.is_empty() {
            return Err(Error::configuration("at least one locale must be configured"));
        }
        if let Some(default) = default {
            let position = unique.iter().position(|t| t == default).ok_or_else(|| {
                Error::configuration(format!(
                    "default locale `{}` is not one of the configured locales",
                    default
                ))
            })?;
            let tag = unique.remove(position);
            unique.insert(0, tag);
        }
        Ok(SupportedLocales { tags: unique })
    }

    pub fn default_tag(&self) -> &str {
        &self.tags[0]
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Parses a tag, accepting underscores as subtag separators.
pub fn parse_tag(tag: &str) -> Result<LanguageIdentifier, Error> {
    tag.replace('_', "-")
        .parse::<LanguageIdentifier>()
        .map_err(|e| Error::configuration(format!("invalid locale `{}`: {}", tag, e)))
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub tag: String,
    /// True exactly when the override changed the outcome, i.e. the host should
    /// store `tag` as the new persisted hint.
    pub should_persist: bool,
}

/// Resolves the active locale.
///
/// The persisted hint is used when supported, otherwise the default. A
/// supported override that differs from that result replaces it.
///
/// # Example
///
/// ```
/// use msgforge::locale::{SupportedLocales, resolve};
///
/// let supported = SupportedLocales::new(["en_US", "es", "fr"], None).unwrap();
/// let resolution = resolve(&supported, Some("es"), Some("fr"));
/// assert_eq!(resolution.tag, "fr");
/// assert!(resolution.should_persist);
/// ```
pub fn resolve(
    supported: &SupportedLocales,
    persisted: Option<&str>,
    override_hint: Option<&str>,
) -> Resolution {
    let current = persisted
        .filter(|tag| supported.contains(tag))
        .unwrap_or_else(|| supported.default_tag());

    match override_hint {
        Some(hint) if hint != current && supported.contains(hint) => Resolution {
            tag: hint.to_string(),
            should_persist: true,
        },
        _ => Resolution {
            tag: current.to_string(),
            should_persist: false,
        },
    }
}

/// Request-scoped locale state: the resolved tag and a translator over its
/// catalog.
#[derive(Debug, Clone)]
pub struct LocaleContext {
    resolution: Resolution,
    translator: Translator,
}

impl LocaleContext {
    pub fn new(resolution: Resolution, catalog: Arc<Catalog>) -> Self {
        LocaleContext {
            resolution,
            translator: Translator::new(catalog),
        }
    }

    pub fn tag(&self) -> &str {
        &self.resolution.tag
    }

    pub fn should_persist(&self) -> bool {
        self.resolution.should_persist
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supported() -> SupportedLocales {
        SupportedLocales::new(["en_US", "es", "fr"], None).unwrap()
    }

    #[test]
    fn test_no_hints_uses_default() {
        let r = resolve(&supported(), None, None);
        assert_eq!(r.tag, "en_US");
        assert!(!r.should_persist);
    }

    #[test]
    fn test_supported_persisted_hint_wins() {
        let r = resolve(&supported(), Some("es"), None);
        assert_eq!(r.tag, "es");
        assert!(!r.should_persist);
    }

    #[test]
    fn test_unsupported_persisted_hint_falls_back() {
        let r = resolve(&supported(), Some("de"), None);
        assert_eq!(r.tag, "en_US");
        assert!(!r.should_persist);
    }

    #[test]
    fn test_override_changes_outcome() {
        let r = resolve(&supported(), Some("es"), Some("fr"));
        assert_eq!(r.tag, "fr");
        assert!(r.should_persist);
    }

    #[test]
    fn test_override_equal_to_current_does_not_persist() {
        let r = resolve(&supported(), Some("es"), Some("es"));
        assert_eq!(r.tag, "es");
        assert!(!r.should_persist);
    }

    #[test]
    fn test_unsupported_override_is_ignored() {
        let r = resolve(&supported(), Some("es"), Some("de"));
        assert_eq!(r.tag, "es");
        assert!(!r.should_persist);
    }

    #[test]
    fn test_override_default_without_persisted_hint() {
        let r = resolve(&supported(), None, Some("en_US"));
        assert_eq!(r.tag, "en_US");
        assert!(!r.should_persist);
    }

    #[test]
    fn test_supported_locales_dedup_and_default() {
        let locales = SupportedLocales::new(["en_US", "es", "en_US", "fr"], Some("fr")).unwrap();
        assert_eq!(locales.iter().collect::<Vec<_>>(), vec!["fr", "en_US", "es"]);
        assert_eq!(locales.default_tag(), "fr");
        assert_eq!(locales.len(), 3);
    }

    #[test]
    fn test_supported_locales_errors() {
        assert!(matches!(
            SupportedLocales::new(Vec::<String>::new(), None),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            SupportedLocales::new(["en", "es"], Some("de")),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            SupportedLocales::new(["en", "not a locale"], None),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_locale_context() {
        let resolution = resolve(&supported(), None, Some("es"));
        let mut catalog = Catalog::new("messages", "es");
        catalog.insert(crate::types::Entry::new(None, "Hello").with_translations(["Hola"]));
        let context = LocaleContext::new(resolution, Arc::new(catalog));
        assert_eq!(context.tag(), "es");
        assert!(context.should_persist());
        assert_eq!(context.translator().gettext("Hello"), "Hola");
    }
}
