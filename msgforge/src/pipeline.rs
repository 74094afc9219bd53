//! End-to-end operations over one configuration: scan, refresh, compile, and
//! loading catalogs for runtime use.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use serde::Serialize;

use crate::{
    config::Config,
    error::Error,
    extract::{ExtractorRegistry, extract_files},
    formats::FormatType,
    locale::{LocaleContext, Resolution, SupportedLocales, resolve},
    merge::{MergePolicy, MergeReport, merge, seed_header},
    scan::SourceScanner,
    store::CatalogStore,
    translator::{ShorthandGuard, Translator},
    types::{Catalog, Entry, Key},
};

/// Translation coverage of one locale's text catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocaleStats {
    pub locale: String,
    pub total: usize,
    pub translated: usize,
    pub fuzzy: usize,
}

impl LocaleStats {
    fn of(catalog: &Catalog) -> Self {
        LocaleStats {
            locale: catalog.locale.clone(),
            total: catalog.len(),
            translated: catalog.translated_count(),
            fuzzy: catalog.iter().filter(|e| e.is_fuzzy()).count(),
        }
    }

    /// Share of translated entries, 100 for an empty catalog.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.translated as f64 * 100.0 / self.total as f64
        }
    }
}

/// Wires scanner, extractors, merger and store together from a [`Config`].
pub struct Pipeline {
    config: Config,
    locales: SupportedLocales,
    registry: ExtractorRegistry,
    store: CatalogStore,
    runtime_formats: Vec<FormatType>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        Ok(Pipeline {
            locales: config.supported_locales()?,
            registry: config.registry()?,
            store: config.store(),
            runtime_formats: config.runtime_formats()?,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn locales(&self) -> &SupportedLocales {
        &self.locales
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    fn ensure_supported(&self, locale: &str) -> Result<(), Error> {
        if self.locales.contains(locale) {
            Ok(())
        } else {
            Err(Error::configuration(format!(
                "locale `{}` is not one of the configured locales",
                locale
            )))
        }
    }

    /// Scans every source root and extracts the messages of the configured
    /// domain. References are relative to the configuration directory.
    pub fn scan(&self) -> Result<BTreeMap<Key, Entry>, Error> {
        let scanner = SourceScanner::new(self.config.source_roots())?;
        let files = scanner.files().collect::<Result<Vec<PathBuf>, Error>>()?;
        tracing::debug!(files = files.len(), "scanned source roots");

        let base = self.config.base_dir().canonicalize().ok();
        extract_files(&self.registry, files, &self.config.domain, base.as_deref())
    }

    /// Scans sources, merges them into `locale`'s text catalog and saves all
    /// representations.
    pub fn refresh(&self, locale: &str) -> Result<MergeReport, Error> {
        self.ensure_supported(locale)?;
        let extracted = self.scan()?;
        self.refresh_with(locale, &extracted, self.config.merge_policy())
    }

    /// Like [`Pipeline::refresh`] for every configured locale, scanning once.
    pub fn refresh_all(&self) -> Result<Vec<(String, MergeReport)>, Error> {
        let extracted = self.scan()?;
        self.locales
            .iter()
            .map(|locale| {
                self.refresh_with(locale, &extracted, self.config.merge_policy())
                    .map(|report| (locale.to_string(), report))
            })
            .collect()
    }

    /// Merges an already extracted entry set into `locale` and saves it.
    pub fn refresh_with(
        &self,
        locale: &str,
        extracted: &BTreeMap<Key, Entry>,
        policy: MergePolicy,
    ) -> Result<MergeReport, Error> {
        self.ensure_supported(locale)?;
        let mut report = MergeReport::default();
        self.store.update(locale, |baseline| {
            let (merged, merge_report) = merge(
                baseline.as_ref(),
                extracted,
                &self.config.domain,
                locale,
                policy,
            );
            report = merge_report;
            Ok(merged)
        })?;
        tracing::info!(
            locale,
            added = report.added,
            updated = report.updated,
            retained_stale = report.retained_stale,
            pruned = report.pruned,
            "refreshed catalog"
        );
        Ok(report)
    }

    /// The curated text catalog of `locale`, refreshed from sources first when
    /// `refresh` is set. A locale without a catalog yields an empty one.
    pub fn entries(&self, locale: &str, refresh: bool) -> Result<Catalog, Error> {
        self.ensure_supported(locale)?;
        if refresh {
            self.refresh(locale)?;
        }
        Ok(self
            .store
            .load(locale, FormatType::Po)?
            .unwrap_or_else(|| Catalog::new(&self.config.domain, locale)))
    }

    /// Applies curated translations to `locale` and saves all representations.
    ///
    /// Unknown keys are added as new entries. Edited entries lose their
    /// `fuzzy` flag.
    pub fn set_translations<I>(&self, locale: &str, translations: I) -> Result<Catalog, Error>
    where
        I: IntoIterator<Item = (Key, Vec<String>)>,
    {
        self.ensure_supported(locale)?;
        self.store.update(locale, |baseline| {
            let mut catalog =
                baseline.unwrap_or_else(|| Catalog::new(&self.config.domain, locale));
            seed_header(&mut catalog.header, &self.config.domain, locale);
            for (key, forms) in translations {
                if key.is_header() {
                    continue;
                }
                match catalog.entries.get_mut(&key) {
                    Some(entry) => {
                        entry.set_translations(forms);
                        entry.flags.remove("fuzzy");
                    }
                    None => {
                        let entry = Entry::new(key.context.as_deref(), &key.msgid);
                        catalog.insert(entry.with_translations(forms));
                    }
                }
            }
            Ok(catalog)
        })
    }

    /// Regenerates the runtime representations of `locale` from its text
    /// catalog.
    pub fn compile(&self, locale: &str) -> Result<Catalog, Error> {
        self.ensure_supported(locale)?;
        self.store.update(locale, |baseline| {
            baseline.ok_or_else(|| {
                Error::configuration(format!(
                    "no text catalog for locale `{}` at {}",
                    locale,
                    self.store.path_for(locale, FormatType::Po).display()
                ))
            })
        })
    }

    /// Loads `locale` for runtime lookup using the configured format preference.
    pub fn load_runtime(&self, locale: &str) -> Result<Arc<Catalog>, Error> {
        self.store
            .load_preferred(locale, &self.runtime_formats)
            .map(Arc::new)
    }

    pub fn translator(&self, locale: &str) -> Result<Translator, Error> {
        self.load_runtime(locale).map(Translator::new)
    }

    pub fn resolve(&self, persisted: Option<&str>, override_hint: Option<&str>) -> Resolution {
        resolve(&self.locales, persisted, override_hint)
    }

    /// Resolves the locale for one request and loads its catalog.
    pub fn context(
        &self,
        persisted: Option<&str>,
        override_hint: Option<&str>,
    ) -> Result<LocaleContext, Error> {
        let resolution = self.resolve(persisted, override_hint);
        let catalog = self.load_runtime(&resolution.tag)?;
        Ok(LocaleContext::new(resolution, catalog))
    }

    /// Installs the thread-local shorthand for `context`, unless disabled by
    /// the `functions` option.
    pub fn install_shorthand(&self, context: &LocaleContext) -> Option<ShorthandGuard> {
        self.config
            .functions
            .then(|| context.translator().install())
    }

    /// Coverage of every configured locale's text catalog.
    pub fn stats(&self) -> Result<Vec<LocaleStats>, Error> {
        self.locales
            .iter()
            .map(|locale| self.entries(locale, false).map(|c| LocaleStats::of(&c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> (TempDir, Pipeline) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::create_dir_all(dir.path().join("resources/views")).unwrap();
        fs::write(
            dir.path().join("app/Controller.php"),
            "<?php\nreturn __('Hello');\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("resources/views/home.blade.php"),
            "<h1>{{ __('Welcome') }}</h1>\n",
        )
        .unwrap();
        let config = Config::from_toml("locales = [\"en_US\", \"es\"]", dir.path()).unwrap();
        let pipeline = Pipeline::new(config).unwrap();
        (dir, pipeline)
    }

    #[test]
    fn test_scan_uses_relative_references() {
        let (_dir, pipeline) = project();
        let entries = pipeline.scan().unwrap();
        assert_eq!(entries.len(), 2);
        let welcome = &entries[&Key::new(None, "Welcome")];
        assert_eq!(
            welcome.references.iter().next().unwrap().to_string(),
            "resources/views/home.blade.php:1"
        );
    }

    #[test]
    fn test_refresh_unknown_locale_fails() {
        let (_dir, pipeline) = project();
        assert!(matches!(
            pipeline.refresh("de"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_compile_without_text_catalog_fails() {
        let (_dir, pipeline) = project();
        assert!(matches!(pipeline.compile("es"), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_install_shorthand_respects_functions_option() {
        let (dir, _) = project();
        let config =
            Config::from_toml("locales = [\"es\"]\nfunctions = false", dir.path()).unwrap();
        let pipeline = Pipeline::new(config).unwrap();
        let context = pipeline.context(None, None).unwrap();
        assert!(pipeline.install_shorthand(&context).is_none());
    }

    #[test]
    fn test_stats_percent() {
        let stats = LocaleStats {
            locale: "es".into(),
            total: 4,
            translated: 1,
            fuzzy: 0,
        };
        assert_eq!(stats.percent(), 25.0);
        let empty = LocaleStats {
            locale: "es".into(),
            total: 0,
            translated: 0,
            fuzzy: 0,
        };
        assert_eq!(empty.percent(), 100.0);
    }
}
