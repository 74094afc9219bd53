//! Configuration loaded from a TOML file.
//!
//! ```toml
//! locales = ["en_US", "es", "fr"]
//! default = "en_US"
//! directories = ["app", "resources"]
//! storage = "resources/gettext"
//! domain = "messages"
//! formats = ["native", "mo", "po"]
//!
//! [[extractors]]
//! pattern = "*.blade.php"
//! dialect = "templated"
//!
//! [[extractors]]
//! pattern = "*.php"
//! dialect = "plain"
//!
//! [markers.plain]
//! t = "id"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    extract::{Dialect, ExtractorRegistry, MarkerShape, MarkerTable},
    formats::FormatType,
    locale::SupportedLocales,
    merge::MergePolicy,
    store::CatalogStore,
};

/// One `pattern → dialect` rule of the extractor registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorRule {
    pub pattern: String,
    pub dialect: Dialect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Supported locale tags; the first is the default unless `default` is set.
    pub locales: Vec<String>,

    pub default: Option<String>,

    /// Source roots to scan.
    pub directories: Vec<PathBuf>,

    /// Root of the catalog tree.
    pub storage: PathBuf,

    pub domain: String,

    /// When set, runtime loading only reads the compiled binary catalog.
    pub native: bool,

    /// Whether the thread-local `__`/`n__`/`p__` shorthand may be installed.
    pub functions: bool,

    /// Runtime load preference, by format name.
    pub formats: Vec<String>,

    /// Name under which the host stores the persisted locale hint.
    pub locale_hint_key: String,

    /// Drop stale entries on refresh instead of keeping them.
    pub prune_stale: bool,

    pub extractors: Vec<ExtractorRule>,

    /// Per-dialect marker overrides: dialect name → marker name → shape.
    pub markers: BTreeMap<String, BTreeMap<String, MarkerShape>>,

    #[serde(skip)]
    base_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            locales: vec!["en_US".to_string()],
            default: None,
            directories: vec![PathBuf::from("app"), PathBuf::from("resources")],
            storage: PathBuf::from("resources/gettext"),
            domain: "messages".to_string(),
            native: false,
            functions: true,
            formats: FormatType::DEFAULT_PREFERENCE
                .iter()
                .map(ToString::to_string)
                .collect(),
            locale_hint_key: "locale".to_string(),
            prune_stale: false,
            extractors: ExtractorRegistry::DEFAULT_PATTERNS
                .iter()
                .map(|(pattern, dialect)| ExtractorRule {
                    pattern: pattern.to_string(),
                    dialect: *dialect,
                })
                .collect(),
            markers: BTreeMap::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Loads and validates a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::from_toml(&content, base_dir)
    }

    /// Parses and validates TOML, resolving relative paths against `base_dir`.
    pub fn from_toml(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let mut config: Config = toml::from_str(content)?;
        config.base_dir = base_dir.into();
        config.validate()?;
        Ok(config)
    }

    /// Replaces the directory relative paths are resolved against.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Checks everything that can be checked without touching source roots.
    pub fn validate(&self) -> Result<(), Error> {
        self.supported_locales()?;
        self.runtime_formats()?;
        self.marker_tables()?;
        if self.domain.trim().is_empty() {
            return Err(Error::configuration("domain must not be empty"));
        }
        if self.extractors.is_empty() {
            return Err(Error::configuration("at least one extractor must be configured"));
        }
        Ok(())
    }

    pub fn supported_locales(&self) -> Result<SupportedLocales, Error> {
        SupportedLocales::new(self.locales.iter().cloned(), self.default.as_deref())
    }

    /// Format preference for runtime loading.
    pub fn runtime_formats(&self) -> Result<Vec<FormatType>, Error> {
        let formats = self
            .formats
            .iter()
            .map(|name| {
                FormatType::from_str(name).map_err(|_| {
                    Error::configuration(format!("unknown catalog format `{}`", name))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if self.native {
            return Ok(vec![FormatType::Mo]);
        }
        if formats.is_empty() {
            return Err(Error::configuration("at least one format must be configured"));
        }
        Ok(formats)
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn source_roots(&self) -> Vec<PathBuf> {
        self.directories
            .iter()
            .map(|dir| self.resolve_path(dir))
            .collect()
    }

    pub fn storage_root(&self) -> PathBuf {
        self.resolve_path(&self.storage)
    }

    pub fn store(&self) -> CatalogStore {
        CatalogStore::new(self.storage_root(), self.domain.clone())
    }

    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy::from_prune_flag(self.prune_stale)
    }

    fn marker_tables(&self) -> Result<(MarkerTable, MarkerTable), Error> {
        let mut plain = MarkerTable::default();
        let mut templated = MarkerTable::default();
        for (dialect, overrides) in &self.markers {
            let overrides = overrides.iter().map(|(name, shape)| (name.clone(), *shape));
            match Dialect::from_str(dialect)? {
                Dialect::Plain => plain = plain.with_overrides(overrides),
                Dialect::Templated => templated = templated.with_overrides(overrides),
            }
        }
        Ok((plain, templated))
    }

    /// Builds the extractor registry from `extractors` and `markers`.
    pub fn registry(&self) -> Result<ExtractorRegistry, Error> {
        let (plain, templated) = self.marker_tables()?;
        let patterns: Vec<(&str, Dialect)> = self
            .extractors
            .iter()
            .map(|rule| (rule.pattern.as_str(), rule.dialect))
            .collect();
        ExtractorRegistry::new(&patterns, plain, templated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("", "/srv/app").unwrap();
        assert_eq!(config.locales, vec!["en_US"]);
        assert_eq!(config.domain, "messages");
        assert!(config.functions);
        assert!(!config.native);
        assert!(!config.prune_stale);
        assert_eq!(config.locale_hint_key, "locale");
        assert_eq!(
            config.runtime_formats().unwrap(),
            vec![FormatType::Native, FormatType::Mo, FormatType::Po]
        );
        assert_eq!(config.storage_root(), PathBuf::from("/srv/app/resources/gettext"));
        assert_eq!(
            config.source_roots(),
            vec![PathBuf::from("/srv/app/app"), PathBuf::from("/srv/app/resources")]
        );
        assert_eq!(config.merge_policy(), MergePolicy::Retain);
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml(
            indoc! {r#"
                locales = ["en_US", "es", "fr"]
                default = "es"
                directories = ["src", "/abs/views"]
                storage = "locale"
                domain = "site"
                native = true
                functions = false
                prune_stale = true

                [[extractors]]
                pattern = "*.tpl"
                dialect = "templated"

                [markers.plain]
                t = "id"
                tc = "context_id"
            "#},
            "/project",
        )
        .unwrap();

        assert_eq!(config.supported_locales().unwrap().default_tag(), "es");
        assert_eq!(config.runtime_formats().unwrap(), vec![FormatType::Mo]);
        assert_eq!(config.source_roots()[1], PathBuf::from("/abs/views"));
        assert_eq!(config.store().domain(), "site");
        assert_eq!(config.merge_policy(), MergePolicy::Prune);

        let registry = config.registry().unwrap();
        assert_eq!(
            registry.dialect_for(Path::new("page.tpl")),
            Some(Dialect::Templated)
        );
        assert_eq!(registry.dialect_for(Path::new("page.php")), None);
    }

    #[test]
    fn test_invalid_configurations() {
        for bad in [
            "locales = []",
            "locales = [\"en\"]\ndefault = \"fr\"",
            "formats = [\"xliff\"]",
            "formats = []",
            "domain = \"\"",
            "[markers.twig]\nt = \"id\"",
        ] {
            let err = Config::from_toml(bad, ".").unwrap_err();
            assert!(
                matches!(err, Error::Configuration(_)),
                "{bad:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_unknown_keys_and_bad_shapes_are_toml_errors() {
        assert!(matches!(
            Config::from_toml("colour = \"blue\"", "."),
            Err(Error::Toml(_))
        ));
        assert!(matches!(
            Config::from_toml("[markers.plain]\nt = \"sideways\"", "."),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn test_from_file_uses_its_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("msgforge.toml");
        fs::write(&path, "storage = \"lang\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.base_dir(), dir.path());
        assert_eq!(config.storage_root(), dir.path().join("lang"));
    }
}
