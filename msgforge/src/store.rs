//! On-disk catalog storage.
//!
//! Catalogs live under `<root>/<locale>/LC_MESSAGES/<domain>.{mo,po,json}`, the
//! layout gettext runtimes expect.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::{error::Error, formats::FormatType, lock::TargetLock, types::Catalog};

/// Loads and saves the catalogs of one domain below one storage root.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    root: PathBuf,
    domain: String,
}

impl CatalogStore {
    pub fn new(root: impl Into<PathBuf>, domain: impl Into<String>) -> Self {
        CatalogStore {
            root: root.into(),
            domain: domain.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// `<root>/<locale>/LC_MESSAGES`
    pub fn dir_for(&self, locale: &str) -> PathBuf {
        self.root.join(locale).join("LC_MESSAGES")
    }

    pub fn path_for(&self, locale: &str, format: FormatType) -> PathBuf {
        self.dir_for(locale)
            .join(format!("{}.{}", self.domain, format.extension()))
    }

    pub fn lock_path(&self, locale: &str) -> PathBuf {
        self.dir_for(locale).join(format!("{}.lock", self.domain))
    }

    /// Loads one representation. A missing file is `Ok(None)`; a file that
    /// exists but cannot be decoded is an error.
    pub fn load(&self, locale: &str, format: FormatType) -> Result<Option<Catalog>, Error> {
        let path = self.path_for(locale, format);
        match format.read(&path) {
            Ok(mut catalog) => {
                catalog.domain = self.domain.clone();
                catalog.locale = locale.to_string();
                tracing::debug!(path = %path.display(), entries = catalog.len(), "loaded catalog");
                Ok(Some(catalog))
            }
            Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Loads the first representation present in `preference` order, or an
    /// empty catalog when none exists.
    pub fn load_preferred(&self, locale: &str, preference: &[FormatType]) -> Result<Catalog, Error> {
        for format in preference {
            if let Some(catalog) = self.load(locale, *format)? {
                return Ok(catalog);
            }
        }
        tracing::debug!(locale, domain = %self.domain, "no catalog on disk, using an empty one");
        Ok(Catalog::new(&self.domain, locale))
    }

    /// Writes all three representations of `catalog` under the per-catalog
    /// lock. Each file is replaced atomically; the text catalog is written last.
    pub fn save(&self, catalog: &Catalog) -> Result<(), Error> {
        if catalog.locale.is_empty() {
            return Err(Error::configuration("cannot save a catalog without a locale"));
        }
        let _lock = self.lock(&catalog.locale)?;
        self.write_all(catalog)
    }

    /// Loads the text catalog of `locale`, transforms it and saves the result,
    /// holding the per-catalog lock from the load until the last file is
    /// written. `transform` receives `None` when no text catalog exists yet;
    /// when it fails nothing is written.
    pub fn update<F>(&self, locale: &str, transform: F) -> Result<Catalog, Error>
    where
        F: FnOnce(Option<Catalog>) -> Result<Catalog, Error>,
    {
        if locale.is_empty() {
            return Err(Error::configuration("cannot update a catalog without a locale"));
        }
        let _lock = self.lock(locale)?;
        let baseline = self.load(locale, FormatType::Po)?;
        let mut catalog = transform(baseline)?;
        catalog.domain = self.domain.clone();
        catalog.locale = locale.to_string();
        self.write_all(&catalog)?;
        Ok(catalog)
    }

    fn lock(&self, locale: &str) -> Result<TargetLock, Error> {
        fs::create_dir_all(self.dir_for(locale))?;
        TargetLock::acquire(self.lock_path(locale))
    }

    /// Callers hold the lock of `catalog.locale`.
    fn write_all(&self, catalog: &Catalog) -> Result<(), Error> {
        for format in FormatType::ALL {
            format.write(catalog, self.path_for(&catalog.locale, format))?;
        }
        tracing::info!(
            locale = %catalog.locale,
            domain = %self.domain,
            entries = catalog.len(),
            translated = catalog.translated_count(),
            "saved catalog"
        );
        Ok(())
    }

    /// Locales that have a directory under the storage root, sorted.
    pub fn locales_on_disk(&self) -> Result<Vec<String>, Error> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut locales = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.path().join("LC_MESSAGES").is_dir() {
                locales.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        locales.sort();
        Ok(locales)
    }
}
