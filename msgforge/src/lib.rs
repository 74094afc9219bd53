#![forbid(unsafe_code)]
//! gettext catalog toolkit for Rust.
//!
//! Scans source trees for translation markers, merges the extracted messages
//! into curated catalogs, persists every catalog as `.po`, `.mo` and a native
//! JSON form, and serves runtime lookups for a per-request locale.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use msgforge::{Config, Pipeline};
//!
//! let pipeline = Pipeline::new(Config::from_file("msgforge.toml")?)?;
//!
//! // Extract, merge and save every configured locale
//! pipeline.refresh_all()?;
//!
//! // Resolve the locale of a request and translate with it
//! let context = pipeline.context(Some("es"), None)?;
//! println!("{}", context.translator().gettext("Hello"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Catalog formats
//!
//! - **`.po`**: the human-editable text catalog, and the baseline of every refresh
//! - **`.mo`**: the compiled binary catalog read by gettext runtimes
//! - **`.json`**: a flat key → forms map, the fastest to load
//!
//! All three live at `<storage>/<locale>/LC_MESSAGES/<domain>.<ext>` and are
//! always regenerated together.

pub mod config;
pub mod error;
pub mod extract;
pub mod formats;
pub mod locale;
pub mod lock;
pub mod merge;
pub mod pipeline;
pub mod plural;
pub mod scan;
pub mod store;
pub mod traits;
pub mod translator;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    config::Config,
    error::Error,
    extract::{Dialect, ExtractorRegistry, MarkerShape, MarkerTable},
    formats::FormatType,
    locale::{LocaleContext, Resolution, SupportedLocales, resolve},
    merge::{MergePolicy, MergeReport, merge},
    pipeline::{LocaleStats, Pipeline},
    plural::PluralRule,
    scan::SourceScanner,
    store::CatalogStore,
    translator::Translator,
    types::{Catalog, Entry, Header, Key, SourceRef},
};
