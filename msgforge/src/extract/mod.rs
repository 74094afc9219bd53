//! Extraction of translatable messages from source files.
//!
//! Two source dialects are understood: plain source files, where the whole file
//! is code, and templated files, where only the code regions of a template are
//! scanned. Which dialect handles a file is decided by an [`ExtractorRegistry`]
//! built once from configuration.

pub mod plain;
pub mod template;

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub use plain::PlainExtractor;
pub use template::TemplateExtractor;

use crate::{
    error::Error,
    types::{Entry, Key, SourceRef},
};

/// Argument layout of a marker call. Only the string arguments listed are
/// captured; anything after them (counts, replacements) is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    /// `(msgid)`
    Id,
    /// `(context, msgid)`
    ContextId,
    /// `(singular, plural, count…)`
    Plural,
    /// `(context, singular, plural, count…)`
    ContextPlural,
    /// `(domain, msgid)`
    DomainId,
    /// `(domain, context, msgid)`
    DomainContextId,
    /// `(domain, singular, plural, …)`
    DomainPlural,
    /// `(domain, context, singular, plural, …)`
    DomainContextPlural,
}

impl MarkerShape {
    pub fn has_domain(&self) -> bool {
        matches!(
            self,
            MarkerShape::DomainId
                | MarkerShape::DomainContextId
                | MarkerShape::DomainPlural
                | MarkerShape::DomainContextPlural
        )
    }

    pub fn has_context(&self) -> bool {
        matches!(
            self,
            MarkerShape::ContextId
                | MarkerShape::ContextPlural
                | MarkerShape::DomainContextId
                | MarkerShape::DomainContextPlural
        )
    }

    pub fn has_plural(&self) -> bool {
        matches!(
            self,
            MarkerShape::Plural
                | MarkerShape::ContextPlural
                | MarkerShape::DomainPlural
                | MarkerShape::DomainContextPlural
        )
    }

    /// Number of leading string-literal arguments the shape requires.
    pub fn arity(&self) -> usize {
        1 + usize::from(self.has_domain())
            + usize::from(self.has_context())
            + usize::from(self.has_plural())
    }

    /// Builds a message from exactly [`MarkerShape::arity`] literal arguments.
    pub fn message(&self, args: Vec<String>, line: usize) -> Message {
        let mut args = args.into_iter();
        let domain = if self.has_domain() { args.next() } else { None };
        let context = if self.has_context() { args.next() } else { None };
        let msgid = args.next().unwrap_or_default();
        let msgid_plural = if self.has_plural() { args.next() } else { None };
        Message {
            domain,
            context,
            msgid,
            msgid_plural,
            line,
        }
    }
}

impl Display for MarkerShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MarkerShape::Id => "id",
            MarkerShape::ContextId => "context_id",
            MarkerShape::Plural => "plural",
            MarkerShape::ContextPlural => "context_plural",
            MarkerShape::DomainId => "domain_id",
            MarkerShape::DomainContextId => "domain_context_id",
            MarkerShape::DomainPlural => "domain_plural",
            MarkerShape::DomainContextPlural => "domain_context_plural",
        };
        write!(f, "{}", name)
    }
}

/// Mapping from marker function name to its argument shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerTable {
    markers: BTreeMap<String, MarkerShape>,
}

impl Default for MarkerTable {
    fn default() -> Self {
        use MarkerShape::*;
        let markers = [
            ("__", Id),
            ("_", Id),
            ("gettext", Id),
            ("p__", ContextId),
            ("pgettext", ContextId),
            ("n__", Plural),
            ("ngettext", Plural),
            ("np__", ContextPlural),
            ("npgettext", ContextPlural),
            ("d__", DomainId),
            ("dgettext", DomainId),
            ("dp__", DomainContextId),
            ("dpgettext", DomainContextId),
            ("dn__", DomainPlural),
            ("dngettext", DomainPlural),
            ("dnp__", DomainContextPlural),
            ("dnpgettext", DomainContextPlural),
        ]
        .into_iter()
        .map(|(name, shape)| (name.to_string(), shape))
        .collect();
        MarkerTable { markers }
    }
}

impl MarkerTable {
    /// A table with no markers at all.
    pub fn empty() -> Self {
        MarkerTable {
            markers: BTreeMap::new(),
        }
    }

    /// Adds or replaces markers.
    pub fn with_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (S, MarkerShape)>,
        S: Into<String>,
    {
        for (name, shape) in overrides {
            self.markers.insert(name.into(), shape);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<MarkerShape> {
        self.markers.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// A message found by an extractor, before file references are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub domain: Option<String>,
    pub context: Option<String>,
    pub msgid: String,
    pub msgid_plural: Option<String>,
    /// 1-based line of the marker name.
    pub line: usize,
}

/// Source dialect handled by an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Plain,
    Templated,
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Plain => write!(f, "plain"),
            Dialect::Templated => write!(f, "templated"),
        }
    }
}

impl FromStr for Dialect {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "php" => Ok(Dialect::Plain),
            "templated" | "template" | "blade" => Ok(Dialect::Templated),
            other => Err(Error::configuration(format!("unknown dialect `{}`", other))),
        }
    }
}

/// Extracts marker calls from the text of one file.
pub trait Extractor: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Returns every marker call whose required arguments are literals, in
    /// source order.
    fn extract(&self, source: &str) -> Vec<Message>;
}

/// Chooses an extractor for a file by matching its path against ordered glob
/// patterns. The first matching pattern wins; unmatched files are skipped.
pub struct ExtractorRegistry {
    patterns: GlobSet,
    dialects: Vec<Dialect>,
    plain: PlainExtractor,
    templated: TemplateExtractor,
}

impl ExtractorRegistry {
    /// Default patterns: `*.blade.php` is templated, `*.php` is plain.
    pub const DEFAULT_PATTERNS: [(&'static str, Dialect); 2] = [
        ("*.blade.php", Dialect::Templated),
        ("*.php", Dialect::Plain),
    ];

    pub fn new<S: AsRef<str>>(
        patterns: &[(S, Dialect)],
        plain_markers: MarkerTable,
        templated_markers: MarkerTable,
    ) -> Result<Self, Error> {
        let mut builder = GlobSetBuilder::new();
        let mut dialects = Vec::with_capacity(patterns.len());
        for (pattern, dialect) in patterns {
            builder.add(Glob::new(pattern.as_ref())?);
            dialects.push(*dialect);
        }
        Ok(ExtractorRegistry {
            patterns: builder.build()?,
            dialects,
            plain: PlainExtractor::new(plain_markers),
            templated: TemplateExtractor::new(templated_markers),
        })
    }

    /// Which dialect handles `path`, if any.
    pub fn dialect_for(&self, path: &Path) -> Option<Dialect> {
        self.patterns
            .matches(path)
            .into_iter()
            .min()
            .map(|index| self.dialects[index])
    }

    pub fn extractor_for(&self, path: &Path) -> Option<&dyn Extractor> {
        self.dialect_for(path).map(|dialect| match dialect {
            Dialect::Plain => &self.plain as &dyn Extractor,
            Dialect::Templated => &self.templated as &dyn Extractor,
        })
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut dialects = Vec::new();
        for (pattern, dialect) in Self::DEFAULT_PATTERNS {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
                dialects.push(dialect);
            }
        }
        ExtractorRegistry {
            patterns: builder.build().unwrap_or_else(|_| GlobSet::empty()),
            dialects,
            plain: PlainExtractor::new(MarkerTable::default()),
            templated: TemplateExtractor::new(MarkerTable::default()),
        }
    }
}

/// Reads a source file, honoring a byte order mark and replacing invalid UTF-8.
pub fn read_source(path: &Path) -> Result<String, Error> {
    let file = File::open(path).map_err(Error::Io)?;
    let mut decoder = encoding_rs_io::DecodeReaderBytesBuilder::new()
        .bom_override(true)
        .strip_bom(true)
        .build(file);
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes).map_err(Error::Io)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Extracts all files in parallel and folds the results into one entry set.
///
/// Files are folded in sorted path order so that, when two call sites disagree
/// about the plural form of a message, the first one in that order wins.
/// Messages of a domain other than `domain` are dropped. References are made
/// relative to `base` when the file lies below it.
pub fn extract_files(
    registry: &ExtractorRegistry,
    files: Vec<PathBuf>,
    domain: &str,
    base: Option<&Path>,
) -> Result<BTreeMap<Key, Entry>, Error> {
    let mut files = files;
    files.sort();
    files.dedup();

    let extracted: Vec<(PathBuf, Vec<Message>)> = files
        .into_par_iter()
        .filter_map(|path| {
            let Some(extractor) = registry.extractor_for(&path) else {
                tracing::debug!(path = %path.display(), "no extractor for file, skipping");
                return None;
            };
            Some(read_source(&path).map(|source| {
                let messages = extractor.extract(&source);
                (path, messages)
            }))
        })
        .collect::<Result<_, Error>>()?;

    let mut entries: BTreeMap<Key, Entry> = BTreeMap::new();
    for (path, messages) in extracted {
        let file = base
            .and_then(|base| path.strip_prefix(base).ok())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.clone());
        for message in messages {
            if let Some(other) = message.domain.as_deref().filter(|d| *d != domain) {
                tracing::debug!(
                    domain = other,
                    msgid = %message.msgid,
                    "dropping message of another domain"
                );
                continue;
            }
            let reference = SourceRef::new(file.clone(), message.line);
            let key = Key::new(message.context.as_deref(), &message.msgid);
            match entries.get_mut(&key) {
                Some(entry) => {
                    if entry.msgid_plural != message.msgid_plural {
                        tracing::warn!(
                            key = %key,
                            kept = ?entry.msgid_plural,
                            ignored = ?message.msgid_plural,
                            at = %reference,
                            "conflicting plural forms for the same message"
                        );
                    }
                    entry.references.insert(reference);
                }
                None => {
                    let mut entry =
                        Entry::new(message.context.as_deref(), &message.msgid)
                            .with_reference(reference);
                    entry.msgid_plural = message.msgid_plural;
                    entries.insert(key, entry);
                }
            }
        }
    }
    Ok(entries)
}
