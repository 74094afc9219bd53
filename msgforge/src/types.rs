//! Core, format-agnostic types for msgforge.
//! Parsers decode into these; encoders serialize these.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

/// Separator between context and msgid in flattened keys (MO originals, native form).
pub const CONTEXT_SEPARATOR: char = '\u{4}';

/// Lookup key of a message: optional context plus msgid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct Key {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub context: Option<String>,
    pub msgid: String,
}

impl Key {
    pub fn new(context: Option<&str>, msgid: &str) -> Self {
        Key {
            context: context.map(str::to_string),
            msgid: msgid.to_string(),
        }
    }

    /// Flattens the key the way gettext binary catalogs do: `context\x04msgid` or `msgid`.
    pub fn flatten(&self) -> String {
        match &self.context {
            Some(context) => format!("{}{}{}", context, CONTEXT_SEPARATOR, self.msgid),
            None => self.msgid.clone(),
        }
    }

    /// Inverse of [`Key::flatten`].
    pub fn unflatten(flat: &str) -> Self {
        match flat.split_once(CONTEXT_SEPARATOR) {
            Some((context, msgid)) => Key::new(Some(context), msgid),
            None => Key::new(None, flat),
        }
    }

    /// The header entry of a catalog is stored under an empty msgid without context.
    pub fn is_header(&self) -> bool {
        self.context.is_none() && self.msgid.is_empty()
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.context {
            Some(context) => write!(f, "[{}] {}", context, self.msgid),
            None => write!(f, "{}", self.msgid),
        }
    }
}

/// A `(file, line)` location where a message was found.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct SourceRef {
    pub file: PathBuf,
    pub line: usize,
}

impl SourceRef {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        SourceRef {
            file: file.into(),
            line,
        }
    }
}

impl Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A single message of a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Entry {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub context: Option<String>,

    pub msgid: String,

    /// Plural source id (`msgid_plural` in PO).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub msgid_plural: Option<String>,

    /// Translated forms. Index 0 is the singular; never empty.
    pub translations: Vec<String>,

    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    #[serde(default)]
    pub references: BTreeSet<SourceRef>,

    /// Flags such as `fuzzy` or `php-format`.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    #[serde(default)]
    pub flags: BTreeSet<String>,

    /// Translator comments (`# ` lines).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub comments: Vec<String>,

    /// Comments extracted from source code (`#.` lines).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub extracted_comments: Vec<String>,
}

impl Entry {
    /// Creates an untranslated entry.
    pub fn new(context: Option<&str>, msgid: &str) -> Self {
        Entry {
            context: context.map(str::to_string),
            msgid: msgid.to_string(),
            msgid_plural: None,
            translations: vec![String::new()],
            references: BTreeSet::new(),
            flags: BTreeSet::new(),
            comments: Vec::new(),
            extracted_comments: Vec::new(),
        }
    }

    pub fn with_plural(mut self, msgid_plural: &str) -> Self {
        self.msgid_plural = Some(msgid_plural.to_string());
        self
    }

    pub fn with_translations<I, S>(mut self, translations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_translations(translations.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_reference(mut self, reference: SourceRef) -> Self {
        self.references.insert(reference);
        self
    }

    pub fn key(&self) -> Key {
        Key {
            context: self.context.clone(),
            msgid: self.msgid.clone(),
        }
    }

    /// Replaces the translated forms, keeping index 0 present.
    pub fn set_translations(&mut self, translations: Vec<String>) {
        self.translations = translations;
        if self.translations.is_empty() {
            self.translations.push(String::new());
        }
    }

    /// An entry counts as translated once its first form is non-empty.
    pub fn is_translated(&self) -> bool {
        self.translations.first().is_some_and(|t| !t.is_empty())
    }

    pub fn is_fuzzy(&self) -> bool {
        self.flags.contains("fuzzy")
    }
}

impl Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entry {{ key: {}, translations: {:?} }}",
            self.key(),
            self.translations
        )
    }
}

/// Catalog header, kept as ordered `Name: value` fields the way PO headers are written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Header {
    pub fields: Vec<(String, String)>,
}

impl Header {
    /// Parses the msgstr of a header entry.
    pub fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().to_string()))
            })
            .collect();
        Header { fields }
    }

    /// Renders the header back into a msgstr body (each field terminated by `\n`).
    pub fn render(&self) -> String {
        self.fields
            .iter()
            .map(|(name, value)| format!("{}: {}\n", name, value))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a field, replacing an existing one in place or appending it.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .fields
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(field) => field.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn plural_forms(&self) -> Option<&str> {
        self.get("Plural-Forms")
    }

    pub fn language(&self) -> Option<&str> {
        self.get("Language")
    }

    /// Charset declared in `Content-Type`, defaulting to UTF-8.
    pub fn charset(&self) -> &str {
        self.get("Content-Type")
            .and_then(|ct| {
                ct.split(';')
                    .filter_map(|part| part.trim().strip_prefix("charset="))
                    .next()
            })
            .map(str::trim)
            .filter(|cs| !cs.is_empty() && *cs != "CHARSET")
            .unwrap_or("UTF-8")
    }
}

/// A message catalog for one domain and one locale.
///
/// Entries are keyed by [`Key`], so a key is unique within a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    pub domain: String,
    pub locale: String,
    pub header: Header,
    pub entries: BTreeMap<Key, Entry>,
}

impl Catalog {
    pub fn new(domain: &str, locale: &str) -> Self {
        Catalog {
            domain: domain.to_string(),
            locale: locale.to_string(),
            header: Header::default(),
            entries: BTreeMap::new(),
        }
    }

    /// Inserts an entry, replacing any entry with the same key.
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        self.entries.insert(entry.key(), entry)
    }

    pub fn get(&self, context: Option<&str>, msgid: &str) -> Option<&Entry> {
        self.entries.get(&Key::new(context, msgid))
    }

    pub fn get_mut(&mut self, context: Option<&str>, msgid: &str) -> Option<&mut Entry> {
        self.entries.get_mut(&Key::new(context, msgid))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn translated_count(&self) -> usize {
        self.iter().filter(|e| e.is_translated()).count()
    }

    /// Entries that runtime formats carry: translated and not fuzzy.
    pub fn runtime_entries(&self) -> impl Iterator<Item = &Entry> {
        self.iter().filter(|e| e.is_translated() && !e.is_fuzzy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_flatten_roundtrip() {
        let key = Key::new(Some("nav"), "Home");
        assert_eq!(key.flatten(), "nav\u{4}Home");
        assert_eq!(Key::unflatten(&key.flatten()), key);

        let plain = Key::new(None, "Home");
        assert_eq!(plain.flatten(), "Home");
        assert_eq!(Key::unflatten("Home"), plain);
    }

    #[test]
    fn test_key_ordering_puts_no_context_first() {
        let mut keys = vec![Key::new(Some("a"), "x"), Key::new(None, "x")];
        keys.sort();
        assert_eq!(keys[0].context, None);
    }

    #[test]
    fn test_entry_new_is_untranslated_with_empty_first_form() {
        let entry = Entry::new(None, "Hello");
        assert_eq!(entry.translations, vec![String::new()]);
        assert!(!entry.is_translated());
    }

    #[test]
    fn test_set_translations_never_leaves_empty_list() {
        let mut entry = Entry::new(None, "Hello").with_translations(["Hola"]);
        assert!(entry.is_translated());
        entry.set_translations(Vec::new());
        assert_eq!(entry.translations, vec![String::new()]);
    }

    #[test]
    fn test_catalog_insert_replaces_same_key() {
        let mut catalog = Catalog::new("messages", "es");
        catalog.insert(Entry::new(None, "Hello"));
        let previous = catalog.insert(Entry::new(None, "Hello").with_translations(["Hola"]));
        assert!(previous.is_some());
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(None, "Hello").unwrap().translations[0], "Hola");
    }

    #[test]
    fn test_header_parse_and_render() {
        let header = Header::parse(
            "Language: es\nContent-Type: text/plain; charset=ISO-8859-1\nPlural-Forms: nplurals=2; plural=(n != 1);\n",
        );
        assert_eq!(header.language(), Some("es"));
        assert_eq!(header.charset(), "ISO-8859-1");
        assert_eq!(header.plural_forms(), Some("nplurals=2; plural=(n != 1);"));
        assert_eq!(
            header.render(),
            "Language: es\nContent-Type: text/plain; charset=ISO-8859-1\nPlural-Forms: nplurals=2; plural=(n != 1);\n"
        );
    }

    #[test]
    fn test_header_charset_defaults_to_utf8() {
        let mut header = Header::default();
        assert_eq!(header.charset(), "UTF-8");
        header.set("Content-Type", "text/plain; charset=CHARSET");
        assert_eq!(header.charset(), "UTF-8");
    }

    #[test]
    fn test_header_set_replaces_in_place() {
        let mut header = Header::parse("Language: en\nX-Generator: msgforge\n");
        header.set("language", "fr");
        assert_eq!(header.fields[0], ("Language".to_string(), "fr".to_string()));
        assert_eq!(header.fields.len(), 2);
    }

    #[test]
    fn test_runtime_entries_skip_fuzzy_and_untranslated() {
        let mut catalog = Catalog::new("messages", "es");
        catalog.insert(Entry::new(None, "a").with_translations(["A"]));
        catalog.insert(Entry::new(None, "b"));
        let mut fuzzy = Entry::new(None, "c").with_translations(["C"]);
        fuzzy.flags.insert("fuzzy".to_string());
        catalog.insert(fuzzy);

        let ids: Vec<_> = catalog.runtime_entries().map(|e| e.msgid.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(catalog.translated_count(), 2);
    }
}
