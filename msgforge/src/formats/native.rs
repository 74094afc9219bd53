//! Support for the native catalog form: a JSON object mapping flattened keys to forms.
//!
//! ```json
//! {
//!   "": ["Language: es\nPlural-Forms: nplurals=2; plural=(n != 1);\n"],
//!   "Hello": ["Hola"],
//!   "nav\u0004Home": ["Inicio"],
//!   "One file": ["Un archivo", "%d archivos"]
//! }
//! ```
//!
//! The key `""` carries the header. Plural source ids are not kept; lookups only
//! need the key and the forms.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use crate::{
    error::Error,
    traits::Parser,
    types::{Catalog, Entry, Header, Key},
};

/// Represents a native `.json` catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    pub messages: BTreeMap<String, Vec<String>>,
}

impl Parser for Format {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let messages: BTreeMap<String, Vec<String>> = serde_json::from_reader(reader)?;
        Ok(Format { messages })
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        serde_json::to_writer_pretty(&mut writer, &self.messages)?;
        writer.write_all(b"\n").map_err(Error::Io)
    }
}

impl From<Format> for Catalog {
    fn from(value: Format) -> Self {
        let header = value
            .messages
            .get("")
            .and_then(|forms| forms.first())
            .map(|text| Header::parse(text))
            .unwrap_or_default();
        let mut catalog = Catalog::new("", header.language().unwrap_or_default());
        catalog.header = header;

        for (flat, forms) in value.messages {
            if flat.is_empty() {
                continue;
            }
            let key = Key::unflatten(&flat);
            let mut entry = Entry::new(key.context.as_deref(), &key.msgid);
            entry.set_translations(forms);
            catalog.insert(entry);
        }
        catalog
    }
}

impl From<&Catalog> for Format {
    fn from(value: &Catalog) -> Self {
        let mut messages = BTreeMap::new();
        messages.insert(String::new(), vec![value.header.render()]);
        for entry in value.runtime_entries() {
            messages.insert(entry.key().flatten(), entry.translations.clone());
        }
        Format { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read() {
        let mut catalog = Catalog::new("messages", "es");
        catalog.header = Header::parse("Language: es\n");
        catalog.insert(Entry::new(None, "Hello").with_translations(["Hola"]));
        catalog.insert(Entry::new(Some("nav"), "Home").with_translations(["Inicio"]));
        catalog.insert(
            Entry::new(None, "One file")
                .with_plural("%d files")
                .with_translations(["Un archivo", "%d archivos"]),
        );
        catalog.insert(Entry::new(None, "Pending"));

        let bytes = Format::from(&catalog).to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"nav\\u0004Home\""));
        assert!(!text.contains("Pending"));

        let loaded = Catalog::from(Format::from_bytes(&bytes).unwrap());
        assert_eq!(loaded.locale, "es");
        assert_eq!(loaded.len(), 3);
        assert_eq!(
            loaded.get(Some("nav"), "Home").unwrap().translations,
            vec!["Inicio"]
        );
        assert_eq!(
            loaded.get(None, "One file").unwrap().translations,
            vec!["Un archivo", "%d archivos"]
        );
    }

    #[test]
    fn test_empty_form_list_keeps_first_form() {
        let loaded = Catalog::from(Format::from_str(r#"{"Hello": []}"#).unwrap());
        assert_eq!(loaded.get(None, "Hello").unwrap().translations, vec![""]);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = Format::from_str("{\"Hello\": \"Hola\"}").unwrap_err();
        assert!(err.is_parse());
    }
}
