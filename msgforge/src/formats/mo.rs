//! Support for the gettext machine object (`.mo`) format.
//!
//! Layout (all integers 32-bit, in the byte order announced by the magic number):
//!
//! | offset | content |
//! |---|---|
//! | 0 | magic `0x950412de` |
//! | 4 | revision |
//! | 8 | number of strings N |
//! | 12 | offset O of the original strings table |
//! | 16 | offset T of the translated strings table |
//! | 20 | hash table size S |
//! | 24 | offset H of the hash table |
//!
//! Each table holds N `(length, offset)` pairs; strings are NUL-terminated and the
//! original strings are sorted bytewise so lookups can bisect. Files are written
//! little-endian with a hash table, the way GNU `msgfmt` does.

use std::io::{BufRead, Write};

use crate::{
    error::Error,
    formats::charset,
    traits::Parser,
    types::{Catalog, Entry, Header, Key},
};

const FORMAT: &str = "mo";
const MAGIC: u32 = 0x950412de;
const MAGIC_SWAPPED: u32 = 0xde120495;
const HEADER_SIZE: usize = 28;

/// One original/translation pair as stored in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// `msgctxt\x04msgid`, optionally followed by `\0msgid_plural`.
    pub original: String,
    /// Translated forms joined with `\0`.
    pub translation: String,
}

/// Represents a compiled `.mo` catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    pub messages: Vec<Message>,
}

impl Format {
    /// Header text stored under the empty original string.
    pub fn header_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.original.is_empty())
            .map(|m| m.translation.as_str())
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    swapped: bool,
}

impl ByteReader<'_> {
    fn u32_at(&self, offset: usize) -> Result<u32, Error> {
        let slice = offset
            .checked_add(4)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| {
                Error::parse(FORMAT, format!("byte {}", offset), "unexpected end of file")
            })?;
        let raw = [slice[0], slice[1], slice[2], slice[3]];
        Ok(if self.swapped {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        })
    }

    fn string_at(&self, table: usize, index: usize) -> Result<&[u8], Error> {
        let descriptor = table + index * 8;
        let length = self.u32_at(descriptor)? as usize;
        let offset = self.u32_at(descriptor + 4)? as usize;
        offset
            .checked_add(length)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| {
                Error::parse(
                    FORMAT,
                    format!("string table entry {}", index),
                    "string points outside the file",
                )
            })
    }
}

impl Parser for Format {
    fn from_reader<R: BufRead>(mut reader: R) -> Result<Self, Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        if bytes.len() < HEADER_SIZE {
            return Err(Error::parse(FORMAT, "header", "file too short"));
        }
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let swapped = match magic {
            MAGIC => false,
            MAGIC_SWAPPED => true,
            _ => return Err(Error::parse(FORMAT, "header", "bad magic number")),
        };
        let reader = ByteReader {
            bytes: &bytes,
            swapped,
        };

        let revision = reader.u32_at(4)?;
        if revision >> 16 > 1 {
            return Err(Error::parse(
                FORMAT,
                "header",
                format!("unsupported revision {:#x}", revision),
            ));
        }
        let count = reader.u32_at(8)? as usize;
        let originals = reader.u32_at(12)? as usize;
        let translations = reader.u32_at(16)? as usize;

        for (name, table) in [("originals", originals), ("translations", translations)] {
            let fits = count
                .checked_mul(8)
                .and_then(|size| size.checked_add(table))
                .is_some_and(|end| end <= bytes.len());
            if !fits {
                return Err(Error::parse(
                    FORMAT,
                    "header",
                    format!("{} strings do not fit the {} table", count, name),
                ));
            }
        }

        let mut raw = Vec::with_capacity(count);
        for index in 0..count {
            raw.push((
                reader.string_at(originals, index)?,
                reader.string_at(translations, index)?,
            ));
        }

        // The header is ASCII, so its charset can be read before decoding anything else.
        let header_charset = raw
            .iter()
            .find(|(original, _)| original.is_empty())
            .map(|(_, translation)| String::from_utf8_lossy(translation).into_owned());
        let encoding =
            charset::encoding_for(header_charset.as_deref().and_then(charset::sniff_charset));

        let messages = raw
            .into_iter()
            .map(|(original, translation)| {
                Ok(Message {
                    original: charset::decode(original, encoding, FORMAT)?,
                    translation: charset::decode(translation, encoding, FORMAT)?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Format { messages })
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        let encoding = charset::encoding_for(
            self.header_text()
                .and_then(charset::sniff_charset),
        );

        let mut encoded: Vec<(Vec<u8>, Vec<u8>)> = self
            .messages
            .iter()
            .map(|m| {
                Ok((
                    charset::encode(&m.original, encoding, FORMAT)?,
                    charset::encode(&m.translation, encoding, FORMAT)?,
                ))
            })
            .collect::<Result<_, Error>>()?;
        encoded.sort_by(|a, b| a.0.cmp(&b.0));

        let count = encoded.len();
        let hash_size = hash_table_size(count);
        let originals_offset = HEADER_SIZE;
        let translations_offset = originals_offset + count * 8;
        let hash_offset = translations_offset + count * 8;
        let mut string_offset = hash_offset + hash_size * 4;

        let mut out = Vec::new();
        for value in [
            MAGIC,
            0,
            count as u32,
            originals_offset as u32,
            translations_offset as u32,
            hash_size as u32,
            hash_offset as u32,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }

        // Original descriptors first, then translation descriptors; the string
        // pool follows the hash table in the same order.
        let mut strings = Vec::new();
        for translated in [false, true] {
            for (original, translation) in &encoded {
                let bytes = if translated { translation } else { original };
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(&(string_offset as u32).to_le_bytes());
                strings.extend_from_slice(bytes);
                strings.push(0);
                string_offset += bytes.len() + 1;
            }
        }

        for slot in build_hash_table(&encoded, hash_size) {
            out.extend_from_slice(&slot.to_le_bytes());
        }
        out.extend_from_slice(&strings);

        writer.write_all(&out).map_err(Error::Io)
    }
}

/// The gettext `hashpjw` string hash over the bytes of an original string.
fn hash_string(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    for &byte in bytes {
        hash = (hash << 4).wrapping_add(u32::from(byte));
        let high = hash & 0xf000_0000;
        if high != 0 {
            hash ^= high >> 24;
            hash ^= high;
        }
    }
    hash
}

/// Hash table size as chosen by msgfmt: the next prime above 4/3 of the entry count.
fn hash_table_size(count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let mut candidate = ((count * 4) / 3).max(3);
    if candidate % 2 == 0 {
        candidate += 1;
    }
    while !is_prime(candidate) {
        candidate += 2;
    }
    candidate
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    let mut divisor = 2;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 1;
    }
    true
}

/// Open addressing with double hashing; slots hold `index + 1`, 0 means empty.
fn build_hash_table(encoded: &[(Vec<u8>, Vec<u8>)], size: usize) -> Vec<u32> {
    let mut table = vec![0u32; size];
    if size == 0 {
        return table;
    }
    for (index, (original, _)) in encoded.iter().enumerate() {
        // Plural originals are hashed on the singular part only.
        let key = original.split(|&b| b == 0).next().unwrap_or(original);
        let hash = hash_string(key) as usize;
        let mut slot = hash % size;
        let increment = 1 + hash % (size - 2);
        while table[slot] != 0 {
            slot = if slot >= size - increment {
                slot - (size - increment)
            } else {
                slot + increment
            };
        }
        table[slot] = index as u32 + 1;
    }
    table
}

impl From<Format> for Catalog {
    fn from(value: Format) -> Self {
        let header = value.header_text().map(Header::parse).unwrap_or_default();
        let mut catalog = Catalog::new("", header.language().unwrap_or_default());
        catalog.header = header;

        for message in value.messages {
            if message.original.is_empty() {
                continue;
            }
            let (singular, plural) = match message.original.split_once('\0') {
                Some((singular, plural)) => (singular, Some(plural)),
                None => (message.original.as_str(), None),
            };
            let key = Key::unflatten(singular);
            let mut entry = Entry::new(key.context.as_deref(), &key.msgid);
            entry.msgid_plural = plural.map(str::to_string);
            entry.set_translations(message.translation.split('\0').map(str::to_string).collect());
            catalog.insert(entry);
        }
        catalog
    }
}

impl From<&Catalog> for Format {
    fn from(value: &Catalog) -> Self {
        let mut messages = vec![Message {
            original: String::new(),
            translation: value.header.render(),
        }];
        messages.extend(value.runtime_entries().map(|entry| {
            let mut original = entry.key().flatten();
            if let Some(plural) = &entry.msgid_plural {
                original.push('\0');
                original.push_str(plural);
            }
            Message {
                original,
                translation: entry.translations.join("\0"),
            }
        }));
        Format { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new("messages", "es");
        catalog.header = Header::parse(
            "Language: es\nContent-Type: text/plain; charset=UTF-8\nPlural-Forms: nplurals=2; plural=(n != 1);\n",
        );
        catalog.insert(Entry::new(None, "Hello").with_translations(["Hola"]));
        catalog.insert(Entry::new(Some("nav"), "Home").with_translations(["Inicio"]));
        catalog.insert(
            Entry::new(None, "One file")
                .with_plural("%d files")
                .with_translations(["Un archivo", "%d archivos"]),
        );
        catalog.insert(Entry::new(None, "Untranslated"));
        catalog
    }

    fn u32_le(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn test_write_layout() {
        let bytes = Format::from(&sample_catalog()).to_bytes().unwrap();
        assert_eq!(u32_le(&bytes, 0), MAGIC);
        assert_eq!(u32_le(&bytes, 4), 0);
        // header + 3 translated entries; the untranslated one is not compiled
        assert_eq!(u32_le(&bytes, 8), 4);
        assert_eq!(u32_le(&bytes, 12), 28);
        assert_eq!(u32_le(&bytes, 16), 28 + 4 * 8);
        assert_eq!(u32_le(&bytes, 20), 5);
        assert_eq!(u32_le(&bytes, 24), 28 + 8 * 8);
    }

    #[test]
    fn test_originals_sorted_and_nul_terminated() {
        let bytes = Format::from(&sample_catalog()).to_bytes().unwrap();
        let count = u32_le(&bytes, 8) as usize;
        let mut previous: Option<Vec<u8>> = None;
        for index in 0..count {
            let length = u32_le(&bytes, 28 + index * 8) as usize;
            let offset = u32_le(&bytes, 28 + index * 8 + 4) as usize;
            assert_eq!(bytes[offset + length], 0);
            let current = bytes[offset..offset + length].to_vec();
            if let Some(prev) = &previous {
                assert!(prev < &current);
            }
            previous = Some(current);
        }
    }

    #[test]
    fn test_hash_table_finds_every_original() {
        let format = Format::from(&sample_catalog());
        let bytes = format.to_bytes().unwrap();
        let count = u32_le(&bytes, 8) as usize;
        let size = u32_le(&bytes, 20) as usize;
        let hash_offset = u32_le(&bytes, 24) as usize;

        for index in 0..count {
            let length = u32_le(&bytes, 28 + index * 8) as usize;
            let offset = u32_le(&bytes, 28 + index * 8 + 4) as usize;
            let original = &bytes[offset..offset + length];
            let key = original.split(|&b| b == 0).next().unwrap();
            let hash = hash_string(key) as usize;
            let mut slot = hash % size;
            let increment = 1 + hash % (size - 2);
            loop {
                let value = u32_le(&bytes, hash_offset + slot * 4);
                assert_ne!(value, 0, "original {:?} missing from hash table", key);
                if value as usize == index + 1 {
                    break;
                }
                slot = (slot + increment) % size;
            }
        }
    }

    #[test]
    fn test_read_back_catalog() {
        let bytes = Format::from(&sample_catalog()).to_bytes().unwrap();
        let catalog = Catalog::from(Format::from_bytes(&bytes).unwrap());

        assert_eq!(catalog.locale, "es");
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(None, "Hello").unwrap().translations, vec!["Hola"]);
        assert_eq!(
            catalog.get(Some("nav"), "Home").unwrap().translations,
            vec!["Inicio"]
        );
        let plural = catalog.get(None, "One file").unwrap();
        assert_eq!(plural.msgid_plural.as_deref(), Some("%d files"));
        assert_eq!(plural.translations, vec!["Un archivo", "%d archivos"]);
        assert!(catalog.get(None, "Untranslated").is_none());
    }

    #[test]
    fn test_read_big_endian() {
        // A single header-only catalog written by hand in big-endian order.
        let header = b"Language: de\n";
        let mut bytes = Vec::new();
        for value in [MAGIC, 0, 1, 28, 36, 0, 44] {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&44u32.to_be_bytes());
        bytes.extend_from_slice(&(header.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&45u32.to_be_bytes());
        bytes.push(0);
        bytes.extend_from_slice(header);
        bytes.push(0);

        let format = Format::from_bytes(&bytes).unwrap();
        assert_eq!(format.header_text(), Some("Language: de\n"));
    }

    #[test]
    fn test_bad_magic_is_parse_error() {
        let err = Format::from_bytes(&[0u8; 28]).unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn test_truncated_file_is_parse_error() {
        let bytes = Format::from(&sample_catalog()).to_bytes().unwrap();
        let err = Format::from_bytes(&bytes[..40]).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_oversized_count_is_parse_error() {
        let mut bytes = Vec::new();
        for value in [MAGIC, 0, u32::MAX, 28, 28, 0, 28] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let err = Format::from_bytes(&bytes).unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("do not fit"), "{err}");
    }

    #[test]
    fn test_unsupported_revision_is_parse_error() {
        let mut bytes = Format::from(&sample_catalog()).to_bytes().unwrap();
        bytes[4..8].copy_from_slice(&0x0002_0000u32.to_le_bytes());
        assert!(Format::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_hash_string_known_values() {
        assert_eq!(hash_string(b""), 0);
        assert_eq!(hash_string(b"a"), 0x61);
        assert_eq!(hash_string(b"ab"), 0x61 * 16 + 0x62);
    }

    #[test]
    fn test_hash_table_size_is_prime() {
        assert_eq!(hash_table_size(0), 0);
        assert_eq!(hash_table_size(1), 3);
        assert_eq!(hash_table_size(4), 5);
        assert_eq!(hash_table_size(100), 137);
    }
}
