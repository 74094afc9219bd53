//! Support for the gettext portable object (`.po`) format.
//!
//! This is the human-editable catalog and the baseline every refresh merges into,
//! so the parser keeps comments, flags and references, and reports malformed input
//! with the offending line instead of guessing.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use indoc::indoc;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    error::Error,
    formats::charset,
    traits::Parser,
    types::{Catalog, Entry, Header, Key, SourceRef},
};

const FORMAT: &str = "po";
const ISOLATE_START: char = '\u{2068}';
const ISOLATE_END: char = '\u{2069}';
const REFERENCE_WIDTH: usize = 79;

lazy_static! {
    static ref MSGSTR_INDEX_REGEX: Regex = Regex::new(r"^msgstr\[(\d+)\](.*)$").unwrap();
}

/// Represents a parsed `.po` file: the header entry plus all regular entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    pub header: Header,
    pub entries: Vec<Entry>,
}

impl Parser for Format {
    fn from_reader<R: BufRead>(mut reader: R) -> Result<Self, Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        let sniffed = String::from_utf8_lossy(&bytes);
        let encoding = charset::encoding_for(charset::sniff_charset(header_block(&sniffed)));
        let text = charset::decode(&bytes, encoding, FORMAT)?;

        parse_text(&text)
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        let mut content = format!(
            indoc! {"
            # Message catalog for language {}.
            # Generated by msgforge. Edits to msgstr lines, flags and translator
            # comments are kept when the catalog is refreshed from sources.
            #

            "},
            self.header.language().unwrap_or("unknown")
        );

        if !self.header.is_empty() {
            content.push_str("msgid \"\"\n");
            write_string(&mut content, "msgstr", &self.header.render());
            content.push('\n');
        }

        for entry in &self.entries {
            write_entry(&mut content, entry);
            content.push('\n');
        }

        let encoding = charset::encoding_for(Some(self.header.charset()));
        writer
            .write_all(&charset::encode(&content, encoding, FORMAT)?)
            .map_err(Error::Io)
    }
}

impl From<Format> for Catalog {
    fn from(value: Format) -> Self {
        let mut catalog = Catalog::new("", value.header.language().unwrap_or_default());
        catalog.header = value.header;
        for entry in value.entries {
            catalog.insert(entry);
        }
        catalog
    }
}

impl From<&Catalog> for Format {
    fn from(value: &Catalog) -> Self {
        Format {
            header: value.header.clone(),
            entries: value
                .entries
                .iter()
                .filter(|(key, _)| !key.is_header())
                .map(|(_, entry)| entry.clone())
                .collect(),
        }
    }
}

/// Returns the first blank-line separated block, which holds the header entry.
fn header_block(text: &str) -> &str {
    let mut started = false;
    let mut end = text.len();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with("msgid") {
            started = true;
        } else if started && trimmed.is_empty() {
            end = offset;
            break;
        }
        offset += line.len();
    }
    &text[..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Msgctxt,
    Msgid,
    MsgidPlural,
    Msgstr(usize),
}

#[derive(Debug, Default)]
struct PendingEntry {
    comments: Vec<String>,
    extracted_comments: Vec<String>,
    references: BTreeSet<SourceRef>,
    flags: BTreeSet<String>,
    msgctxt: Option<String>,
    msgid: Option<String>,
    msgid_plural: Option<String>,
    msgstr: BTreeMap<usize, String>,
    field: Option<Field>,
    line: usize,
}

impl PendingEntry {
    fn has_msgstr(&self) -> bool {
        !self.msgstr.is_empty()
    }

    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Msgctxt => self.msgctxt.get_or_insert_with(String::new),
            Field::Msgid => self.msgid.get_or_insert_with(String::new),
            Field::MsgidPlural => self.msgid_plural.get_or_insert_with(String::new),
            Field::Msgstr(index) => self.msgstr.entry(index).or_default(),
        }
    }
}

struct PoReader {
    format: Format,
    header_seen: bool,
    seen: BTreeSet<Key>,
    pending: PendingEntry,
}

impl PoReader {
    fn flush(&mut self) -> Result<(), Error> {
        let pending = std::mem::take(&mut self.pending);
        let Some(msgid) = pending.msgid else {
            if pending.msgctxt.is_some() || !pending.msgstr.is_empty() {
                return Err(Error::parse(
                    FORMAT,
                    format!("line {}", pending.line),
                    "entry has no msgid",
                ));
            }
            // Comment-only block (e.g. the file banner).
            return Ok(());
        };

        let translations = match pending.msgid_plural {
            Some(_) => {
                let count = pending.msgstr.keys().max().map_or(1, |max| max + 1);
                (0..count)
                    .map(|i| pending.msgstr.get(&i).cloned().unwrap_or_default())
                    .collect()
            }
            None => vec![pending.msgstr.get(&0).cloned().unwrap_or_default()],
        };

        let entry = Entry {
            context: pending.msgctxt,
            msgid,
            msgid_plural: pending.msgid_plural,
            translations,
            references: pending.references,
            flags: pending.flags,
            comments: pending.comments,
            extracted_comments: pending.extracted_comments,
        };

        let key = entry.key();
        if key.is_header() {
            if self.header_seen {
                return Err(Error::parse(
                    FORMAT,
                    format!("line {}", pending.line),
                    "duplicate header entry",
                ));
            }
            self.header_seen = true;
            self.format.header = Header::parse(&entry.translations[0]);
            return Ok(());
        }

        if !self.seen.insert(key.clone()) {
            return Err(Error::parse(
                FORMAT,
                format!("line {}", pending.line),
                format!("duplicate message definition for `{}`", key),
            ));
        }
        self.format.entries.push(entry);
        Ok(())
    }

    fn keyword(&mut self, field: Field, rest: &str, line_no: usize) -> Result<(), Error> {
        let location = || format!("line {}", line_no);
        match field {
            Field::Msgctxt | Field::Msgid if self.pending.has_msgstr() => self.flush()?,
            _ => {}
        }

        let pending = &mut self.pending;
        let misplaced = match field {
            Field::Msgctxt => pending.msgctxt.is_some() || pending.msgid.is_some(),
            Field::Msgid => pending.msgid.is_some(),
            Field::MsgidPlural => pending.msgid.is_none() || pending.msgid_plural.is_some(),
            Field::Msgstr(index) => pending.msgid.is_none() || pending.msgstr.contains_key(&index),
        };
        if misplaced {
            return Err(Error::parse(FORMAT, location(), "misplaced keyword"));
        }

        if pending.msgctxt.is_none() && pending.msgid.is_none() {
            pending.line = line_no;
        }
        let value = parse_quoted(rest, line_no)?;
        *pending.field_mut(field) = value;
        pending.field = Some(field);
        Ok(())
    }
}

fn parse_text(text: &str) -> Result<Format, Error> {
    let mut reader = PoReader {
        format: Format::default(),
        header_seen: false,
        seen: BTreeSet::new(),
        pending: PendingEntry::default(),
    };

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();

        if line.is_empty() {
            reader.flush()?;
            continue;
        }

        if line.starts_with('#') && reader.pending.has_msgstr() {
            reader.flush()?;
        }

        if line.starts_with("#~") {
            // Obsolete entries are dropped along with the comments attached to them.
            if reader.pending.msgid.is_none() {
                reader.pending = PendingEntry::default();
            }
        } else if let Some(rest) = line.strip_prefix("#:") {
            reader
                .pending
                .references
                .extend(split_references(rest).iter().map(|r| parse_reference(r)));
        } else if let Some(rest) = line.strip_prefix("#,") {
            reader.pending.flags.extend(
                rest.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string),
            );
        } else if let Some(rest) = line.strip_prefix("#.") {
            reader
                .pending
                .extracted_comments
                .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        } else if line.starts_with("#|") {
            // Previous-msgid comments are regenerated by merge tools, not kept.
        } else if let Some(rest) = line.strip_prefix('#') {
            reader
                .pending
                .comments
                .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        } else if let Some(rest) = line.strip_prefix("msgctxt") {
            reader.keyword(Field::Msgctxt, rest, line_no)?;
        } else if let Some(rest) = line.strip_prefix("msgid_plural") {
            reader.keyword(Field::MsgidPlural, rest, line_no)?;
        } else if let Some(rest) = line.strip_prefix("msgid") {
            reader.keyword(Field::Msgid, rest, line_no)?;
        } else if let Some(caps) = MSGSTR_INDEX_REGEX.captures(line) {
            let index = caps[1].parse::<usize>().map_err(|_| {
                Error::parse(FORMAT, format!("line {}", line_no), "invalid msgstr index")
            })?;
            let rest = caps.get(2).map_or("", |m| m.as_str());
            reader.keyword(Field::Msgstr(index), rest, line_no)?;
        } else if let Some(rest) = line.strip_prefix("msgstr") {
            reader.keyword(Field::Msgstr(0), rest, line_no)?;
        } else if line.starts_with('"') {
            let field = reader.pending.field.ok_or_else(|| {
                Error::parse(
                    FORMAT,
                    format!("line {}", line_no),
                    "string continuation without keyword",
                )
            })?;
            let value = parse_quoted(line, line_no)?;
            reader.pending.field_mut(field).push_str(&value);
        } else {
            return Err(Error::parse(
                FORMAT,
                format!("line {}", line_no),
                format!("unexpected content `{}`", line),
            ));
        }
    }
    reader.flush()?;

    Ok(reader.format)
}

/// Splits a `#:` line into reference tokens. File names containing whitespace
/// are wrapped in U+2068/U+2069 isolation marks, as GNU gettext writes them.
fn split_references(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if c == ISOLATE_START {
            chars.next();
            for c in chars.by_ref() {
                if c == ISOLATE_END {
                    break;
                }
                token.push(c);
            }
        }
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            token.push(c);
            chars.next();
        }
        tokens.push(token);
    }
    tokens
}

fn parse_reference(token: &str) -> SourceRef {
    match token.rsplit_once(':') {
        Some((file, line)) if !file.is_empty() => match line.parse::<usize>() {
            Ok(line) => SourceRef::new(PathBuf::from(file), line),
            Err(_) => SourceRef::new(PathBuf::from(token), 0),
        },
        _ => SourceRef::new(PathBuf::from(token), 0),
    }
}

/// Parses a C-style quoted string, the only literal form PO files use.
fn parse_quoted(input: &str, line_no: usize) -> Result<String, Error> {
    let error = |message: &str| Error::parse(FORMAT, format!("line {}", line_no), message);

    let input = input.trim();
    let mut chars = input
        .strip_prefix('"')
        .ok_or_else(|| error("expected a quoted string"))?
        .chars()
        .peekable();

    let mut result = String::with_capacity(input.len());
    loop {
        let c = chars.next().ok_or_else(|| error("unterminated string"))?;
        match c {
            '"' => break,
            '\\' => {
                let escaped = chars.next().ok_or_else(|| error("unterminated string"))?;
                match escaped {
                    'n' => result.push('\n'),
                    't' => result.push('\t'),
                    'r' => result.push('\r'),
                    'a' => result.push('\u{7}'),
                    'b' => result.push('\u{8}'),
                    'f' => result.push('\u{c}'),
                    'v' => result.push('\u{b}'),
                    '0'..='7' => {
                        let mut value = escaped.to_digit(8).unwrap_or(0);
                        for _ in 0..2 {
                            match chars.peek().and_then(|d| d.to_digit(8)) {
                                Some(digit) => {
                                    value = value * 8 + digit;
                                    chars.next();
                                }
                                None => break,
                            }
                        }
                        result.push(char::from_u32(value).ok_or_else(|| error("bad octal escape"))?);
                    }
                    'x' => {
                        let mut value = 0u32;
                        let mut digits = 0;
                        while let Some(digit) = chars.peek().and_then(|d| d.to_digit(16)) {
                            value = value * 16 + digit;
                            digits += 1;
                            chars.next();
                        }
                        if digits == 0 {
                            return Err(error("bad hex escape"));
                        }
                        result.push(char::from_u32(value).ok_or_else(|| error("bad hex escape"))?);
                    }
                    other => result.push(other),
                }
            }
            other => result.push(other),
        }
    }

    if chars.any(|c| !c.is_whitespace()) {
        return Err(error("trailing content after string"));
    }
    Ok(result)
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Writes `keyword "value"`, splitting at embedded newlines like msgmerge does.
fn write_string(out: &mut String, keyword: &str, value: &str) {
    let body = value.strip_suffix('\n').unwrap_or(value);
    if body.contains('\n') {
        out.push_str(keyword);
        out.push_str(" \"\"\n");
        for segment in value.split_inclusive('\n') {
            out.push('"');
            out.push_str(&escape(segment));
            out.push_str("\"\n");
        }
    } else {
        out.push_str(keyword);
        out.push_str(" \"");
        out.push_str(&escape(value));
        out.push_str("\"\n");
    }
}

fn write_entry(out: &mut String, entry: &Entry) {
    for comment in &entry.comments {
        if comment.is_empty() {
            out.push_str("#\n");
        } else {
            out.push_str("# ");
            out.push_str(comment);
            out.push('\n');
        }
    }
    for comment in &entry.extracted_comments {
        out.push_str("#. ");
        out.push_str(comment);
        out.push('\n');
    }

    let mut line = String::new();
    for reference in &entry.references {
        let file = reference.file.display().to_string();
        let file = if file.contains(char::is_whitespace) {
            format!("{}{}{}", ISOLATE_START, file, ISOLATE_END)
        } else {
            file
        };
        let token = if reference.line == 0 {
            file
        } else {
            format!("{}:{}", file, reference.line)
        };
        if !line.is_empty() && line.len() + 1 + token.len() > REFERENCE_WIDTH {
            out.push_str(&line);
            out.push('\n');
            line.clear();
        }
        if line.is_empty() {
            line.push_str("#:");
        }
        line.push(' ');
        line.push_str(&token);
    }
    if !line.is_empty() {
        out.push_str(&line);
        out.push('\n');
    }

    if !entry.flags.is_empty() {
        out.push_str("#, ");
        out.push_str(&entry.flags.iter().cloned().collect::<Vec<_>>().join(", "));
        out.push('\n');
    }

    if let Some(context) = &entry.context {
        write_string(out, "msgctxt", context);
    }
    write_string(out, "msgid", &entry.msgid);
    match &entry.msgid_plural {
        Some(plural) => {
            write_string(out, "msgid_plural", plural);
            for (index, form) in entry.translations.iter().enumerate() {
                write_string(out, &format!("msgstr[{}]", index), form);
            }
        }
        None => {
            let singular = entry.translations.first().map_or("", String::as_str);
            write_string(out, "msgstr", singular);
        }
    }
}
