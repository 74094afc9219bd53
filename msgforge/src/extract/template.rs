//! Marker extraction for templated files (Blade-style views).
//!
//! Only code regions are scanned:
//!
//! - echo tags `{{ … }}` and `{!! … !!}`
//! - directive arguments `@directive( … )`
//! - `@php … @endphp` blocks and `<?php … ?>` / `<?= … ?>` tags
//!
//! Template comments `{{-- … --}}`, escaped echoes `@{{ … }}` and literal text
//! are blanked out before the plain tokenizer runs. Blanking keeps every
//! newline, so reported lines are those of the original file.

use super::{Dialect, Extractor, MarkerTable, Message, PlainExtractor};

#[derive(Debug, Clone)]
pub struct TemplateExtractor {
    code: PlainExtractor,
}

impl TemplateExtractor {
    pub fn new(markers: MarkerTable) -> Self {
        TemplateExtractor {
            code: PlainExtractor::new(markers),
        }
    }
}

impl Extractor for TemplateExtractor {
    fn dialect(&self) -> Dialect {
        Dialect::Templated
    }

    fn extract(&self, source: &str) -> Vec<Message> {
        self.code.extract(&code_regions(source))
    }
}

/// Returns `source` with everything outside code regions replaced by spaces.
pub fn code_regions(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < bytes.len() {
        let rest = &source[i..];

        if rest.starts_with("{{--") {
            let end = find_plain(source, i + 4, "--}}").map_or(source.len(), |e| e + 4);
            blank(&mut out, &source[i..end]);
            i = end;
        } else if rest.starts_with("@{{") || rest.starts_with("@@") {
            blank(&mut out, &rest[..2]);
            i += 2;
        } else if rest.starts_with("{!!") {
            i = copy_delimited(source, i, "{!!", "!!}", &mut out);
        } else if rest.starts_with("{{") {
            i = copy_delimited(source, i, "{{", "}}", &mut out);
        } else if rest.starts_with("<?php") || rest.starts_with("<?=") {
            let open = if rest.starts_with("<?php") { 5 } else { 3 };
            i = copy_delimited(source, i, &rest[..open], "?>", &mut out);
        } else if bytes[i] == b'@' && directive_allowed(bytes, i) {
            i = directive(source, i, &mut out);
        } else {
            let len = rest.chars().next().map_or(1, char::len_utf8);
            blank(&mut out, &rest[..len]);
            i += len;
        }
    }
    out
}

fn blank(out: &mut String, text: &str) {
    out.extend(text.chars().map(|c| if c == '\n' { '\n' } else { ' ' }));
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// `@` starts a directive only when it is not part of a word (e-mail addresses)
/// and is followed by a name.
fn directive_allowed(bytes: &[u8], at: usize) -> bool {
    let after = bytes.get(at + 1).is_some_and(|b| b.is_ascii_alphabetic());
    let before = at == 0 || !is_ident(bytes[at - 1]);
    after && before
}

/// Copies the inside of `open … close`, blanking the delimiters. Returns the
/// index after the closing delimiter.
fn copy_delimited(source: &str, start: usize, open: &str, close: &str, out: &mut String) -> usize {
    let body = start + open.len();
    blank(out, open);
    match find_code(source, body, close) {
        Some(end) => {
            out.push_str(&source[body..end]);
            blank(out, close);
            end + close.len()
        }
        None => {
            out.push_str(&source[body..]);
            source.len()
        }
    }
}

fn directive(source: &str, start: usize, out: &mut String) -> usize {
    let bytes = source.as_bytes();
    let mut name_end = start + 1;
    while name_end < bytes.len() && is_ident(bytes[name_end]) {
        name_end += 1;
    }
    let name = &source[start + 1..name_end];

    let mut paren = name_end;
    while paren < bytes.len() && matches!(bytes[paren], b' ' | b'\t') {
        paren += 1;
    }

    if bytes.get(paren) == Some(&b'(') {
        blank(out, &source[start..paren]);
        let end = balanced_end(source, paren);
        out.push_str(&source[paren..end]);
        return end;
    }

    if name == "php" {
        blank(out, &source[start..name_end]);
        return match find_plain(source, name_end, "@endphp") {
            Some(end) => {
                out.push_str(&source[name_end..end]);
                out.push(';');
                blank(out, &source[end + 1..end + "@endphp".len()]);
                end + "@endphp".len()
            }
            None => {
                out.push_str(&source[name_end..]);
                source.len()
            }
        };
    }

    blank(out, &source[start..name_end]);
    name_end
}

fn find_plain(source: &str, from: usize, needle: &str) -> Option<usize> {
    source.get(from..)?.find(needle).map(|p| from + p)
}

/// Finds `close` at or after `from`, skipping over quoted strings.
fn find_code(source: &str, from: usize, close: &str) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => i = skip_quoted(bytes, i),
            _ if bytes[i..].starts_with(close.as_bytes()) => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Index after the `)` matching the `(` at `open`, or the end of input.
fn balanced_end(source: &str, open: usize) -> usize {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Index after the closing quote of the literal starting at `start`.
fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}
