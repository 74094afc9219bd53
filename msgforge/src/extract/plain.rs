//! Marker extraction for plain source files.
//!
//! The source is tokenized just far enough to tell code from comments and
//! string literals, so a marker name inside a comment or a string never counts.

use super::{Dialect, Extractor, MarkerTable, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    /// `$name`
    Variable,
    /// A string literal without interpolation.
    Str(String),
    /// A string literal that interpolates variables.
    Interpolated,
    /// `->` or `?->`
    Arrow,
    /// `::`
    DoubleColon,
    Char(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Lexed<'a> {
    token: Token<'a>,
    line: usize,
}

/// Extractor for files that are code from top to bottom.
#[derive(Debug, Clone)]
pub struct PlainExtractor {
    markers: MarkerTable,
}

impl PlainExtractor {
    pub fn new(markers: MarkerTable) -> Self {
        PlainExtractor { markers }
    }

    pub fn markers(&self) -> &MarkerTable {
        &self.markers
    }
}

impl Extractor for PlainExtractor {
    fn dialect(&self) -> Dialect {
        Dialect::Plain
    }

    fn extract(&self, source: &str) -> Vec<Message> {
        let tokens = lex(source);
        let mut messages = Vec::new();

        for (i, lexed) in tokens.iter().enumerate() {
            let Token::Ident(name) = lexed.token else {
                continue;
            };
            let Some(shape) = self.markers.get(name) else {
                continue;
            };
            if i > 0 && is_member_or_declaration(&tokens[i - 1].token) {
                continue;
            }
            if tokens.get(i + 1).map(|t| &t.token) != Some(&Token::Char('(')) {
                continue;
            }
            match literal_args(&tokens[i + 2..], shape.arity()) {
                Some(args) => {
                    let message = shape.message(args, lexed.line);
                    if message.msgid.is_empty() {
                        tracing::debug!(line = lexed.line, marker = name, "skipping empty msgid");
                        continue;
                    }
                    messages.push(message);
                }
                None => {
                    tracing::debug!(
                        line = lexed.line,
                        marker = name,
                        "skipping marker call with non-literal arguments"
                    );
                }
            }
        }
        messages
    }
}

fn is_member_or_declaration(previous: &Token) -> bool {
    match previous {
        Token::Arrow | Token::DoubleColon => true,
        Token::Ident(word) => word.eq_ignore_ascii_case("function"),
        _ => false,
    }
}

/// Reads `count` leading arguments, each a string literal or a `.`
/// concatenation of string literals.
fn literal_args(tokens: &[Lexed], count: usize) -> Option<Vec<String>> {
    let token_at = |pos: usize| tokens.get(pos).map(|t| &t.token);
    let mut args = Vec::with_capacity(count);
    let mut pos = 0;

    while args.len() < count {
        let Some(Token::Str(first)) = token_at(pos) else {
            return None;
        };
        let mut value = first.clone();
        pos += 1;
        while token_at(pos) == Some(&Token::Char('.')) {
            let Some(Token::Str(next)) = token_at(pos + 1) else {
                return None;
            };
            value.push_str(next);
            pos += 2;
        }
        args.push(value);

        match token_at(pos) {
            Some(Token::Char(',')) => pos += 1,
            Some(Token::Char(')')) if args.len() == count => {}
            _ => return None,
        }
    }
    Some(args)
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

fn lex(source: &str) -> Vec<Lexed<'_>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\n' => {
                line += 1;
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'#' if bytes.get(i + 1) != Some(&b'[') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = find(bytes, i + 2, b"*/").map_or(bytes.len(), |e| e + 2);
                line += count_newlines(&bytes[i..end]);
                i = end;
            }
            b'\'' | b'"' => {
                let start_line = line;
                let (token, end) = lex_string(bytes, i);
                line += count_newlines(&bytes[i..end]);
                tokens.push(Lexed {
                    token,
                    line: start_line,
                });
                i = end;
            }
            b'$' if bytes.get(i + 1).is_some_and(|&n| is_ident_start(n)) => {
                i += 1;
                while i < bytes.len() && is_ident_continue(bytes[i]) {
                    i += 1;
                }
                tokens.push(Lexed {
                    token: Token::Variable,
                    line,
                });
            }
            b if is_ident_start(b) => {
                let start = i;
                while i < bytes.len() && is_ident_continue(bytes[i]) {
                    i += 1;
                }
                tokens.push(Lexed {
                    token: Token::Ident(&source[start..i]),
                    line,
                });
            }
            b'-' if bytes.get(i + 1) == Some(&b'>') => {
                tokens.push(Lexed {
                    token: Token::Arrow,
                    line,
                });
                i += 2;
            }
            b'?' if bytes[i + 1..].starts_with(b"->") => {
                tokens.push(Lexed {
                    token: Token::Arrow,
                    line,
                });
                i += 3;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                tokens.push(Lexed {
                    token: Token::DoubleColon,
                    line,
                });
                i += 2;
            }
            _ => {
                tokens.push(Lexed {
                    token: Token::Char(char::from(b)),
                    line,
                });
                i += 1;
            }
        }
    }
    tokens
}

fn skip_line_comment(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| from + p)
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

fn count_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}

/// Lexes a quoted literal starting at `start`. Returns the token and the index
/// just past the closing quote (or the end of input when unterminated).
fn lex_string(bytes: &[u8], start: usize) -> (Token<'static>, usize) {
    let quote = bytes[start];
    let mut value = Vec::new();
    let mut interpolated = false;
    let mut i = start + 1;

    while i < bytes.len() {
        let b = bytes[i];
        if b == quote {
            let token = if interpolated {
                Token::Interpolated
            } else {
                Token::Str(String::from_utf8_lossy(&value).into_owned())
            };
            return (token, i + 1);
        }
        if b == b'\\' && i + 1 < bytes.len() {
            let next = bytes[i + 1];
            if quote == b'\'' {
                match next {
                    b'\'' | b'\\' => value.push(next),
                    _ => value.extend_from_slice(&[b'\\', next]),
                }
                i += 2;
                continue;
            }
            i = unescape_double(bytes, i, &mut value);
            continue;
        }
        if quote == b'"'
            && (b == b'$' && bytes.get(i + 1).is_some_and(|&n| is_ident_start(n) || n == b'{')
                || b == b'{' && bytes.get(i + 1) == Some(&b'$'))
        {
            interpolated = true;
        }
        value.push(b);
        i += 1;
    }
    (Token::Interpolated, bytes.len())
}

/// Decodes one escape sequence of a double-quoted literal at `i` (the
/// backslash). Returns the index after the sequence.
fn unescape_double(bytes: &[u8], i: usize, out: &mut Vec<u8>) -> usize {
    let next = bytes[i + 1];
    let simple = match next {
        b'n' => Some(b'\n'),
        b't' => Some(b'\t'),
        b'r' => Some(b'\r'),
        b'v' => Some(0x0b),
        b'e' => Some(0x1b),
        b'f' => Some(0x0c),
        b'\\' => Some(b'\\'),
        b'$' => Some(b'$'),
        b'"' => Some(b'"'),
        _ => None,
    };
    if let Some(byte) = simple {
        out.push(byte);
        return i + 2;
    }

    if (b'0'..=b'7').contains(&next) {
        let digits = bytes[i + 1..]
            .iter()
            .take(3)
            .take_while(|b| (b'0'..=b'7').contains(*b))
            .count();
        let value = bytes[i + 1..i + 1 + digits]
            .iter()
            .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
        out.push((value & 0xff) as u8);
        return i + 1 + digits;
    }

    if next == b'x' {
        let digits = bytes[i + 2..]
            .iter()
            .take(2)
            .take_while(|b| b.is_ascii_hexdigit())
            .count();
        if digits > 0 {
            let text = std::str::from_utf8(&bytes[i + 2..i + 2 + digits]).unwrap_or("0");
            out.push(u8::from_str_radix(text, 16).unwrap_or(0));
            return i + 2 + digits;
        }
    }

    if next == b'u' && bytes.get(i + 2) == Some(&b'{') {
        if let Some(close) = find(bytes, i + 3, b"}") {
            let decoded = std::str::from_utf8(&bytes[i + 3..close])
                .ok()
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .and_then(char::from_u32);
            if let Some(c) = decoded {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                return close + 1;
            }
        }
    }

    out.extend_from_slice(&[b'\\', next]);
    i + 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MarkerShape;
    use indoc::indoc;

    fn extract(source: &str) -> Vec<Message> {
        PlainExtractor::new(MarkerTable::default()).extract(source)
    }

    fn ids(source: &str) -> Vec<String> {
        extract(source).into_iter().map(|m| m.msgid).collect()
    }

    #[test]
    fn test_simple_markers_with_lines() {
        let source = indoc! {r#"
            <?php
            echo __('Hello');
            echo _("World");
            echo gettext('Again');
        "#};
        let messages = extract(source);
        let found: Vec<(&str, usize)> = messages
            .iter()
            .map(|m| (m.msgid.as_str(), m.line))
            .collect();
        assert_eq!(found, vec![("Hello", 2), ("World", 3), ("Again", 4)]);
    }

    #[test]
    fn test_context_and_plural_shapes() {
        let source = indoc! {r#"
            <?php
            p__('nav', 'Home');
            n__('%d file', '%d files', $count);
            np__('menu', 'item', 'items', 3);
        "#};
        let messages = extract(source);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].context.as_deref(), Some("nav"));
        assert_eq!(messages[0].msgid, "Home");
        assert_eq!(messages[1].msgid_plural.as_deref(), Some("%d files"));
        assert_eq!(messages[2].context.as_deref(), Some("menu"));
        assert_eq!(messages[2].msgid_plural.as_deref(), Some("items"));
    }

    #[test]
    fn test_markers_in_comments_and_strings_are_ignored() {
        let source = indoc! {r#"
            <?php
            // __('line comment')
            # __('hash comment')
            /* __('block
               comment') */
            $s = "__('inside string')";
            echo __('Real');
        "#};
        let messages = extract(source);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].msgid, "Real");
        assert_eq!(messages[0].line, 7);
    }

    #[test]
    fn test_member_static_variable_and_declarations_are_not_markers() {
        let source = indoc! {r#"
            <?php
            $this->__('method');
            $this?->__('nullsafe');
            Str::__('static');
            $__('variable');
            function __($text) { return $text; }
            \__('qualified');
        "#};
        assert_eq!(ids(source), vec!["qualified"]);
    }

    #[test]
    fn test_non_literal_arguments_are_skipped() {
        let source = indoc! {r#"
            <?php
            __($message);
            __("Hello $name");
            __(trim('x'));
            n__('one', $other, 2);
            __('ok');
        "#};
        assert_eq!(ids(source), vec!["ok"]);
    }

    #[test]
    fn test_concatenation_and_escapes() {
        let source = indoc! {r#"
            <?php
            __('It\'s ' . 'joined');
            __("Tab\there\n");
            __("Price: \$5 \x41\101 \u{e9}");
            __('C:\path');
        "#};
        assert_eq!(
            ids(source),
            vec!["It's joined", "Tab\there\n", "Price: $5 AA é", "C:\\path"]
        );
    }

    #[test]
    fn test_multiline_call_records_marker_line() {
        let source = "<?php\n\n__(\n  'Multi'\n);\n";
        let messages = extract(source);
        assert_eq!(messages[0].line, 3);
    }

    #[test]
    fn test_multiline_string_advances_line_count() {
        let source = "<?php\n$a = 'one\ntwo';\n__('after');\n";
        assert_eq!(extract(source)[0].line, 4);
    }

    #[test]
    fn test_empty_msgid_is_skipped() {
        assert!(ids("<?php __(''); ").is_empty());
    }

    #[test]
    fn test_nested_marker_in_non_literal_call() {
        assert_eq!(ids("<?php __(__('inner'));"), vec!["inner"]);
    }

    #[test]
    fn test_custom_marker_table() {
        let extractor = PlainExtractor::new(
            MarkerTable::empty().with_overrides([("t", MarkerShape::ContextId)]),
        );
        let messages = extractor.extract("<?php t('ctx', 'Hi'); __('ignored');");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].context.as_deref(), Some("ctx"));
        assert_eq!(extractor.dialect(), Dialect::Plain);
        assert_eq!(extractor.markers().len(), 1);
    }

    #[test]
    fn test_domain_shapes() {
        let messages = extract("<?php dp__('admin', 'menu', 'Users');");
        assert_eq!(messages[0].domain.as_deref(), Some("admin"));
        assert_eq!(messages[0].context.as_deref(), Some("menu"));
        assert_eq!(messages[0].msgid, "Users");
    }
}
