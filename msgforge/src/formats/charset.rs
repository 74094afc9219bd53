//! Charset handling shared by the PO and MO codecs.
//!
//! Both formats declare their encoding in the header (`Content-Type: ...; charset=X`),
//! which can only be read after the bytes are at least partly decoded. The header is
//! ASCII in every encoding gettext supports, so a lossy UTF-8 view is enough to sniff it.

use encoding_rs::{Encoding, UTF_8};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Error;

lazy_static! {
    static ref CHARSET_REGEX: Regex = Regex::new(r"charset=([A-Za-z0-9_.:\-]+)").unwrap();
}

/// Finds the charset declared in a header text.
pub fn sniff_charset(text: &str) -> Option<&str> {
    CHARSET_REGEX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|cs| *cs != "CHARSET")
}

/// Resolves a charset label, treating unknown or placeholder labels as UTF-8.
pub fn encoding_for(label: Option<&str>) -> &'static Encoding {
    label
        .and_then(|l| Encoding::for_label(l.as_bytes()))
        .unwrap_or(UTF_8)
}

/// Decodes `bytes` with the given encoding. A BOM overrides the declared encoding.
///
/// Malformed sequences are reported instead of being replaced.
pub fn decode(
    bytes: &[u8],
    encoding: &'static Encoding,
    format: &'static str,
) -> Result<String, Error> {
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(Error::parse(
            format,
            "content",
            format!("invalid {} byte sequence", used.name()),
        ));
    }
    Ok(text.into_owned())
}

/// Encodes `text` with the given encoding (UTF-16 labels fall back to UTF-8).
///
/// Characters the encoding cannot represent are an error rather than being
/// replaced with numeric character references.
pub fn encode(
    text: &str,
    encoding: &'static Encoding,
    format: &'static str,
) -> Result<Vec<u8>, Error> {
    let (bytes, used, had_errors) = encoding.output_encoding().encode(text);
    if had_errors {
        let offending = text
            .chars()
            .find(|c| {
                let mut buf = [0u8; 4];
                used.encode(c.encode_utf8(&mut buf)).2
            })
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        return Err(Error::parse(
            format,
            "content",
            format!("charset {} cannot represent {:?}", used.name(), offending),
        ));
    }
    Ok(bytes.into_owned())
}
