//! All supported catalog file formats for msgforge.
//!
//! This module re-exports the codec for each format and provides
//! the [`FormatType`] enum for generic format handling across the crate.

pub mod charset;
pub mod mo;
pub mod native;
pub mod po;

use std::{
    fmt::{Display, Formatter},
    path::Path,
    str::FromStr,
};

// Reexporting the formats for easier access
pub use mo::Format as MoFormat;
pub use native::Format as NativeFormat;
pub use po::Format as PoFormat;

use crate::{Error, traits::Parser, types::Catalog};

/// Represents the three on-disk catalog representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatType {
    /// Compiled gettext binary catalog (`.mo`).
    Mo,
    /// Portable gettext text catalog (`.po`), the human-editable one.
    Po,
    /// Serialized key → forms mapping (`.json`).
    Native,
}

impl FormatType {
    /// Every format, in the order `save` writes them (text last).
    pub const ALL: [FormatType; 3] = [FormatType::Mo, FormatType::Native, FormatType::Po];

    /// Runtime load preference used when nothing is configured.
    pub const DEFAULT_PREFERENCE: [FormatType; 3] =
        [FormatType::Native, FormatType::Mo, FormatType::Po];

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatType::Mo => "mo",
            FormatType::Po => "po",
            FormatType::Native => "json",
        }
    }

    /// Reads a catalog file in this format.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<Catalog, Error> {
        let path = path.as_ref();
        let catalog = match self {
            FormatType::Mo => MoFormat::read_from(path).map(Catalog::from),
            FormatType::Po => PoFormat::read_from(path).map(Catalog::from),
            FormatType::Native => NativeFormat::read_from(path).map(Catalog::from),
        };
        catalog.map_err(|e| e.at_path(path))
    }

    /// Writes a catalog file in this format.
    pub fn write<P: AsRef<Path>>(&self, catalog: &Catalog, path: P) -> Result<(), Error> {
        match self {
            FormatType::Mo => MoFormat::from(catalog).write_to(path),
            FormatType::Po => PoFormat::from(catalog).write_to(path),
            FormatType::Native => NativeFormat::from(catalog).write_to(path),
        }
    }
}

/// Implements [`std::fmt::Display`] for [`FormatType`].
///
/// # Example
/// ```rust
/// use msgforge::formats::FormatType;
/// assert_eq!(FormatType::Mo.to_string(), "mo");
/// assert_eq!(FormatType::Po.to_string(), "po");
/// assert_eq!(FormatType::Native.to_string(), "native");
/// ```
impl Display for FormatType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatType::Mo => write!(f, "mo"),
            FormatType::Po => write!(f, "po"),
            FormatType::Native => write!(f, "native"),
        }
    }
}

/// Implements [`std::str::FromStr`] for [`FormatType`].
///
/// Accepts the following case-insensitive strings:
/// - `"mo"`, `"binary"` → `FormatType::Mo`
/// - `"po"`, `"text"` → `FormatType::Po`
/// - `"native"`, `"json"`, `"php"` → `FormatType::Native`
///
/// Returns [`crate::error::Error::UnknownFormat`] for unknown strings.
///
/// # Example
/// ```rust
/// use msgforge::formats::FormatType;
/// use std::str::FromStr;
/// assert_eq!(FormatType::from_str("mo").unwrap(), FormatType::Mo);
/// assert_eq!(FormatType::from_str("php").unwrap(), FormatType::Native);
/// assert!(FormatType::from_str("xliff").is_err());
/// ```
impl FromStr for FormatType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "mo" | "binary" => Ok(FormatType::Mo),
            "po" | "text" => Ok(FormatType::Po),
            "native" | "json" | "php" => Ok(FormatType::Native),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}
