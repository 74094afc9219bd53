//! All error types for the msgforge crate.
//!
//! These are returned from all fallible operations (scanning, parsing, persisting, configuration).
//! A catalog file that simply does not exist is never an error; loaders return `None` instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("parse error in {format} ({location}): {message}")]
    Parse {
        format: &'static str,
        location: String,
        message: String,
    },

    #[error("unknown format `{0}`")]
    UnknownFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("directory walk error: {0}")]
    Walk(#[from] ignore::Error),

    #[error("invalid file pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("could not persist file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl Error {
    /// Creates a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Creates a new parse error for the given format and location (path, line, or byte offset)
    pub fn parse(
        format: &'static str,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Parse {
            format,
            location: location.into(),
            message: message.into(),
        }
    }

    /// Prefixes the location of a parse error with the file it came from.
    pub fn at_path(self, path: &std::path::Path) -> Self {
        match self {
            Error::Parse {
                format,
                location,
                message,
            } => Error::Parse {
                format,
                location: format!("{}: {}", path.display(), location),
                message,
            },
            other => other,
        }
    }

    /// Returns true when the error describes malformed catalog content.
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse { .. } | Error::Json(_))
    }
}
