//! Enumerates candidate source files under the configured roots.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::Error;

/// Walks a fixed set of root directories.
///
/// Every path segment below a root that starts with a dot is skipped. VCS
/// ignore files are deliberately not consulted.
#[derive(Debug, Clone)]
pub struct SourceScanner {
    roots: Vec<PathBuf>,
}

impl SourceScanner {
    /// Validates the roots eagerly: each must exist and be a directory.
    pub fn new<I, P>(roots: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut resolved = Vec::new();
        for root in roots {
            let root = root.as_ref();
            if !root.is_dir() {
                return Err(Error::configuration(format!(
                    "Folder {} does not exist",
                    root.display()
                )));
            }
            let root = root.canonicalize()?;
            if !resolved.contains(&root) {
                resolved.push(root);
            }
        }
        Ok(SourceScanner { roots: resolved })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Lazily yields absolute paths of regular files. Walk errors are yielded
    /// as items; the order is unspecified.
    pub fn files(&self) -> impl Iterator<Item = Result<PathBuf, Error>> + use<> {
        let mut roots = self.roots.iter();
        let walker = roots.next().map(|first| {
            let mut builder = WalkBuilder::new(first);
            for root in roots {
                builder.add(root);
            }
            builder
                .hidden(true)
                .ignore(false)
                .git_ignore(false)
                .git_global(false)
                .git_exclude(false)
                .parents(false)
                .follow_links(false)
                .build()
        });

        walker.into_iter().flatten().filter_map(|dent| match dent {
            Ok(dent) => {
                if dent.file_type().is_some_and(|t| t.is_file()) {
                    Some(Ok(dent.into_path()))
                } else {
                    None
                }
            }
            Err(e) => Some(Err(Error::Walk(e))),
        })
    }
}
