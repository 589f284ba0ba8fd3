mod kind;
mod pdf;

pub use kind::{DocumentKind, Language, Registry};

use std::{
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open {}. The PDF might be password-protected.", .0.display())]
    Encrypted(PathBuf),

    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("No document content loaded from {}. The file might be empty or corrupted.", .0.display())]
    Empty(PathBuf),

    #[error("Unsupported file type '{extension}' for {}", .path.display())]
    Unsupported { path: PathBuf, extension: String },

    #[error("No supported documents found in {}", .0.display())]
    NoDocuments(PathBuf),
}

impl LoadError {
    pub(crate) fn from_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Unreadable {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub source: PathBuf,
    /// 1-based page number, for paginated formats.
    pub page: Option<usize>,
    pub kind: DocumentKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default)]
pub struct Loader {
    registry: Registry,
}

impl Loader {
    #[must_use]
    pub const fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Loads a single file, or every supported file under a directory.
    ///
    /// # Errors
    ///
    /// - If the path doesn't exist.
    /// - If a single file is unsupported, unreadable or empty.
    /// - If a directory contains no loadable document.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Document>, LoadError> {
        let path = path.as_ref();

        let metadata = fs::metadata(path).map_err(|err| LoadError::from_io(path, err))?;
        let documents = if metadata.is_dir() {
            self.load_dir(path)?
        } else {
            self.load_file(path)?
        };

        info!(
            "Loaded {} document sections from {}",
            documents.len(),
            path.display()
        );

        Ok(documents)
    }

    fn load_dir(&self, path: &Path) -> Result<Vec<Document>, LoadError> {
        let mut files = read_dir_recursive(path).map_err(|err| LoadError::from_io(path, err))?;
        files.sort();

        let mut documents = Vec::new();
        for file in files {
            match self.load_file(&file) {
                Ok(docs) => documents.extend(docs),
                Err(err) => warn!("Skipping file: {err}"),
            }
        }

        if documents.is_empty() {
            return Err(LoadError::NoDocuments(path.to_path_buf()));
        }

        Ok(documents)
    }

    fn load_file(&self, path: &Path) -> Result<Vec<Document>, LoadError> {
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or_default();

        let kind = self
            .registry
            .kind_for(extension)
            .ok_or_else(|| LoadError::Unsupported {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            })?;

        debug!("Loading {kind} document from {}", path.display());
        let documents = match kind {
            DocumentKind::Pdf => pdf::load(path)?,
            DocumentKind::Text | DocumentKind::Source(_) => load_text(path, kind)?,
        };

        if documents.is_empty() {
            return Err(LoadError::Empty(path.to_path_buf()));
        }

        Ok(documents)
    }
}

fn load_text(path: &Path, kind: DocumentKind) -> Result<Vec<Document>, LoadError> {
    let text = fs::read_to_string(path).map_err(|err| LoadError::from_io(path, err))?;

    if text.trim().is_empty() {
        return Ok(vec![]);
    }

    Ok(vec![Document {
        text,
        metadata: Metadata {
            source: path.to_path_buf(),
            page: None,
            kind,
        },
    }])
}

fn read_dir_recursive(path: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = fs::read_dir(path)?.collect::<Result<Vec<_>, io::Error>>()?;

    Ok(entries
        .into_iter()
        .flat_map(|entry| {
            let path = entry.path();

            // symlinked directories are not followed, so cycles can't recurse forever
            if entry.file_type().map_or(false, |t| t.is_dir()) {
                read_dir_recursive(&path).unwrap_or_else(|err| {
                    warn!("Skipping directory {}: {err}", path.display());
                    vec![]
                })
            } else {
                vec![path]
            }
        })
        .collect())
}
