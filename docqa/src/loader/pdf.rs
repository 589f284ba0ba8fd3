use lazy_static::lazy_static;
use regex::Regex;
use std::{fs, panic, path::Path};
use tracing::debug;

use super::{Document, DocumentKind, LoadError, Metadata};

lazy_static! {
    static ref TRAILING_WS_RE: Regex = Regex::new(r"[ \t]+\n").unwrap();
    static ref BLANK_LINES_RE: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Extracts one document per non-blank page. Images are ignored.
pub fn load(path: &Path) -> Result<Vec<Document>, LoadError> {
    let bytes = fs::read(path).map_err(|err| LoadError::from_io(path, err))?;

    // pdf-extract panics on some malformed fonts and streams
    let pages = panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .map_err(|_| LoadError::Parse {
            path: path.to_path_buf(),
            message: "PDF parser panicked".to_string(),
        })?
        .map_err(|err| {
            let message = err.to_string();

            if is_encryption_error(&message) {
                LoadError::Encrypted(path.to_path_buf())
            } else {
                LoadError::Parse {
                    path: path.to_path_buf(),
                    message,
                }
            }
        })?;

    debug!("Extracted {} pages from {}", pages.len(), path.display());

    Ok(pages
        .iter()
        .enumerate()
        .map(|(i, page)| (i + 1, normalize(page)))
        .filter(|(_, text)| !text.is_empty())
        .map(|(page, text)| Document {
            text,
            metadata: Metadata {
                source: path.to_path_buf(),
                page: Some(page),
                kind: DocumentKind::Pdf,
            },
        })
        .collect())
}

fn is_encryption_error(message: &str) -> bool {
    let message = message.to_lowercase();

    message.contains("password") || message.contains("encrypt") || message.contains("decrypt")
}

fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = TRAILING_WS_RE.replace_all(&text, "\n");

    BLANK_LINES_RE.replace_all(&text, "\n\n").trim().to_string()
}
