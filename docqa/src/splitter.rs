use std::iter;
use tracing::{info, warn};

use crate::{
    config::{CHUNK_OVERLAP, CHUNK_SIZE},
    loader::{Document, Metadata},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub metadata: Metadata,
    /// Position of this chunk within its document.
    pub index: usize,
    /// Character offset of the first character within its document.
    pub start: usize,
}

/// Splits documents into overlapping chunks of at most [`CHUNK_SIZE`] characters.
#[must_use]
pub fn split_documents(documents: Vec<Document>) -> Vec<Chunk> {
    let chunks = documents
        .into_iter()
        .flat_map(|document| {
            let metadata = document.metadata;

            split_text(&document.text, CHUNK_SIZE, CHUNK_OVERLAP)
                .into_iter()
                .enumerate()
                .map(move |(index, (start, text))| Chunk {
                    text,
                    index,
                    start,
                    metadata: metadata.clone(),
                })
        })
        .collect::<Vec<_>>();

    if chunks.is_empty() {
        warn!("Splitting resulted in zero chunks");
    } else {
        info!("Split documents into {} chunks", chunks.len());
    }

    chunks
}

/// Slides a `size`-character window over `text`, advancing by `size - overlap`.
/// Returns each window with its starting character offset.
fn split_text(text: &str, size: usize, overlap: usize) -> Vec<(usize, String)> {
    debug_assert!(overlap < size);

    let offsets = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(iter::once(text.len()))
        .collect::<Vec<_>>();
    let len = offsets.len() - 1;

    let mut windows = Vec::new();
    let mut start = 0;

    while start < len {
        let end = (start + size).min(len);
        windows.push((start, text[offsets[start]..offsets[end]].to_string()));

        if end == len {
            break;
        }

        start += size - overlap;
    }

    windows
}
