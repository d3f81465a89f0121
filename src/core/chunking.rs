//! Fixed-window document chunking.
//!
//! Windows are `chunk_size` characters long and start every `chunk_size - overlap`
//! characters, so consecutive chunks share `overlap` characters. Each chunk is
//! trimmed and whitespace-only chunks are dropped.

use anyhow::{Result, bail};
use tracing::debug;

pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        bail!("chunk size must be greater than zero");
    }
    if overlap >= chunk_size {
        bail!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap,
            chunk_size
        );
    }

    // Byte offset of every character, plus the end of the text
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;
    let step = chunk_size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < char_count {
        let end = (start + chunk_size).min(char_count);
        let chunk = text[bounds[start]..bounds[end]].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        start += step;
    }

    debug!("Split {} chars into {} chunks", char_count, chunks.len());
    Ok(chunks)
}
