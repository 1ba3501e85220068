//! Fixed-length chunking strategy with overlap.

use docsplit_core::{char_len, Chunk, InputDocument, Result, SplitConfig, SplitError, Splitter};

use crate::document_metadata;

/// Slides a window of `chunk_size` characters over the content.
///
/// Ignores every semantic boundary; useful as a baseline and as the
/// fallback when a caller configures an empty separator cascade.
pub struct FixedLengthSplitter;

impl FixedLengthSplitter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FixedLengthSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `text` into windows of `size` characters advancing by `size - overlap`.
pub fn fixed_windows(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    if size == 0 || overlap >= size {
        return Err(SplitError::invalid_config(format!(
            "fixed-length windows need 0 <= chunk_overlap < chunk_size, got {} and {}",
            overlap, size
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    let step = size - overlap;
    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        start += step;
    }
    Ok(windows)
}

impl Splitter for FixedLengthSplitter {
    fn name(&self) -> &'static str {
        "fixed_length"
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["fixed_length"]
    }

    fn score(&self, doc: &InputDocument, strategy: &str) -> f64 {
        if strategy == "fixed_length" {
            return 1.0;
        }
        // Untagged raw text is something every window can handle.
        if doc.type_tag().is_none() {
            return 0.4;
        }
        0.0
    }

    fn split(&self, doc: &InputDocument, config: &SplitConfig) -> Result<Vec<Chunk>> {
        let doc_id = doc.doc_id();
        let windows = fixed_windows(&doc.content, config.chunk_size, config.chunk_overlap)?;

        let chunks: Vec<Chunk> = windows
            .into_iter()
            .filter(|w| !w.trim().is_empty())
            .enumerate()
            .map(|(i, window)| {
                let mut metadata = document_metadata(doc);
                metadata.insert("chunk_id".into(), format!("{}_{}", doc_id, i).into());
                metadata.insert("part_index".into(), i.into());
                metadata.insert("chunk_size".into(), char_len(&window).into());
                Chunk::new(window, metadata)
            })
            .collect();

        tracing::debug!(doc_id = %doc_id, chunks = chunks.len(), "fixed-length split");
        Ok(chunks)
    }
}
