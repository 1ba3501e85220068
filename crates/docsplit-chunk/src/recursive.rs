//! Recursive text splitter.
//!
//! Splits text by trying progressively smaller separators until every
//! chunk fits within `chunk_size` characters.

use docsplit_core::{char_len, Chunk, InputDocument, Result, SplitConfig, Splitter};
use tracing::debug;

use crate::document_metadata;
use crate::fixed::fixed_windows;
use crate::segmenter::{default_separators, split_with_protection};

/// Recursive splitter over a separator cascade.
///
/// Tries each separator in order until chunks are small enough:
/// 1. Double newline (paragraph breaks)
/// 2. Single newline
/// 3. Sentence boundaries (. ! ?)
/// 4. Word boundaries (space)
/// 5. Character (last resort)
pub struct RecursiveSplitter;

impl RecursiveSplitter {
    pub fn new() -> Self {
        Self
    }

    /// Trimmed, non-empty spans of `text` under `config`.
    pub(crate) fn spans(text: &str, config: &SplitConfig) -> Result<Vec<String>> {
        let raw = match &config.separators {
            // No cascade at all: plain fixed-length windows.
            Some(separators) if separators.is_empty() => {
                fixed_windows(text, config.chunk_size, config.chunk_overlap)?
            }
            Some(separators) => split_with_protection(
                text,
                separators,
                &config.protected_patterns,
                config.chunk_size,
                config.chunk_overlap,
            )?,
            None => split_with_protection(
                text,
                &default_separators(),
                &config.protected_patterns,
                config.chunk_size,
                config.chunk_overlap,
            )?,
        };

        Ok(raw
            .iter()
            .map(|span| span.trim())
            .filter(|span| !span.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Splitter for RecursiveSplitter {
    fn name(&self) -> &'static str {
        "recursive"
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["recursive"]
    }

    fn score(&self, doc: &InputDocument, strategy: &str) -> f64 {
        if strategy == "recursive" {
            return 1.0;
        }
        match doc.type_tag() {
            Some("text") | Some("txt") | Some("string") => 1.0,
            Some(_) => 0.1,
            None => 0.6,
        }
    }

    fn split(&self, doc: &InputDocument, config: &SplitConfig) -> Result<Vec<Chunk>> {
        let doc_id = doc.doc_id();
        let spans = Self::spans(&doc.content, config)?;

        let chunks: Vec<Chunk> = spans
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let mut metadata = document_metadata(doc);
                metadata.insert("chunk_id".into(), format!("{}_{}", doc_id, i).into());
                metadata.insert("chunk_size".into(), char_len(&text).into());
                metadata.insert("part_index".into(), i.into());
                Chunk::new(text, metadata)
            })
            .collect();

        debug!(doc_id = %doc_id, chunks = chunks.len(), "recursive split");
        Ok(chunks)
    }
}
