//! Structure-first splitter.
//!
//! Cuts the document before every match of a structural marker (for example
//! `Article \d+`), keeps sections that already fit intact, and re-splits only
//! the oversized ones.

use docsplit_core::{char_len, Chunk, InputDocument, Result, SplitConfig, Splitter};
use regex::Regex;
use tracing::{debug, warn};

use crate::document_metadata;
use crate::recursive::RecursiveSplitter;

/// Splits on a caller-supplied structure pattern, then recursively.
pub struct StructureSplitter;

impl StructureSplitter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StructureSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `text` before each match of `marker`, trimming the pieces.
fn sections<'a>(text: &'a str, marker: &Regex) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut last = 0;
    for m in marker.find_iter(text) {
        if m.start() > last {
            out.push(&text[last..m.start()]);
            last = m.start();
        }
    }
    out.push(&text[last..]);
    out.into_iter().map(str::trim).collect()
}

fn structure_sections<'a>(text: &'a str, pattern: &str) -> Vec<&'a str> {
    match Regex::new(&format!("(?m){}", pattern)) {
        Ok(marker) => sections(text, &marker),
        Err(e) => {
            warn!(pattern, error = %e, "invalid structure pattern, splitting on blank lines");
            text.split("\n\n").map(str::trim).collect()
        }
    }
}

impl Splitter for StructureSplitter {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["structure"]
    }

    fn score(&self, doc: &InputDocument, strategy: &str) -> f64 {
        if strategy == "structure" {
            return 1.0;
        }
        if let Some("md" | "markdown" | "html" | "table" | "json") = doc.type_tag() {
            return 0.9;
        }
        let content = doc.content.trim_start();
        if content.starts_with("<html") || content.starts_with("<!DOCTYPE") || content.starts_with("<div") {
            return 0.8;
        }
        if doc.content.contains("```") || doc.content.contains("~~~") {
            return 0.8;
        }
        0.0
    }

    fn split(&self, doc: &InputDocument, config: &SplitConfig) -> Result<Vec<Chunk>> {
        let doc_id = doc.doc_id();
        let mut chunks = Vec::new();
        for (i, section) in structure_sections(&doc.content, &config.structure_pattern)
            .into_iter()
            .enumerate()
        {
            if section.is_empty() {
                continue;
            }

            if char_len(section) <= config.chunk_size {
                let mut metadata = document_metadata(doc);
                metadata.insert("parent_structure_idx".into(), i.into());
                metadata.insert("chunk_id".into(), format!("{}_s{}", doc_id, i).into());
                metadata.insert("chunk_size".into(), char_len(section).into());
                metadata.insert("semantic_type".into(), "structure_section".into());
                chunks.push(Chunk::new(section, metadata));
                continue;
            }

            let parts = RecursiveSplitter::spans(section, config)?;
            for (j, part) in parts.iter().enumerate() {
                let mut metadata = document_metadata(doc);
                metadata.insert("parent_structure_idx".into(), i.into());
                metadata.insert("chunk_id".into(), format!("{}_s{}_p{}", doc_id, i, j).into());
                metadata.insert("chunk_size".into(), char_len(part).into());
                metadata.insert("semantic_type".into(), "text_fragment".into());
                chunks.push(Chunk::new(part, metadata));
            }
        }

        for (index, chunk) in chunks.iter_mut().enumerate() {
            chunk.set("part_index", index);
        }

        debug!(doc_id = %doc_id, chunks = chunks.len(), "structure split");
        Ok(chunks)
    }
}
