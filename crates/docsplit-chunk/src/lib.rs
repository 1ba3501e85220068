//! docsplit-chunk - Chunking engine
//!
//! This crate turns an [`InputDocument`] into an ordered list of bounded
//! [`Chunk`]s, keeping tables, code fences and embedded images whole.
//!
//! # Splitters
//!
//! - [`RecursiveSplitter`]: Recursively splits text using progressively smaller
//!   separators (paragraphs, lines, sentences, words, characters).
//!
//! - [`FixedLengthSplitter`]: Fixed-stride character windows.
//!
//! - [`StructureSplitter`]: Sections starting at a structural marker, re-split
//!   only when oversized.
//!
//! - [`MarkdownSplitter`]: Header chunks plus classified body fragments
//!   linked back to their header.
//!
//! - [`SemanticSplitter`]: Runs of adjacent sentences with similar encodings.
//!
//! - [`CodeSplitter`]: Syntax-aware splitting for Python, regex cascades for
//!   other languages.
//!
//! - [`ParentDocumentSplitter`]: Two-level parent/child hierarchy.
//!
//! - [`JsonSplitter`]: Structure-preserving JSON batches.
//!
//! The [`Pipeline`] picks one of these by name or by confidence score.
//!
//! # Example
//!
//! ```rust
//! use docsplit_chunk::{InputDocument, Pipeline};
//!
//! let pipeline = Pipeline::with_defaults();
//! let doc = InputDocument::new("# Title\n\nSome text.").with_id("readme");
//! let chunks = pipeline.run(&doc, "auto").unwrap();
//! assert_eq!(chunks[0].content, "# Title");
//! assert_eq!(chunks[1].parent_id(), Some("readme_h_0"));
//! ```

mod code;
mod fixed;
mod json;
mod markdown;
mod parent;
mod pipeline;
mod recursive;
mod registry;
mod segmenter;
mod semantic;
mod structure;

pub use code::{resolve_language, CodeSplitter, Language};
pub use fixed::{fixed_windows, FixedLengthSplitter};
pub use json::JsonSplitter;
pub use markdown::{classify_fragment, MarkdownSplitter, MARKDOWN_PROTECTED, MARKDOWN_SEPARATORS};
pub use parent::ParentDocumentSplitter;
pub use pipeline::{Pipeline, AUTO};
pub use recursive::RecursiveSplitter;
pub use registry::Registry;
pub use segmenter::{
    default_separators, split_with_protection, validate_patterns, Segmenter, DEFAULT_SEPARATORS,
};
pub use semantic::{
    group_sentences, sentences, CharFrequencyEncoder, SemanticSplitter, CHAR_FREQUENCY,
};
pub use structure::StructureSplitter;

// Re-export types for convenience
pub use docsplit_core::{
    Chunk, InputDocument, Metadata, Result, SentenceEncoder, SplitConfig, SplitError, Splitter,
};

/// Fresh copy of the document metadata to build a chunk's metadata on.
pub(crate) fn document_metadata(doc: &InputDocument) -> Metadata {
    doc.metadata.clone()
}
