//! Parent/child hierarchy builder.
//!
//! Large parent chunks keep context for generation, small child chunks give
//! precise retrieval. Children carry `parent_id`; parents list their
//! children in `child_ids`.

use docsplit_core::{
    Chunk, InputDocument, ParentStrategy, Result, SplitConfig, SplitError, Splitter,
};
use serde_json::Value;
use tracing::debug;

use crate::recursive::RecursiveSplitter;
use crate::structure::StructureSplitter;

/// Two-level parent/child splitter.
pub struct ParentDocumentSplitter {
    recursive: RecursiveSplitter,
    structure: StructureSplitter,
}

impl ParentDocumentSplitter {
    pub fn new() -> Self {
        Self {
            recursive: RecursiveSplitter::new(),
            structure: StructureSplitter::new(),
        }
    }

    fn parent_splitter(&self, strategy: ParentStrategy) -> &dyn Splitter {
        match strategy {
            ParentStrategy::Recursive => &self.recursive,
            ParentStrategy::Structure => &self.structure,
        }
    }
}

impl Default for ParentDocumentSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Splitter for ParentDocumentSplitter {
    fn name(&self) -> &'static str {
        "parent_document"
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["parent_document"]
    }

    fn score(&self, _doc: &InputDocument, strategy: &str) -> f64 {
        if strategy == "parent_document" {
            1.0
        } else {
            0.0
        }
    }

    fn validate(&self, config: &SplitConfig) -> Result<()> {
        if config.chunk_overlap >= config.parent_chunk_size {
            return Err(SplitError::invalid_config(format!(
                "chunk_overlap ({}) must be smaller than parent_chunk_size ({})",
                config.chunk_overlap, config.parent_chunk_size
            )));
        }
        Ok(())
    }

    fn split(&self, doc: &InputDocument, config: &SplitConfig) -> Result<Vec<Chunk>> {
        let doc_id = doc.doc_id();

        let parent_config = SplitConfig {
            chunk_size: config.parent_chunk_size,
            ..config.clone()
        };
        let parents = self
            .parent_splitter(config.parent_strategy)
            .split(doc, &parent_config)?;

        let mut output = Vec::with_capacity(parents.len() * 2);
        for (p_idx, mut parent) in parents.into_iter().enumerate() {
            let parent_id = format!("{}_parent_{}", doc_id, p_idx);
            let section_context = parent
                .semantic_type()
                .unwrap_or("unknown")
                .to_string();

            let mut child_doc = InputDocument {
                content: parent.content.clone(),
                metadata: doc.metadata.clone(),
            };
            child_doc
                .metadata
                .insert("parent_id".into(), parent_id.clone().into());
            child_doc
                .metadata
                .insert("section_context".into(), section_context.into());

            let mut children = self.recursive.split(&child_doc, config)?;
            let mut child_ids = Vec::with_capacity(children.len());
            for (c_idx, child) in children.iter_mut().enumerate() {
                let child_id = format!("{}_c{}", parent_id, c_idx);
                child.set("chunk_id", child_id.clone());
                child.set("part_index", c_idx);
                child.set("doc_level", "child");
                child.set("parent_id", parent_id.clone());
                child_ids.push(Value::from(child_id));
            }

            parent.set("chunk_id", parent_id);
            parent.set("part_index", p_idx);
            parent.set("doc_level", "parent");
            parent.set("child_ids", child_ids);

            output.push(parent);
            output.append(&mut children);
        }

        debug!(doc_id = %doc_id, chunks = output.len(), "parent/child split");
        Ok(output)
    }
}
