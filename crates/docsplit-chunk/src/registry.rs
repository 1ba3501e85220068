//! Splitter registry.
//!
//! Built once before the first split call and read-only afterwards, so a
//! `Registry` can be shared freely between threads.

use std::collections::HashMap;
use std::sync::Arc;

use docsplit_core::{InputDocument, Splitter};

use crate::{
    CodeSplitter, FixedLengthSplitter, JsonSplitter, MarkdownSplitter, ParentDocumentSplitter,
    RecursiveSplitter, SemanticSplitter, StructureSplitter,
};

/// Table of splitters keyed by the strategy tags they handle.
#[derive(Default)]
pub struct Registry {
    splitters: Vec<Arc<dyn Splitter>>,
    by_type: HashMap<String, usize>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in splitter.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(RecursiveSplitter::new());
        registry.register(FixedLengthSplitter::new());
        registry.register(StructureSplitter::new());
        registry.register(SemanticSplitter::new());
        registry.register(ParentDocumentSplitter::new());
        registry.register(MarkdownSplitter::new());
        registry.register(CodeSplitter::new());
        registry.register(JsonSplitter::new());
        registry
    }

    /// Add a splitter. Tags already taken are moved to the new splitter.
    pub fn register<S>(&mut self, splitter: S) -> &mut Self
    where
        S: Splitter + 'static,
    {
        self.register_arc(Arc::new(splitter))
    }

    /// Add a shared splitter.
    pub fn register_arc(&mut self, splitter: Arc<dyn Splitter>) -> &mut Self {
        let idx = self.splitters.len();
        for tag in splitter.supported_types() {
            self.by_type.insert((*tag).to_string(), idx);
        }
        self.splitters.push(splitter);
        self
    }

    /// Splitter registered under `tag`.
    pub fn get(&self, tag: &str) -> Option<&Arc<dyn Splitter>> {
        self.by_type.get(tag).map(|&idx| &self.splitters[idx])
    }

    /// All registered tags, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.by_type.keys().cloned().collect();
        types.sort();
        types
    }

    /// Splitters in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Splitter>> {
        self.splitters.iter()
    }

    pub fn len(&self) -> usize {
        self.splitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splitters.is_empty()
    }

    /// Highest-scoring splitter for `doc`, with its score.
    ///
    /// Only a strictly higher score replaces the current best, so ties go
    /// to the splitter registered first.
    pub fn best_match(&self, doc: &InputDocument, strategy: &str) -> Option<(&Arc<dyn Splitter>, f64)> {
        let mut best: Option<(&Arc<dyn Splitter>, f64)> = None;
        for splitter in &self.splitters {
            let score = splitter.score(doc, strategy).clamp(0.0, 1.0);
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((splitter, score)),
            }
        }
        best
    }
}
