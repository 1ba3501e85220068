//! Strategy resolution and dispatch.

use std::sync::Arc;

use docsplit_core::{
    Chunk, EngineConfig, InputDocument, Result, SplitConfig, SplitError, Splitter,
};
use tracing::{debug, info};

use crate::registry::Registry;
use crate::segmenter::validate_patterns;

/// Strategy name that asks the pipeline to pick a splitter by score.
pub const AUTO: &str = "auto";

/// Top-level entry point: picks a splitter and runs it on a document.
pub struct Pipeline {
    registry: Registry,
    config: SplitConfig,
    default_strategy: String,
}

impl Pipeline {
    /// Create a pipeline over `registry` with default split options.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            config: SplitConfig::default(),
            default_strategy: AUTO.to_string(),
        }
    }

    /// Create a pipeline with every built-in splitter.
    pub fn with_defaults() -> Self {
        Self::new(Registry::with_defaults())
    }

    /// Create a pipeline with every built-in splitter and loaded settings.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            registry: Registry::with_defaults(),
            config: config.chunking.clone(),
            default_strategy: config.pipeline.default_strategy.clone(),
        }
    }

    /// Replace the global split options.
    pub fn with_config(mut self, config: SplitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    pub fn default_strategy(&self) -> &str {
        &self.default_strategy
    }

    /// Global options overlaid with the document's `config` map, validated.
    pub fn effective_config(&self, doc: &InputDocument) -> Result<SplitConfig> {
        let config = match doc.config_overrides() {
            Some(overrides) => self.config.merged_with(overrides)?,
            None => self.config.clone(),
        };
        config.validate()?;

        let separators: &[String] = config.separators.as_deref().unwrap_or(&[]);
        validate_patterns(separators, &config.protected_patterns)?;
        Ok(config)
    }

    /// Pick the splitter for `strategy`, scoring every splitter on `"auto"`.
    pub fn resolve(&self, doc: &InputDocument, strategy: &str) -> Result<&Arc<dyn Splitter>> {
        if strategy != AUTO {
            return self
                .registry
                .get(strategy)
                .ok_or_else(|| SplitError::UnsupportedType {
                    strategy: strategy.to_string(),
                    available: self.registry.types(),
                });
        }

        match self.registry.best_match(doc, strategy) {
            Some((splitter, score)) if score > 0.0 => {
                debug!(splitter = splitter.name(), score, "auto-detected splitter");
                Ok(splitter)
            }
            _ => Err(SplitError::NoSuitableSplitter),
        }
    }

    /// Confidence of every registered splitter for `doc`, in registration order.
    pub fn scores(&self, doc: &InputDocument) -> Vec<(&'static str, f64)> {
        self.registry
            .iter()
            .map(|s| (s.name(), s.score(doc, AUTO).clamp(0.0, 1.0)))
            .collect()
    }

    /// Split `doc` with the named strategy (or `"auto"`).
    pub fn run(&self, doc: &InputDocument, strategy: &str) -> Result<Vec<Chunk>> {
        let config = self.effective_config(doc)?;
        let splitter = self.resolve(doc, strategy)?;
        splitter.validate(&config)?;

        info!(
            doc_id = %doc.doc_id(),
            strategy,
            splitter = splitter.name(),
            "splitting document"
        );

        // An alias such as "python" tells the splitter what the content is.
        let tagged;
        let target = if strategy != AUTO && strategy != splitter.name() && doc.type_tag().is_none() {
            tagged = doc.clone().with_meta("type", strategy);
            &tagged
        } else {
            doc
        };

        let chunks = splitter
            .split(target, &config)
            .map_err(|e| SplitError::execution(splitter.name(), e))?;

        debug!(splitter = splitter.name(), chunks = chunks.len(), "split complete");
        Ok(chunks)
    }

    /// Split `doc` with the configured default strategy.
    pub fn run_default(&self, doc: &InputDocument) -> Result<Vec<Chunk>> {
        self.run(doc, &self.default_strategy)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_explicit_strategy_is_used_directly() {
        let pipeline = Pipeline::with_defaults();
        let doc = InputDocument::new("# Looks like markdown");
        let splitter = pipeline.resolve(&doc, "fixed_length").unwrap();
        assert_eq!(splitter.name(), "fixed_length");
    }

    #[test]
    fn test_auto_detection() {
        let pipeline = Pipeline::with_defaults();
        let cases = [
            ("# Title\n\nbody", "markdown"),
            ("plain words only", "recursive"),
            (r#"{"a": 1}"#, "json"),
        ];
        for (content, expected) in cases {
            let doc = InputDocument::new(content);
            assert_eq!(pipeline.resolve(&doc, AUTO).unwrap().name(), expected);
        }

        let code = InputDocument::new("x = 1").with_meta("extension", ".py");
        assert_eq!(pipeline.resolve(&code, AUTO).unwrap().name(), "code");
    }

    #[test]
    fn test_unknown_strategy_lists_available() {
        let pipeline = Pipeline::with_defaults();
        let err = pipeline
            .run(&InputDocument::new("text"), "xml")
            .unwrap_err();
        match err {
            SplitError::UnsupportedType { strategy, available } => {
                assert_eq!(strategy, "xml");
                assert!(available.contains(&"markdown".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_no_suitable_splitter() {
        let pipeline = Pipeline::new(Registry::new());
        let err = pipeline.run(&InputDocument::new("text"), AUTO).unwrap_err();
        assert_eq!(err.error_code(), "NO_SUITABLE_SPLITTER");

        let mut registry = Registry::new();
        registry.register(crate::SemanticSplitter::new());
        let err = Pipeline::new(registry)
            .run(&InputDocument::new("text"), AUTO)
            .unwrap_err();
        assert_eq!(err.error_code(), "NO_SUITABLE_SPLITTER");
    }

    #[test]
    fn test_document_config_overrides_global() {
        let pipeline = Pipeline::with_defaults().with_config(SplitConfig::sized(500, 0));
        let doc = InputDocument::new("x").with_config(json!({"chunk_overlap": 20}));
        let config = pipeline.effective_config(&doc).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 20);
    }

    #[test]
    fn test_bad_patterns_fail_before_dispatch() {
        let pipeline = Pipeline::with_defaults();
        let doc = InputDocument::new("text").with_config(json!({"protected_patterns": ["(unclosed"]}));
        let err = pipeline.run(&doc, "recursive").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");

        let doc = InputDocument::new("text").with_config(json!({"separators": ["(?=x)"]}));
        let err = pipeline.run(&doc, "recursive").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_unknown_encoder_is_a_config_error() {
        let pipeline = Pipeline::with_defaults();
        let doc = InputDocument::new("one. two.").with_config(json!({"encoder_function": "nope"}));
        let err = pipeline.run(&doc, "semantic").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_parent_size_only_checked_for_parent_document() {
        let pipeline = Pipeline::with_defaults();
        let doc = InputDocument::new("Some words to split.").with_config(json!({
            "chunk_size": 1000,
            "chunk_overlap": 100,
            "parent_chunk_size": 50
        }));
        assert_eq!(pipeline.run(&doc, "recursive").unwrap().len(), 1);

        let err = pipeline.run(&doc, "parent_document").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_splitter_errors_are_wrapped() {
        let pipeline = Pipeline::with_defaults();
        let err = pipeline
            .run(&InputDocument::new("{broken"), "json")
            .unwrap_err();
        assert_eq!(err.error_code(), "SPLITTER_EXECUTION_ERROR");
        assert!(err.to_string().contains("json"));
    }

    #[test]
    fn test_alias_strategy_tags_document() {
        let pipeline = Pipeline::with_defaults();
        let doc = InputDocument::new("def f():\n    return 1\n").with_id("m");
        let chunks = pipeline.run(&doc, "python").unwrap();
        assert_eq!(chunks[0].metadata["language"], "python");
    }

    #[test]
    fn test_default_strategy_from_engine_config() {
        let mut engine = EngineConfig::default();
        engine.pipeline.default_strategy = "fixed_length".to_string();
        engine.chunking = SplitConfig::sized(4, 0);
        let pipeline = Pipeline::from_config(&engine);

        let chunks = pipeline.run_default(&InputDocument::new("abcdefgh")).unwrap();
        let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["abcd", "efgh"]);
    }
}
