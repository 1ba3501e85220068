//! Configuration types for the chunking engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, SplitError};
use crate::types::Metadata;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pipeline configuration.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Global split options, overridden per document by `metadata.config`.
    #[serde(default)]
    pub chunking: SplitConfig,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Strategy used when the caller does not name one.
    #[serde(default = "default_strategy")]
    pub default_strategy: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_strategy: default_strategy(),
        }
    }
}

/// Which splitter produces parent chunks in the parent-document strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentStrategy {
    #[default]
    Recursive,
    Structure,
}

/// Split options recognized by the splitters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters of trailing context repeated at the start of the next chunk.
    #[serde(default)]
    pub chunk_overlap: usize,

    /// Separator cascade; `None` uses the splitter's own default.
    #[serde(default)]
    pub separators: Option<Vec<String>>,

    /// Regions that must never be subdivided.
    #[serde(default)]
    pub protected_patterns: Vec<String>,

    /// Structural marker each section starts at (structure splitter).
    #[serde(default = "default_structure_pattern")]
    pub structure_pattern: String,

    /// Parent chunk size (parent-document splitter).
    #[serde(default = "default_parent_chunk_size")]
    pub parent_chunk_size: usize,

    /// Parent chunk strategy (parent-document splitter).
    #[serde(default)]
    pub parent_strategy: ParentStrategy,

    /// Named sentence encoder (semantic splitter).
    #[serde(default)]
    pub encoder_function: Option<String>,

    /// Similarity below which a new sentence group starts (semantic splitter).
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,

    /// Serialized size a JSON list batch must reach before it may be flushed.
    #[serde(default)]
    pub min_chunk_size: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: 0,
            separators: None,
            protected_patterns: Vec::new(),
            structure_pattern: default_structure_pattern(),
            parent_chunk_size: default_parent_chunk_size(),
            parent_strategy: ParentStrategy::default(),
            encoder_function: None,
            semantic_threshold: default_semantic_threshold(),
            min_chunk_size: 0,
        }
    }
}

impl SplitConfig {
    /// Config with the given size and overlap, everything else default.
    pub fn sized(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }

    /// Check size constraints.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SplitError::invalid_config("chunk_size must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(SplitError::invalid_config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.parent_chunk_size == 0 {
            return Err(SplitError::invalid_config(
                "parent_chunk_size must be positive",
            ));
        }
        if !self.semantic_threshold.is_finite() {
            return Err(SplitError::invalid_config(
                "semantic_threshold must be a finite number",
            ));
        }
        Ok(())
    }

    /// Overlay `overrides` on top of this config.
    ///
    /// Keys not known to `SplitConfig` are ignored; a known key with a value
    /// of the wrong type is an `InvalidConfig` error.
    pub fn merged_with(&self, overrides: &Metadata) -> Result<Self> {
        let mut base = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            _ => Metadata::new(),
        };
        for (key, value) in overrides {
            base.insert(key.clone(), value.clone());
        }
        serde_json::from_value(serde_json::Value::Object(base))
            .map_err(|e| SplitError::invalid_config(format!("invalid split config: {}", e)))
    }
}

// Default value functions

fn default_strategy() -> String {
    "auto".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_structure_pattern() -> String {
    r"\n\n".to_string()
}

fn default_parent_chunk_size() -> usize {
    2000
}

fn default_semantic_threshold() -> f32 {
    0.5
}

impl EngineConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| SplitError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;
        config.chunking.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("docsplit").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("docsplit.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }
}
