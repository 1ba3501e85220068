//! Core domain types for the chunking engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered key/value metadata attached to documents and chunks.
pub type Metadata = serde_json::Map<String, Value>;

/// Document id used when the metadata carries none.
pub const DEFAULT_DOC_ID: &str = "doc";

/// A document handed to the engine by the ingestion layer.
///
/// `metadata` conventionally carries the document `id`, an optional `type`
/// tag (`"markdown"`, `"json"`, ...), a file `extension`, and a nested
/// `config` object with per-call split options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputDocument {
    /// Flattened text content.
    pub content: String,

    /// Document metadata, copied into every chunk.
    #[serde(default)]
    pub metadata: Metadata,
}

impl InputDocument {
    /// Create a document with empty metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Set a metadata key.
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Set the document id.
    pub fn with_id(self, id: &str) -> Self {
        self.with_meta("id", id)
    }

    /// Set the per-call config object.
    pub fn with_config(self, config: Value) -> Self {
        self.with_meta("config", config)
    }

    /// Document id used as the prefix of every chunk id.
    pub fn doc_id(&self) -> String {
        match self.metadata.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => DEFAULT_DOC_ID.to_string(),
        }
    }

    /// Content type tag assigned upstream, if any.
    pub fn type_tag(&self) -> Option<&str> {
        self.metadata.get("type").and_then(Value::as_str)
    }

    /// File extension (with leading dot), if any.
    pub fn extension(&self) -> Option<&str> {
        self.metadata.get("extension").and_then(Value::as_str)
    }

    /// Per-call config overrides.
    pub fn config_overrides(&self) -> Option<&Metadata> {
        self.metadata.get("config").and_then(Value::as_object)
    }
}

/// One bounded unit of output text plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text content.
    pub content: String,

    /// Document metadata merged with chunk-specific keys.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    /// Create a chunk from content and an owned metadata map.
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Insert or replace a metadata key.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn chunk_id(&self) -> Option<&str> {
        self.str_field("chunk_id")
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.str_field("parent_id")
    }

    pub fn semantic_type(&self) -> Option<&str> {
        self.str_field("semantic_type")
    }

    pub fn part_index(&self) -> Option<u64> {
        self.metadata.get("part_index").and_then(Value::as_u64)
    }

    /// Ids of the chunks that point back at this one through `parent_id`.
    pub fn child_ids(&self) -> Option<Vec<&str>> {
        self.metadata
            .get("child_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).collect())
    }

    /// Whether this chunk is a header chunk.
    pub fn is_header(&self) -> bool {
        self.metadata
            .get("is_header")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Length of text in characters, the unit every size bound is expressed in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
