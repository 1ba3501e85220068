//! JSON structure splitter.
//!
//! Walks the parsed value instead of the text: list items and object keys
//! are grouped into chunks that are each valid JSON on their own.

use docsplit_core::{
    char_len, Chunk, InputDocument, Metadata, Result, SplitConfig, SplitError, Splitter,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::document_metadata;

fn compact_len(value: &Value) -> Result<usize> {
    Ok(char_len(&serde_json::to_string(value)?))
}

/// Serialized length of a single `"key": value` object.
fn entry_len(key: &str, value_len: usize) -> Result<usize> {
    let key_len = char_len(&serde_json::to_string(key)?);
    Ok(key_len + value_len + 3)
}

fn child_path(meta: &Metadata, key: &str) -> String {
    match meta.get("json_path").and_then(Value::as_str) {
        Some(path) if !path.is_empty() => format!("{}.{}", path, key),
        _ => key.to_string(),
    }
}

/// Accumulates JSON chunks in document order.
struct Packer {
    size: usize,
    out: Vec<(String, Metadata)>,
}

impl Packer {
    fn list_chunk(&mut self, batch: &[&Value], meta: &Metadata, start: usize, end: usize) -> Result<()> {
        let array = Value::Array(batch.iter().map(|v| (*v).clone()).collect());
        let mut metadata = meta.clone();
        metadata.insert("chunk_type".into(), "json_list".into());
        metadata.insert("item_count".into(), batch.len().into());
        metadata.insert("index_start".into(), start.into());
        metadata.insert("index_end".into(), end.into());
        self.out.push((serde_json::to_string_pretty(&array)?, metadata));
        Ok(())
    }

    fn object_chunk(&mut self, batch: Map<String, Value>, meta: &Metadata) -> Result<()> {
        let mut metadata = meta.clone();
        metadata.insert("chunk_type".into(), "json_object".into());
        metadata.insert("item_count".into(), batch.len().into());
        self.out
            .push((serde_json::to_string_pretty(&Value::Object(batch))?, metadata));
        Ok(())
    }

    /// Batch list items; a batch is flushed only once it holds `min_size` characters.
    fn pack_list(&mut self, items: &[Value], meta: &Metadata, min_size: usize) -> Result<()> {
        let mut batch: Vec<&Value> = Vec::new();
        let mut batch_len = 0;
        let mut start = 0;

        for (i, item) in items.iter().enumerate() {
            let len = compact_len(item)?;

            if len > self.size {
                if !batch.is_empty() {
                    self.list_chunk(&batch, meta, start, i - 1)?;
                    batch.clear();
                    batch_len = 0;
                }
                match item {
                    Value::Object(map) => {
                        let mut sub = meta.clone();
                        sub.insert("list_index".into(), i.into());
                        self.pack_object(map, &sub)?;
                    }
                    _ => self.list_chunk(&[item], meta, i, i)?,
                }
                start = i + 1;
                continue;
            }

            if batch_len + len > self.size && !batch.is_empty() && batch_len >= min_size {
                self.list_chunk(&batch, meta, start, i - 1)?;
                batch.clear();
                batch_len = 0;
                start = i;
            }
            batch.push(item);
            batch_len += len;
        }

        if !batch.is_empty() {
            self.list_chunk(&batch, meta, start, items.len() - 1)?;
        }
        Ok(())
    }

    fn pack_object(&mut self, map: &Map<String, Value>, meta: &Metadata) -> Result<()> {
        let mut batch = Map::new();
        let mut batch_len = 0;

        for (key, value) in map {
            let len = compact_len(value)?;

            if len > self.size {
                if !batch.is_empty() {
                    self.object_chunk(std::mem::take(&mut batch), meta)?;
                    batch_len = 0;
                }
                let mut sub = meta.clone();
                sub.insert("json_path".into(), child_path(meta, key).into());
                match value {
                    Value::Array(items) => self.pack_list(items, &sub, 0)?,
                    Value::Object(inner) => self.pack_object(inner, &sub)?,
                    scalar => {
                        let mut single = Map::new();
                        single.insert(key.clone(), scalar.clone());
                        self.object_chunk(single, &sub)?;
                    }
                }
                continue;
            }

            let entry = entry_len(key, len)?;
            if batch_len + entry > self.size && !batch.is_empty() {
                self.object_chunk(std::mem::take(&mut batch), meta)?;
                batch_len = 0;
            }
            batch.insert(key.clone(), value.clone());
            batch_len += entry;
        }

        if !batch.is_empty() {
            self.object_chunk(batch, meta)?;
        }
        Ok(())
    }
}

/// Splitter for JSON documents.
pub struct JsonSplitter;

impl JsonSplitter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn looks_like_json(content: &str) -> bool {
    let trimmed = content.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return false;
    }
    matches!(
        serde_json::from_str::<Value>(content),
        Ok(Value::Object(_)) | Ok(Value::Array(_))
    )
}

impl Splitter for JsonSplitter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["json", "dict", "record", "list"]
    }

    fn score(&self, doc: &InputDocument, strategy: &str) -> f64 {
        if self.supported_types().contains(&strategy) {
            return 1.0;
        }
        if let Some("json" | "record") = doc.type_tag() {
            return 1.0;
        }
        if looks_like_json(&doc.content) {
            return 1.0;
        }
        0.0
    }

    fn split(&self, doc: &InputDocument, config: &SplitConfig) -> Result<Vec<Chunk>> {
        let doc_id = doc.doc_id();
        let value: Value = serde_json::from_str(&doc.content)
            .map_err(|e| SplitError::invalid_input(format!("content is not valid JSON: {}", e)))?;

        let base = document_metadata(doc);
        let mut packer = Packer {
            size: config.chunk_size,
            out: Vec::new(),
        };

        match &value {
            Value::Array(items) => packer.pack_list(items, &base, config.min_chunk_size)?,
            Value::Object(map) => {
                if compact_len(&value)? <= config.chunk_size {
                    packer.object_chunk(map.clone(), &base)?
                } else {
                    packer.pack_object(map, &base)?
                }
            }
            scalar => {
                let mut metadata = base.clone();
                metadata.insert("chunk_type".into(), "json_value".into());
                packer.out.push((serde_json::to_string_pretty(scalar)?, metadata));
            }
        }

        let chunks: Vec<Chunk> = packer
            .out
            .into_iter()
            .enumerate()
            .map(|(i, (content, mut metadata))| {
                metadata.insert("chunk_id".into(), format!("{}_{}", doc_id, i).into());
                metadata.insert("part_index".into(), i.into());
                metadata.insert("chunk_size".into(), char_len(&content).into());
                Chunk::new(content, metadata)
            })
            .collect();

        debug!(doc_id = %doc_id, chunks = chunks.len(), "json split");
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn split(content: &str, config: SplitConfig) -> Vec<Chunk> {
        let doc = InputDocument::new(content).with_id("j");
        JsonSplitter::new().split(&doc, &config).unwrap()
    }

    #[test]
    fn test_list_items_batched() {
        let chunks = split(r#"[{"id":1},{"id":2},{"id":3}]"#, SplitConfig::sized(20, 0));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata["chunk_type"], "json_list");
        assert_eq!(chunks[0].metadata["item_count"], 2);
        assert_eq!(chunks[0].metadata["index_start"], 0);
        assert_eq!(chunks[0].metadata["index_end"], 1);
        assert_eq!(chunks[1].metadata["index_start"], 2);
        assert_eq!(chunks[1].chunk_id(), Some("j_1"));

        let parsed: Value = serde_json::from_str(&chunks[0].content).unwrap();
        assert_eq!(parsed, json!([{"id": 1}, {"id": 2}]));
    }

    #[test]
    fn test_min_chunk_size_delays_flush() {
        let mut config = SplitConfig::sized(20, 0);
        config.min_chunk_size = 20;
        let chunks = split(r#"[{"id":1},{"id":2},{"id":3},{"id":4}]"#, config);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata["item_count"], 3);
        assert_eq!(chunks[1].metadata["index_start"], 3);
    }

    #[test]
    fn test_nested_list_ignores_min_chunk_size() {
        let mut config = SplitConfig::sized(20, 0);
        config.min_chunk_size = 20;
        let chunks = split(r#"{"items":[{"id":1},{"id":2},{"id":3},{"id":4}]}"#, config);

        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert_eq!(chunk.metadata["json_path"], "items");
            assert_eq!(chunk.metadata["item_count"], 2);
        }
    }

    #[test]
    fn test_small_object_single_chunk() {
        let chunks = split(r#"{"name":"docsplit","version":1}"#, SplitConfig::default());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata["chunk_type"], "json_object");
        assert_eq!(
            chunks[0].content,
            "{\n  \"name\": \"docsplit\",\n  \"version\": 1\n}"
        );
    }

    #[test]
    fn test_large_object_descends_into_values() {
        let content = json!({
            "title": "report",
            "rows": [[1, 2, 3, 4, 5], [6, 7, 8, 9, 10], [11, 12, 13, 14, 15]],
            "owner": {"name": "ops team", "email": "ops@example.com"}
        })
        .to_string();
        let chunks = split(&content, SplitConfig::sized(30, 0));

        assert_eq!(chunks[0].content, "{\n  \"title\": \"report\"\n}");
        let rows: Vec<_> = chunks
            .iter()
            .filter(|c| c.metadata.get("json_path") == Some(&json!("rows")))
            .collect();
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|c| c.metadata["chunk_type"] == "json_list"));

        let owner: Vec<_> = chunks
            .iter()
            .filter(|c| c.metadata.get("json_path") == Some(&json!("owner")))
            .collect();
        assert!(!owner.is_empty());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.part_index(), Some(i as u64));
        }
    }

    #[test]
    fn test_invalid_json_is_invalid_input() {
        let doc = InputDocument::new("{not json");
        let err = JsonSplitter::new()
            .split(&doc, &SplitConfig::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_score() {
        let splitter = JsonSplitter::new();
        let array = InputDocument::new("  [1, 2, 3]");
        let record = InputDocument::new("x").with_meta("type", "record");
        let braces = InputDocument::new("{ not really json }");

        assert_eq!(splitter.score(&braces, "dict"), 1.0);
        assert_eq!(splitter.score(&record, "auto"), 1.0);
        assert_eq!(splitter.score(&array, "auto"), 1.0);
        assert_eq!(splitter.score(&braces, "auto"), 0.0);
    }
}
