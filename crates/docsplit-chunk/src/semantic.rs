//! Semantic chunking based on similarity between adjacent sentences.

use std::collections::HashMap;
use std::sync::Arc;

use docsplit_core::{
    char_len, Chunk, InputDocument, Result, SentenceEncoder, SplitConfig, SplitError, Splitter,
};
use tracing::debug;

use crate::document_metadata;

/// Name of the built-in encoder.
pub const CHAR_FREQUENCY: &str = "char_frequency";

/// Encodes text as its normalized histogram of code points modulo 10.
///
/// Cheap and deterministic; good enough to separate runs of sentences
/// with visibly different alphabets, and meant to be swapped for a real
/// embedding model through [`SemanticSplitter::with_encoder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CharFrequencyEncoder;

impl SentenceEncoder for CharFrequencyEncoder {
    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; 10];
        for c in text.chars() {
            vector[(c as u32 % 10) as usize] += 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

fn normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in vector.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// Cosine similarity of two pre-normalized vectors.
fn similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Naive sentence segmentation on `". "` and newlines.
pub fn sentences(text: &str) -> Vec<String> {
    text.replace('\n', ". ")
        .split(". ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Group adjacent sentences until similarity drops below `threshold`.
pub fn group_sentences(
    sentences: &[String],
    encoder: &dyn SentenceEncoder,
    threshold: f32,
) -> Vec<Vec<String>> {
    let Some(first) = sentences.first() else {
        return Vec::new();
    };

    let vectors: Vec<Vec<f32>> = sentences.iter().map(|s| encoder.encode(s)).collect();
    let mut groups = Vec::new();
    let mut current = vec![first.clone()];

    for (i, pair) in vectors.windows(2).enumerate() {
        if similarity(&pair[0], &pair[1]) < threshold {
            groups.push(std::mem::take(&mut current));
        }
        current.push(sentences[i + 1].clone());
    }
    groups.push(current);
    groups
}

fn join_group(group: &[String]) -> String {
    let mut text = group.join(". ");
    if !text.ends_with(&['.', '!', '?'][..]) {
        text.push('.');
    }
    text
}

/// Splits text into runs of topically similar sentences.
pub struct SemanticSplitter {
    default_encoder: Arc<dyn SentenceEncoder>,
    encoders: HashMap<String, Arc<dyn SentenceEncoder>>,
}

impl SemanticSplitter {
    /// Create a splitter using the character-frequency encoder.
    pub fn new() -> Self {
        let encoder: Arc<dyn SentenceEncoder> = Arc::new(CharFrequencyEncoder);
        let mut encoders = HashMap::new();
        encoders.insert(CHAR_FREQUENCY.to_string(), encoder.clone());
        Self {
            default_encoder: encoder,
            encoders,
        }
    }

    /// Replace the encoder used when no `encoder_function` is configured.
    pub fn with_encoder<E>(mut self, encoder: E) -> Self
    where
        E: SentenceEncoder + 'static,
    {
        self.default_encoder = Arc::new(encoder);
        self
    }

    /// Make an encoder selectable through `encoder_function`.
    pub fn with_named_encoder<E>(mut self, name: &str, encoder: E) -> Self
    where
        E: SentenceEncoder + 'static,
    {
        self.encoders.insert(name.to_string(), Arc::new(encoder));
        self
    }

    fn encoder(&self, config: &SplitConfig) -> Result<&dyn SentenceEncoder> {
        match &config.encoder_function {
            None => Ok(self.default_encoder.as_ref()),
            Some(name) => self
                .encoders
                .get(name)
                .map(|e| &**e)
                .ok_or_else(|| {
                    let mut known: Vec<_> = self.encoders.keys().cloned().collect();
                    known.sort();
                    SplitError::invalid_config(format!(
                        "unknown encoder_function {:?} (known: {})",
                        name,
                        known.join(", ")
                    ))
                }),
        }
    }
}

impl Default for SemanticSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Splitter for SemanticSplitter {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["semantic"]
    }

    fn score(&self, _doc: &InputDocument, strategy: &str) -> f64 {
        if strategy == "semantic" {
            1.0
        } else {
            0.0
        }
    }

    fn validate(&self, config: &SplitConfig) -> Result<()> {
        self.encoder(config).map(|_| ())
    }

    fn split(&self, doc: &InputDocument, config: &SplitConfig) -> Result<Vec<Chunk>> {
        let doc_id = doc.doc_id();
        let encoder = self.encoder(config)?;
        let sentences = sentences(&doc.content);
        let groups = group_sentences(&sentences, encoder, config.semantic_threshold);

        let chunks: Vec<Chunk> = groups
            .iter()
            .enumerate()
            .map(|(i, group)| {
                let text = join_group(group);
                let mut metadata = document_metadata(doc);
                metadata.insert("chunk_id".into(), format!("{}_{}", doc_id, i).into());
                metadata.insert("part_index".into(), i.into());
                metadata.insert("semantic_type".into(), "semantic_group".into());
                metadata.insert("sentence_count".into(), group.len().into());
                metadata.insert("chunk_size".into(), char_len(&text).into());
                Chunk::new(text, metadata)
            })
            .collect();

        debug!(
            doc_id = %doc_id,
            sentences = sentences.len(),
            groups = chunks.len(),
            "semantic split"
        );
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_segmentation() {
        let found = sentences("First one. Second one\nThird one.  \n\n");
        assert_eq!(found, vec!["First one", "Second one", "Third one"]);
    }

    #[test]
    fn test_encoder_is_normalized() {
        let v = CharFrequencyEncoder.encode("hello world");
        let norm: f32 = v.iter().map(|x| x * x).sum();
        assert_eq!(v.len(), 10);
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(CharFrequencyEncoder.encode("").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_groups_break_on_topic_change() {
        let doc = InputDocument::new("aaa. aaaa. aa. bbb. bbbb.").with_id("s");
        let chunks = SemanticSplitter::new()
            .split(&doc, &SplitConfig::default())
            .unwrap();

        let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["aaa. aaaa. aa.", "bbb. bbbb."]);
        assert_eq!(chunks[0].metadata["sentence_count"], 3);
        assert_eq!(chunks[1].chunk_id(), Some("s_1"));
        assert_eq!(chunks[1].semantic_type(), Some("semantic_group"));
    }

    #[test]
    fn test_custom_encoder() {
        let encoder = |text: &str| {
            if text.contains("cat") {
                vec![1.0f32, 0.0]
            } else {
                vec![0.0f32, 1.0]
            }
        };
        let doc = InputDocument::new("The cat sat. A cat purred. Stocks fell. Bonds rose");
        let chunks = SemanticSplitter::new()
            .with_encoder(encoder)
            .split(&doc, &SplitConfig::default())
            .unwrap();

        let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["The cat sat. A cat purred.", "Stocks fell. Bonds rose."]);
    }

    #[test]
    fn test_named_encoder_selection() {
        let splitter = SemanticSplitter::new().with_named_encoder("flat", |_: &str| vec![1.0f32]);
        let doc = InputDocument::new("aaa. zzz. 123");

        let mut config = SplitConfig::default();
        config.encoder_function = Some("flat".to_string());
        let chunks = splitter.split(&doc, &config).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "aaa. zzz. 123.");

        config.encoder_function = Some("missing".to_string());
        let err = splitter.split(&doc, &config).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert_eq!(splitter.validate(&config).unwrap_err().error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_threshold_extremes() {
        let doc = InputDocument::new("one. two. three");
        let splitter = SemanticSplitter::new();

        let mut config = SplitConfig::default();
        config.semantic_threshold = -1.0;
        assert_eq!(splitter.split(&doc, &config).unwrap().len(), 1);

        config.semantic_threshold = 1.1;
        assert_eq!(splitter.split(&doc, &config).unwrap().len(), 3);
    }

    #[test]
    fn test_empty_document() {
        let doc = InputDocument::new("  \n ");
        let chunks = SemanticSplitter::new()
            .split(&doc, &SplitConfig::default())
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_score_explicit_only() {
        let splitter = SemanticSplitter::new();
        let doc = InputDocument::new("anything");
        assert_eq!(splitter.score(&doc, "semantic"), 1.0);
        assert_eq!(splitter.score(&doc, "auto"), 0.0);
    }
}
