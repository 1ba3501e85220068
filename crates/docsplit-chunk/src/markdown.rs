//! Markdown-aware splitter.
//!
//! Headers and list items open new sections. Each ATX header becomes its own
//! chunk and every body fragment below it points back at that header through
//! `parent_id`, so a consumer can rebuild the section tree without parsing
//! Markdown again. Tables, code fences and embedded images are never split.

use std::ops::Range;

use docsplit_core::{char_len, Chunk, InputDocument, Metadata, Result, SplitConfig, Splitter};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::segmenter::{compile_protected, Segmenter};

/// Header separator followed by the body cascade.
pub const MARKDOWN_SEPARATORS: [&str; 6] = [
    r"(?m)^\s*#{1,6}\s+",
    r"(?m)\n\s*\n",
    "\n",
    r"(?<=[.?!])\s+",
    " ",
    "",
];

const DATA_URI_PATTERN: &str = r"data:image/[a-zA-Z]+;base64,[a-zA-Z0-9+/=]+";
const BASE64_PATTERN: &str =
    r"(?:(?:[A-Za-z0-9+/]{4}){100,}(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?)";

/// Regions a Markdown document must never have split.
pub const MARKDOWN_PROTECTED: [&str; 4] = [
    r"(?s)```.*?```",
    r"(?m)^(?:\|[^\n]*\|(?:\n|$))+",
    DATA_URI_PATTERN,
    BASE64_PATTERN,
];

static SECTION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?:#{1,6} |[-*] |\d+\. )").unwrap());

static ATX_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*)").unwrap());

static HEADER_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s").unwrap());

static LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[-*] |\d+\. )").unwrap());

static IMAGE_DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(?:{}|{})", DATA_URI_PATTERN, BASE64_PATTERN)).unwrap()
});

/// Markdown splitter.
pub struct MarkdownSplitter;

impl MarkdownSplitter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Semantic kind of a body fragment.
pub fn classify_fragment(text: &str) -> &'static str {
    if text.starts_with('|') {
        "table"
    } else if text.starts_with("```") {
        "code_block"
    } else if IMAGE_DATA.is_match(text) {
        "image"
    } else if LIST_ITEM.is_match(text) {
        "list_item"
    } else {
        "text"
    }
}

fn protected_ranges(protected: Option<&Regex>, text: &str) -> Vec<Range<usize>> {
    protected
        .map(|re| re.find_iter(text).map(|m| m.range()).collect())
        .unwrap_or_default()
}

/// Cut before every header or list marker that is not inside a protected region.
fn sections<'a>(text: &'a str, protected: &[Range<usize>]) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut last = 0;
    for m in SECTION_START.find_iter(text) {
        let start = m.start();
        if protected.iter().any(|r| r.start < start && start < r.end) {
            continue;
        }
        if start > last {
            out.push(&text[last..start]);
            last = start;
        }
    }
    out.push(&text[last..]);
    out
}

fn clean_metadata(doc: &InputDocument) -> Metadata {
    let mut metadata = doc.metadata.clone();
    metadata.remove("config");
    metadata
}

impl Splitter for MarkdownSplitter {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["markdown", "md"]
    }

    fn score(&self, doc: &InputDocument, strategy: &str) -> f64 {
        if strategy == "markdown" || strategy == "md" {
            return 1.0;
        }
        if let Some("md" | "markdown") = doc.type_tag() {
            return 1.0;
        }
        if HEADER_LINE.is_match(&doc.content) {
            return 0.95;
        }
        0.0
    }

    fn split(&self, doc: &InputDocument, config: &SplitConfig) -> Result<Vec<Chunk>> {
        let doc_id = doc.doc_id();

        let mut protected_patterns: Vec<String> =
            MARKDOWN_PROTECTED.iter().map(|p| p.to_string()).collect();
        protected_patterns.extend(config.protected_patterns.iter().cloned());

        let segmenter = Segmenter::new(
            &MARKDOWN_SEPARATORS[1..],
            &protected_patterns,
            config.chunk_size,
            0,
        )?;
        let protected = compile_protected(&protected_patterns)?;
        let ranges = protected_ranges(protected.as_ref(), &doc.content);

        let mut chunks: Vec<Chunk> = Vec::new();
        // (chunk position, chunk id, header text) of the header in scope.
        let mut current: Option<(usize, String, String)> = None;
        let mut children: Vec<String> = Vec::new();

        for section in sections(&doc.content, &ranges) {
            let section = section.trim();
            if section.is_empty() {
                continue;
            }

            let first_line = section.lines().next().unwrap_or_default();
            let body = match ATX_HEADER.captures(first_line) {
                Some(caps) => {
                    let hashes = &caps[1];
                    let title = caps[2].trim().to_string();
                    let level = hashes.len();
                    let index = chunks.len();
                    let chunk_id = format!("{}_h_{}", doc_id, index);

                    if let Some((position, _, _)) = current.take() {
                        chunks[position].set("child_ids", std::mem::take(&mut children));
                    }

                    let mut metadata = clean_metadata(doc);
                    metadata.insert("chunk_id".into(), chunk_id.clone().into());
                    metadata.insert("part_index".into(), index.into());
                    metadata.insert("semantic_type".into(), format!("h{}", level).into());
                    metadata.insert("is_header".into(), true.into());
                    metadata.insert("level".into(), level.into());
                    chunks.push(Chunk::new(format!("{} {}", hashes, title), metadata));

                    current = Some((index, chunk_id, title));
                    section[first_line.len()..].trim()
                }
                None => section,
            };

            if body.is_empty() {
                continue;
            }

            for part in segmenter.segment(body) {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let index = chunks.len();
                let chunk_id = format!("{}_part_{}", doc_id, index);
                let semantic_type = classify_fragment(part);

                let mut metadata = clean_metadata(doc);
                metadata.insert("chunk_id".into(), chunk_id.clone().into());
                metadata.insert("part_index".into(), index.into());
                metadata.insert("semantic_type".into(), semantic_type.into());
                if let Some((_, parent_id, title)) = &current {
                    metadata.insert("parent_id".into(), parent_id.clone().into());
                    metadata.insert("section_title".into(), title.clone().into());
                    children.push(chunk_id);
                }
                if semantic_type == "image" {
                    metadata.insert("image_length".into(), char_len(part).into());
                }
                chunks.push(Chunk::new(part, metadata));
            }
        }

        if let Some((position, _, _)) = current {
            chunks[position].set("child_ids", Value::from(children));
        }

        debug!(doc_id = %doc_id, chunks = chunks.len(), "markdown split");
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn split(text: &str, config: SplitConfig) -> Vec<Chunk> {
        let doc = InputDocument::new(text).with_id("md");
        MarkdownSplitter::new().split(&doc, &config).unwrap()
    }

    #[test]
    fn test_header_then_text() {
        let chunks = split("# Title\n\nSome text.", SplitConfig::default());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "# Title");
        assert_eq!(chunks[0].semantic_type(), Some("h1"));
        assert!(chunks[0].is_header());
        assert_eq!(chunks[0].metadata["level"], 1);

        assert_eq!(chunks[1].content, "Some text.");
        assert_eq!(chunks[1].semantic_type(), Some("text"));
        assert_eq!(chunks[1].parent_id(), chunks[0].chunk_id());
        assert_eq!(chunks[1].metadata["section_title"], "Title");
        assert_eq!(chunks[0].child_ids(), Some(vec!["md_part_1"]));
    }

    #[test]
    fn test_nested_headers_rebind_parent() {
        let text = "# Guide\n\nIntro text.\n\n## Install\n\nRun the installer.";
        let chunks = split(text, SplitConfig::default());

        let kinds: Vec<_> = chunks.iter().map(|c| c.semantic_type().unwrap()).collect();
        assert_eq!(kinds, vec!["h1", "text", "h2", "text"]);
        assert_eq!(chunks[1].parent_id(), Some("md_h_0"));
        assert_eq!(chunks[3].parent_id(), Some("md_h_2"));
        assert_eq!(chunks[3].metadata["section_title"], "Install");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.part_index(), Some(i as u64));
        }
    }

    #[test]
    fn test_text_before_first_header_has_no_parent() {
        let chunks = split("Preface line.\n\n# Title\n\nBody.", SplitConfig::default());
        assert_eq!(chunks[0].content, "Preface line.");
        assert!(chunks[0].parent_id().is_none());
        assert!(chunks[0].metadata.get("section_title").is_none());
    }

    #[test]
    fn test_code_fence_is_atomic_and_classified() {
        let text = "# Setup\n\n```python\n# not a header\nprint('hi')\n```\n\nAfter the fence.";
        let chunks = split(text, SplitConfig::sized(20, 0));

        let fence = chunks
            .iter()
            .find(|c| c.semantic_type() == Some("code_block"))
            .unwrap();
        assert_eq!(fence.content, "```python\n# not a header\nprint('hi')\n```");
        assert_eq!(chunks.iter().filter(|c| c.is_header()).count(), 1);
    }

    #[test]
    fn test_table_and_lists() {
        let text = "# Data\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n- first item\n- second item\n1. numbered";
        let chunks = split(text, SplitConfig::default());

        let kinds: Vec<_> = chunks.iter().map(|c| c.semantic_type().unwrap()).collect();
        assert_eq!(kinds, vec!["h1", "table", "list_item", "list_item", "list_item"]);
        assert_eq!(chunks[1].content, "| a | b |\n|---|---|\n| 1 | 2 |");
        for chunk in &chunks[1..] {
            assert_eq!(chunk.parent_id(), Some("md_h_0"));
        }
    }

    #[test]
    fn test_image_data_classified() {
        let uri = format!("data:image/png;base64,{}", "QUJD".repeat(10));
        let text = format!("# Figure\n\n{}", uri);
        let chunks = split(&text, SplitConfig::sized(30, 0));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, uri);
        assert_eq!(chunks[1].semantic_type(), Some("image"));
        assert_eq!(chunks[1].metadata["image_length"], json!(char_len(&uri)));
    }

    #[test]
    fn test_config_stripped_from_metadata() {
        let doc = InputDocument::new("# T\n\nbody")
            .with_config(json!({"chunk_size": 100}))
            .with_meta("source", "a.md");
        let chunks = MarkdownSplitter::new()
            .split(&doc, &SplitConfig::default())
            .unwrap();
        for chunk in &chunks {
            assert!(chunk.metadata.get("config").is_none());
            assert_eq!(chunk.metadata["source"], "a.md");
        }
    }

    #[test]
    fn test_classify_fragment() {
        assert_eq!(classify_fragment("| x |"), "table");
        assert_eq!(classify_fragment("```\ncode\n```"), "code_block");
        assert_eq!(classify_fragment("* bullet"), "list_item");
        assert_eq!(classify_fragment("12. twelfth"), "list_item");
        assert_eq!(classify_fragment("plain words"), "text");
    }

    #[test]
    fn test_score() {
        let splitter = MarkdownSplitter::new();
        let headed = InputDocument::new("intro\n## Section\nbody");
        let tagged = InputDocument::new("plain").with_meta("type", "md");
        let plain = InputDocument::new("#hashtag only");

        assert_eq!(splitter.score(&plain, "md"), 1.0);
        assert_eq!(splitter.score(&tagged, "auto"), 1.0);
        assert_eq!(splitter.score(&headed, "auto"), 0.95);
        assert_eq!(splitter.score(&plain, "auto"), 0.0);
    }
}
