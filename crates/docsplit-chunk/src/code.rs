//! Language-aware source code splitter.
//!
//! Python is split along its syntax tree (tree-sitter), keeping decorators
//! with their definitions and breaking large classes into header, attribute
//! and method chunks. Other languages go through a regex cascade keyed on
//! declaration keywords.

use docsplit_core::{char_len, Chunk, InputDocument, Metadata, Result, SplitConfig, Splitter};
use serde_json::Value;
use tracing::{debug, warn};
use tree_sitter::{Node, Parser};

use crate::document_metadata;
use crate::segmenter::Separator;

/// Classes longer than this multiple of `chunk_size` are decomposed.
const CLASS_SPLIT_FACTOR: f64 = 1.5;

const DEFAULT_CASCADE: [&str; 4] = [r"\n\n+", r"\n+", " ", ""];

/// Languages with a dedicated separator cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Cpp,
    Default,
}

impl Language {
    /// Parse a language name such as `"python"` or `"typescript"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "python" => Some(Self::Python),
            "javascript" => Some(Self::JavaScript),
            "typescript" => Some(Self::TypeScript),
            "java" => Some(Self::Java),
            "go" => Some(Self::Go),
            "cpp" => Some(Self::Cpp),
            _ => None,
        }
    }

    /// Map a file extension (with or without the leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "py" => Some(Self::Python),
            "js" | "jsx" => Some(Self::JavaScript),
            "ts" | "tsx" => Some(Self::TypeScript),
            "java" => Some(Self::Java),
            "go" => Some(Self::Go),
            "cpp" | "c" | "h" => Some(Self::Cpp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Go => "go",
            Self::Cpp => "cpp",
            Self::Default => "default",
        }
    }

    /// Declaration separators, followed by the generic cascade.
    fn cascade(&self) -> Vec<&'static str> {
        let declarations: &[&'static str] = match self {
            Self::Python => &[r"\n\s*class\s+", r"\n\s*def\s+", r"\n\s*async\s+def\s+"],
            Self::JavaScript => &[
                r"\n\s*class\s+",
                r"\n\s*function\s+",
                r"\n\s*const\s+",
                r"\n\s*let\s+",
                r"\n\s*var\s+",
                r"\n+",
            ],
            Self::TypeScript => &[
                r"\n\s*interface\s+",
                r"\n\s*type\s+",
                r"\n\s*class\s+",
                r"\n\s*function\s+",
                r"\n\s*const\s+",
                r"\n+",
            ],
            Self::Java => &[
                r"\n\s*class\s+",
                r"\n\s*public\s+",
                r"\n\s*protected\s+",
                r"\n\s*private\s+",
                r"\n+",
            ],
            Self::Go => &[r"\n\s*func\s+", r"\n\s*type\s+", r"\n+"],
            Self::Cpp => &[r"\n\s*class\s+", r"\n\s*struct\s+", r"\n\s*void\s+", r"\n+"],
            Self::Default => &[],
        };
        declarations.iter().chain(DEFAULT_CASCADE.iter()).copied().collect()
    }
}

/// Resolve the language of `doc`: explicit `language`, then extension, then type tag.
pub fn resolve_language(doc: &InputDocument) -> Language {
    doc.metadata
        .get("language")
        .and_then(Value::as_str)
        .and_then(Language::from_name)
        .or_else(|| doc.extension().and_then(Language::from_extension))
        .or_else(|| doc.type_tag().and_then(Language::from_name))
        .unwrap_or(Language::Default)
}

/// Regex cascade split.
///
/// A separator that leaves the text in one piece hands over to the next
/// separator straight away. This is a heuristic; it does not look for the
/// packing with the fewest chunks.
fn cascade_split(text: &str, separators: &[Separator], size: usize, out: &mut Vec<String>) {
    if char_len(text) <= size {
        out.push(text.to_string());
        return;
    }
    let Some((separator, rest)) = separators.split_first() else {
        out.push(text.to_string());
        return;
    };

    let pieces = separator.split(text);
    if pieces.len() < 2 {
        cascade_split(text, rest, size, out);
        return;
    }

    let mut buffer = String::new();
    let mut buffer_len = 0;
    for piece in pieces {
        let piece_len = char_len(piece);
        if piece_len > size {
            if !buffer.is_empty() {
                out.push(std::mem::take(&mut buffer));
                buffer_len = 0;
            }
            cascade_split(piece, rest, size, out);
        } else if buffer_len + piece_len > size {
            if !buffer.is_empty() {
                out.push(std::mem::take(&mut buffer));
            }
            buffer.push_str(piece);
            buffer_len = piece_len;
        } else {
            buffer.push_str(piece);
            buffer_len += piece_len;
        }
    }
    if !buffer.is_empty() {
        out.push(buffer);
    }
}

/// Drop surrounding blank lines and trailing whitespace, keeping indentation.
fn strip_blank_lines(text: &str) -> &str {
    let text = text.trim_end();
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    &text[start..]
}

/// One unit of output before ids are assigned.
#[derive(Debug)]
struct Piece {
    text: String,
    kind: &'static str,
    class_name: Option<String>,
    /// Position of the owning class header among the pieces.
    parent: Option<usize>,
}

impl Piece {
    fn code(text: String) -> Self {
        Self {
            text,
            kind: "code",
            class_name: None,
            parent: None,
        }
    }
}

fn push_piece(pieces: &mut Vec<Piece>, mut piece: Piece) -> Option<usize> {
    let stripped = strip_blank_lines(&piece.text);
    if stripped.is_empty() {
        return None;
    }
    if stripped.len() != piece.text.len() {
        piece.text = stripped.to_string();
    }
    pieces.push(piece);
    Some(pieces.len() - 1)
}

/// Source lines addressed by tree-sitter rows.
struct SourceLines<'a> {
    lines: Vec<&'a str>,
}

impl<'a> SourceLines<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines().collect(),
        }
    }

    /// Lines `start..end` joined with newlines, trailing whitespace removed.
    fn text(&self, start: usize, end: usize) -> String {
        let end = end.min(self.lines.len());
        let start = start.min(end);
        let mut text = self.lines[start..end].join("\n");
        text.truncate(text.trim_end().len());
        text
    }
}

/// Row span of a node as `start..end` (end exclusive).
fn rows(node: Node<'_>) -> (usize, usize) {
    let start = node.start_position();
    let end = node.end_position();
    let end_row = if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    };
    (start.row, end_row)
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// The class definition behind `node`, looking through decorators.
fn class_definition(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "class_definition" => Some(node),
        "decorated_definition" => node
            .child_by_field_name("definition")
            .filter(|d| d.kind() == "class_definition"),
        _ => None,
    }
}

fn is_definition(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function_definition" | "decorated_definition" | "class_definition"
    )
}

fn is_docstring(node: Node<'_>) -> bool {
    node.kind() == "expression_statement"
        && node
            .named_child(0)
            .map_or(false, |c| c.kind() == "string" || c.kind() == "concatenated_string")
}

/// Split Python along its syntax tree. `None` means the source did not parse.
fn python_pieces(source: &str, size: usize) -> Option<Vec<Piece>> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&tree_sitter_python::LANGUAGE.into()) {
        warn!(error = %e, "python grammar unavailable, using regex cascade");
        return None;
    }
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();
    if root.has_error() {
        debug!("python source has syntax errors, using regex cascade");
        return None;
    }

    let lines = SourceLines::new(source);
    let class_limit = (size as f64 * CLASS_SPLIT_FACTOR) as usize;
    let mut pieces = Vec::new();
    let mut buffer: Vec<String> = Vec::new();
    let mut buffer_len = 0usize;

    for node in named_children(root) {
        let (start, end) = rows(node);
        let text = lines.text(start, end);
        let len = char_len(&text);

        if let Some(class) = class_definition(node).filter(|_| len > class_limit) {
            if !buffer.is_empty() {
                push_piece(&mut pieces, Piece::code(buffer.join("\n")));
                buffer.clear();
                buffer_len = 0;
            }
            decompose_class(node, class, &lines, &mut pieces);
            continue;
        }

        if buffer_len + len > size && !buffer.is_empty() {
            push_piece(&mut pieces, Piece::code(buffer.join("\n")));
            buffer.clear();
            buffer_len = 0;
        }
        if !buffer.is_empty() {
            buffer.push(String::new());
            buffer_len += 1;
        }
        buffer.push(text);
        buffer_len += len;
    }
    if !buffer.is_empty() {
        push_piece(&mut pieces, Piece::code(buffer.join("\n")));
    }
    Some(pieces)
}

/// Emit a class as header, attribute and method pieces.
///
/// `outer` is the top-level node (decorators included), `class` the
/// class definition inside it.
fn decompose_class(outer: Node<'_>, class: Node<'_>, lines: &SourceLines<'_>, pieces: &mut Vec<Piece>) {
    let (class_start, class_end) = rows(outer);
    let name = class
        .child_by_field_name("name")
        .map(|n| lines_slice(lines, n))
        .unwrap_or_default();

    let body = class
        .child_by_field_name("body")
        .map(named_children)
        .unwrap_or_default();
    let members: Vec<Node<'_>> = body.into_iter().filter(|n| n.kind() != "comment").collect();

    let header_end = match members.first() {
        Some(first) if is_docstring(*first) => rows(*first).1,
        Some(first) => rows(*first).0.max(rows(class).0 + 1),
        None => class_end,
    };

    let header = Piece {
        text: lines.text(class_start, header_end),
        kind: "class_header",
        class_name: Some(name.clone()),
        parent: None,
    };
    let Some(header_index) = push_piece(pieces, header) else {
        return;
    };

    let member = |text: String, kind: &'static str| Piece {
        text,
        kind,
        class_name: Some(name.clone()),
        parent: Some(header_index),
    };

    let mut attributes: Vec<String> = Vec::new();
    for node in members {
        let (start, end) = rows(node);
        if start < header_end {
            continue;
        }
        if is_definition(node) {
            if !attributes.is_empty() {
                push_piece(pieces, member(attributes.join("\n"), "class_attributes"));
                attributes.clear();
            }
            push_piece(pieces, member(lines.text(start, end), "method"));
        } else {
            attributes.push(lines.text(start, end));
        }
    }
    if !attributes.is_empty() {
        push_piece(pieces, member(attributes.join("\n"), "class_attributes"));
    }
}

/// Source text of a single-line node such as an identifier.
fn lines_slice(lines: &SourceLines<'_>, node: Node<'_>) -> String {
    let start = node.start_position();
    let end = node.end_position();
    lines
        .lines
        .get(start.row)
        .and_then(|line| {
            let end_col = if end.row == start.row { end.column } else { line.len() };
            line.get(start.column..end_col)
        })
        .unwrap_or_default()
        .to_string()
}

/// Code splitter.
pub struct CodeSplitter;

impl CodeSplitter {
    pub fn new() -> Self {
        Self
    }

    fn regex_pieces(text: &str, language: Language, size: usize) -> Result<Vec<Piece>> {
        let separators = Separator::compile_all(&language.cascade())?;
        let mut parts = Vec::new();
        cascade_split(text, &separators, size, &mut parts);

        let mut pieces = Vec::new();
        for part in parts {
            push_piece(&mut pieces, Piece::code(part));
        }
        Ok(pieces)
    }
}

impl Default for CodeSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Splitter for CodeSplitter {
    fn name(&self) -> &'static str {
        "code"
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["code", "python", "javascript", "typescript", "java", "go", "cpp"]
    }

    fn score(&self, doc: &InputDocument, strategy: &str) -> f64 {
        if self.supported_types().contains(&strategy) {
            return 1.0;
        }
        if doc.extension().and_then(Language::from_extension).is_some() {
            return 1.0;
        }
        if doc.type_tag() == Some("code") {
            return 0.9;
        }
        0.0
    }

    fn split(&self, doc: &InputDocument, config: &SplitConfig) -> Result<Vec<Chunk>> {
        let doc_id = doc.doc_id();
        let language = resolve_language(doc);

        let pieces = match language {
            Language::Python => match python_pieces(&doc.content, config.chunk_size) {
                Some(pieces) => pieces,
                None => Self::regex_pieces(&doc.content, language, config.chunk_size)?,
            },
            _ => Self::regex_pieces(&doc.content, language, config.chunk_size)?,
        };

        let ids: Vec<String> = (0..pieces.len()).map(|i| format!("{}_{}", doc_id, i)).collect();
        let mut children: Vec<Vec<Value>> = vec![Vec::new(); pieces.len()];
        for (i, piece) in pieces.iter().enumerate() {
            if let Some(parent) = piece.parent {
                children[parent].push(ids[i].clone().into());
            }
        }

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .zip(children)
            .enumerate()
            .map(|(i, (piece, child_ids))| {
                let mut metadata: Metadata = document_metadata(doc);
                metadata.insert("chunk_id".into(), ids[i].clone().into());
                metadata.insert("part_index".into(), i.into());
                metadata.insert("semantic_type".into(), piece.kind.into());
                metadata.insert("language".into(), language.as_str().into());
                metadata.insert("chunk_size".into(), char_len(&piece.text).into());
                match (piece.kind, piece.parent) {
                    ("class_header", _) => {
                        if let Some(name) = piece.class_name {
                            metadata.insert("class_name".into(), name.into());
                        }
                        metadata.insert("child_ids".into(), child_ids.into());
                    }
                    (_, Some(parent)) => {
                        metadata.insert("parent_id".into(), ids[parent].clone().into());
                        metadata.insert("parent_chunk_index".into(), parent.into());
                        if let Some(name) = piece.class_name {
                            metadata.insert("parent_node".into(), name.into());
                        }
                    }
                    _ => {}
                }
                Chunk::new(piece.text, metadata)
            })
            .collect();

        debug!(doc_id = %doc_id, language = language.as_str(), chunks = chunks.len(), "code split");
        Ok(chunks)
    }
}
