//! Protected recursive segmentation.
//!
//! Splits text into spans of at most `chunk_size` characters by walking a
//! cascade of separators from coarsest to finest, while regions matched by
//! protected patterns (tables, code fences, embedded images) pass through
//! as single spans no matter how long they are.

use std::collections::VecDeque;

use docsplit_core::{char_len, Result, SplitError};
use regex::Regex;
use tracing::{debug, warn};

/// Default separator cascade: paragraph, line, sentence, word, character.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", r"(?<=[.?!])\s+", " ", ""];

/// Default cascade as owned strings.
pub fn default_separators() -> Vec<String> {
    DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect()
}

/// Bytes of preceding text a look-behind is evaluated against.
const LOOKBEHIND_WINDOW: usize = 64;

/// One compiled step of a separator cascade.
#[derive(Debug, Clone)]
pub(crate) enum Separator {
    /// Terminal fallback: every character is its own token.
    Chars,
    Pattern {
        regex: Regex,
        lookbehind: Option<Regex>,
    },
}

impl Separator {
    /// Compile one separator.
    ///
    /// A leading `(?<=X)` is peeled off and checked against the text before
    /// each candidate match, since the regex engine has no look-around.
    pub(crate) fn compile(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Ok(Self::Chars);
        }
        let (lookbehind, body) = split_lookbehind(pattern);
        let regex = compile_pattern(body, pattern)?;
        let lookbehind = match lookbehind {
            Some(lb) => Some(compile_pattern(&format!(r"(?:{})\z", lb), pattern)?),
            None => None,
        };
        Ok(Self::Pattern { regex, lookbehind })
    }

    /// Compile a whole cascade.
    pub(crate) fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Self>> {
        patterns.iter().map(|p| Self::compile(p.as_ref())).collect()
    }

    /// Split `text` before every separator match.
    ///
    /// The separator stays attached to the content that follows it, so the
    /// pieces concatenate back to `text`.
    pub(crate) fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let starts: Vec<usize> = match self {
            Self::Chars => text.char_indices().map(|(i, _)| i).collect(),
            Self::Pattern { regex, lookbehind } => regex
                .find_iter(text)
                .map(|m| m.start())
                .filter(|&start| {
                    lookbehind
                        .as_ref()
                        .map_or(true, |lb| lb.is_match(preceding(text, start)))
                })
                .collect(),
        };

        let mut pieces = Vec::with_capacity(starts.len() + 1);
        let mut last = 0;
        for start in starts {
            if start > last {
                pieces.push(&text[last..start]);
                last = start;
            }
        }
        if last < text.len() {
            pieces.push(&text[last..]);
        }
        pieces
    }
}

/// Text immediately before byte offset `end`, bounded to a small window.
fn preceding(text: &str, end: usize) -> &str {
    let mut start = end.saturating_sub(LOOKBEHIND_WINDOW);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..end]
}

/// Peel a leading positive look-behind off `pattern`.
fn split_lookbehind(pattern: &str) -> (Option<&str>, &str) {
    let Some(rest) = pattern.strip_prefix("(?<=") else {
        return (None, pattern);
    };

    let mut depth = 1usize;
    let mut in_class = false;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => depth += 1,
            ')' if !in_class => {
                depth -= 1;
                if depth == 0 {
                    return (Some(&rest[..i]), &rest[i + 1..]);
                }
            }
            _ => {}
        }
    }
    (None, pattern)
}

fn compile_pattern(body: &str, original: &str) -> Result<Regex> {
    Regex::new(body)
        .map_err(|e| SplitError::invalid_config(format!("invalid pattern {:?}: {}", original, e)))
}

/// Build one alternation matching any of the protected patterns.
///
/// Returns `None` when there is nothing to protect.
pub(crate) fn compile_protected<S: AsRef<str>>(patterns: &[S]) -> Result<Option<Regex>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    for pattern in patterns {
        compile_pattern(pattern.as_ref(), pattern.as_ref())?;
    }
    let alternation = patterns
        .iter()
        .map(|p| format!("(?:{})", p.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    compile_pattern(&format!("(?ms){}", alternation), &alternation).map(Some)
}

/// Check that every separator and protected pattern compiles.
pub fn validate_patterns<S: AsRef<str>, P: AsRef<str>>(
    separators: &[S],
    protected_patterns: &[P],
) -> Result<()> {
    Separator::compile_all(separators)?;
    compile_protected(protected_patterns)?;
    Ok(())
}

fn validate_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(SplitError::invalid_config("chunk_size must be positive"));
    }
    if chunk_overlap >= chunk_size {
        return Err(SplitError::invalid_config(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            chunk_overlap, chunk_size
        )));
    }
    Ok(())
}

/// A piece of segmented text. Never leaves this module.
#[derive(Debug)]
struct Span {
    text: String,
    protected: bool,
}

/// Packs tokens into buffers of at most `size` characters.
///
/// After a flush the buffer keeps whole trailing tokens worth at most
/// `overlap` characters; a buffer holding only that carried-over tail is
/// never emitted on its own.
struct Accumulator<'a> {
    parts: VecDeque<(&'a str, usize)>,
    total: usize,
    fresh: bool,
    size: usize,
    overlap: usize,
}

impl<'a> Accumulator<'a> {
    fn new(size: usize, overlap: usize) -> Self {
        Self {
            parts: VecDeque::new(),
            total: 0,
            fresh: false,
            size,
            overlap,
        }
    }

    fn push(&mut self, token: &'a str, len: usize, out: &mut Vec<String>) {
        if self.total + len > self.size {
            self.emit(out);
            self.make_room(len);
        }
        self.parts.push_back((token, len));
        self.total += len;
        self.fresh = true;

        // An exact fit flushes right away.
        if self.total == self.size {
            self.emit(out);
            self.make_room(0);
        }
    }

    fn emit(&mut self, out: &mut Vec<String>) {
        if self.fresh {
            out.push(self.parts.iter().map(|(t, _)| *t).collect());
            self.fresh = false;
        }
    }

    fn make_room(&mut self, incoming: usize) {
        while self.total > 0 && (self.total > self.overlap || self.total + incoming > self.size) {
            match self.parts.pop_front() {
                Some((_, len)) => self.total -= len,
                None => break,
            }
        }
    }

    fn reset(&mut self, out: &mut Vec<String>) {
        self.emit(out);
        self.parts.clear();
        self.total = 0;
    }

    fn finish(mut self, out: &mut Vec<String>) {
        self.emit(out);
    }
}

/// Plain recursive split of an unprotected fragment.
fn recursive_split(
    text: &str,
    separators: &[Separator],
    size: usize,
    overlap: usize,
    out: &mut Vec<String>,
) {
    let Some((separator, rest)) = separators.split_first() else {
        if !text.is_empty() {
            out.push(text.to_string());
        }
        return;
    };

    let mut acc = Accumulator::new(size, overlap);
    for token in separator.split(text) {
        let len = char_len(token);
        if len > size {
            acc.reset(out);
            if rest.is_empty() {
                warn!(len, size, "no separator left for oversized fragment, emitting it whole");
                out.push(token.to_string());
            } else {
                recursive_split(token, rest, size, overlap, out);
            }
            continue;
        }
        acc.push(token, len, out);
    }
    acc.finish(out);
}

/// Pre-compiled protected recursive splitter.
#[derive(Debug, Clone)]
pub struct Segmenter {
    separators: Vec<Separator>,
    protected: Option<Regex>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Segmenter {
    /// Compile a segmenter, failing with `InvalidConfig` on bad sizes or patterns.
    pub fn new<S: AsRef<str>, P: AsRef<str>>(
        separators: &[S],
        protected_patterns: &[P],
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self> {
        validate_sizes(chunk_size, chunk_overlap)?;
        Ok(Self {
            separators: Separator::compile_all(separators)?,
            protected: compile_protected(protected_patterns)?,
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into ordered spans.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let spans = self.spans(text);
        debug!(
            spans = spans.len(),
            protected = spans.iter().filter(|s| s.protected).count(),
            "segmented text"
        );
        spans.into_iter().map(|s| s.text).collect()
    }

    fn spans(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        if text.is_empty() {
            return spans;
        }

        let Some(protected) = &self.protected else {
            self.push_plain(text, &mut spans);
            return spans;
        };

        let mut last = 0;
        for m in protected.find_iter(text) {
            if m.as_str().is_empty() {
                continue;
            }
            if m.start() > last {
                self.push_plain(&text[last..m.start()], &mut spans);
            }
            let len = char_len(m.as_str());
            if len > self.chunk_size {
                warn!(
                    len,
                    chunk_size = self.chunk_size,
                    "protected region exceeds chunk_size, emitting it whole"
                );
            }
            spans.push(Span {
                text: m.as_str().to_string(),
                protected: true,
            });
            last = m.end();
        }
        if last < text.len() {
            self.push_plain(&text[last..], &mut spans);
        }
        spans
    }

    fn push_plain(&self, fragment: &str, spans: &mut Vec<Span>) {
        let mut out = Vec::new();
        recursive_split(
            fragment,
            &self.separators,
            self.chunk_size,
            self.chunk_overlap,
            &mut out,
        );
        spans.extend(out.into_iter().map(|text| Span {
            text,
            protected: false,
        }));
    }
}

/// Split `text` with `separators`, keeping `protected_patterns` matches whole.
pub fn split_with_protection<S: AsRef<str>, P: AsRef<str>>(
    text: &str,
    separators: &[S],
    protected_patterns: &[P],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<String>> {
    let segmenter = Segmenter::new(separators, protected_patterns, chunk_size, chunk_overlap)?;
    Ok(segmenter.segment(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];
    const FENCE: &str = r"(?s)```.*?```";

    fn split(text: &str, separators: &[&str], size: usize, overlap: usize) -> Vec<String> {
        split_with_protection(text, separators, &NONE, size, overlap).unwrap()
    }

    #[test]
    fn test_small_text_single_span() {
        let spans = split("Hello world", &DEFAULT_SEPARATORS, 100, 0);
        assert_eq!(spans, vec!["Hello world"]);
    }

    #[test]
    fn test_paragraphs_merge_when_they_fit() {
        let para = "a".repeat(400);
        let text = format!("{}\n\n{}", para, para);
        let spans = split(&text, &DEFAULT_SEPARATORS, 1000, 0);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0], text);
    }

    #[test]
    fn test_separator_travels_with_following_text() {
        let spans = split("aaaa\n\nbbbb", &DEFAULT_SEPARATORS, 6, 0);
        assert_eq!(spans, vec!["aaaa", "\n\nbbbb"]);
    }

    #[test]
    fn test_sentence_lookbehind_keeps_punctuation() {
        let spans = split("One. Two. Three.", &DEFAULT_SEPARATORS, 10, 0);
        assert_eq!(spans, vec!["One. Two.", " Three."]);
    }

    #[test]
    fn test_character_fallback_packs_characters() {
        let spans = split("abcdefghij", &DEFAULT_SEPARATORS, 4, 0);
        assert_eq!(spans, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_exact_fit_flushes_immediately() {
        let spans = split("abc de", &[" ", ""], 3, 0);
        assert_eq!(spans, vec!["abc", " de"]);
    }

    #[test]
    fn test_overlap_repeats_trailing_tokens() {
        let spans = split("one two three four five", &[" ", ""], 10, 4);
        assert_eq!(spans, vec!["one two", " two three", " four five"]);
    }

    #[test]
    fn test_no_overlap_reproduces_input() {
        let text = "First paragraph here.\n\nSecond one is a bit longer. It has two sentences.\nAnd a line.";
        let spans = split(text, &DEFAULT_SEPARATORS, 20, 0);
        assert!(spans.len() > 1);
        assert_eq!(spans.concat(), text);
        for span in &spans {
            assert!(char_len(span) <= 20, "span too long: {:?}", span);
        }
    }

    #[test]
    fn test_empty_cascade_returns_whole_text() {
        let spans = split("abcdef", &[], 2, 0);
        assert_eq!(spans, vec!["abcdef"]);
    }

    #[test]
    fn test_protected_span_is_atomic() {
        let fence = format!("```\n{}\n```", "x".repeat(32));
        assert_eq!(char_len(&fence), 40);
        let prose = "\nThe prose comes next";
        let text = format!("{}{}", fence, prose);

        let spans = split_with_protection(&text, &DEFAULT_SEPARATORS, &[FENCE], 50, 0).unwrap();
        assert_eq!(spans, vec![fence, prose.to_string()]);
    }

    #[test]
    fn test_oversized_protected_span_kept_whole() {
        let fence = format!("```\n{}\n```", "y ".repeat(60));
        let text = format!("intro\n\n{}\n\noutro", fence);
        let spans = split_with_protection(&text, &DEFAULT_SEPARATORS, &[FENCE], 20, 5).unwrap();
        assert!(spans.iter().any(|s| *s == fence));
        assert_eq!(spans.iter().filter(|s| s.contains("```")).count(), 1);
    }

    #[test]
    fn test_overlap_does_not_reach_into_protected_span() {
        let text = "alpha beta ```gamma delta``` epsilon zeta";
        let spans = split_with_protection(text, &[" ", ""], &[FENCE], 12, 6).unwrap();
        let fence_spans: Vec<_> = spans.iter().filter(|s| s.contains("gamma")).collect();
        assert_eq!(fence_spans, vec!["```gamma delta```"]);
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        let err = split_with_protection("text", &DEFAULT_SEPARATORS, &NONE, 10, 10).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(split_with_protection("text", &DEFAULT_SEPARATORS, &NONE, 0, 0).is_err());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(split_with_protection("text", &["(unclosed"], &NONE, 10, 0).is_err());
        assert!(split_with_protection("text", &DEFAULT_SEPARATORS, &["[z-a]"], 10, 0).is_err());
        assert!(validate_patterns(&DEFAULT_SEPARATORS, &[FENCE]).is_ok());
    }

    #[test]
    fn test_empty_text() {
        assert!(split("", &DEFAULT_SEPARATORS, 10, 0).is_empty());
    }

    #[test]
    fn test_unicode_lengths_in_chars() {
        let spans = split("héllo wörld çà", &[" ", ""], 6, 0);
        assert_eq!(spans, vec!["héllo", " wörld", " çà"]);
    }

    #[test]
    fn test_split_lookbehind() {
        assert_eq!(
            split_lookbehind(r"(?<=[.?!])\s+"),
            (Some("[.?!]"), r"\s+")
        );
        assert_eq!(split_lookbehind(r"(?<=a(b))c"), (Some("a(b)"), "c"));
        assert_eq!(split_lookbehind(r"(?<=[)])x"), (Some("[)]"), "x"));
        assert_eq!(split_lookbehind(r"\s+"), (None, r"\s+"));
    }
}
