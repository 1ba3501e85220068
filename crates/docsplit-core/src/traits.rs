//! Core traits defining the interfaces between components.

use crate::config::SplitConfig;
use crate::error::Result;
use crate::types::{Chunk, InputDocument};

/// Splitting strategy trait.
///
/// Implementations hold no mutable cross-call state, so one instance can be
/// shared by every thread that splits documents through a pipeline.
pub trait Splitter: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Strategy tags this splitter is registered under.
    fn supported_types(&self) -> &'static [&'static str];

    /// Confidence in [0, 1] that this splitter suits `doc`.
    ///
    /// `strategy` is the name the caller asked for (`"auto"` when the
    /// pipeline is detecting).
    fn score(&self, doc: &InputDocument, strategy: &str) -> f64;

    /// Reject options this splitter cannot honor, before any splitting starts.
    fn validate(&self, _config: &SplitConfig) -> Result<()> {
        Ok(())
    }

    /// Split `doc` into ordered chunks.
    fn split(&self, doc: &InputDocument, config: &SplitConfig) -> Result<Vec<Chunk>>;
}

/// Maps a sentence to a fixed-length, unit-normalized vector.
pub trait SentenceEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Vec<f32>;
}

impl<F> SentenceEncoder for F
where
    F: Fn(&str) -> Vec<f32> + Send + Sync,
{
    fn encode(&self, text: &str) -> Vec<f32> {
        self(text)
    }
}
