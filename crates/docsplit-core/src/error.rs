//! Error types for the chunking engine.

use thiserror::Error;

/// Result type alias using SplitError.
pub type Result<T> = std::result::Result<T, SplitError>;

/// Errors that can occur while splitting documents.
#[derive(Error, Debug)]
pub enum SplitError {
    /// Configuration is unusable (sizes, overlap, patterns).
    #[error("Invalid config: {message}")]
    InvalidConfig { message: String },

    /// No splitter is registered for the requested strategy.
    #[error("Unsupported strategy '{strategy}'. Available: {}", available.join(", "))]
    UnsupportedType {
        strategy: String,
        available: Vec<String>,
    },

    /// Auto-detection found no splitter with a positive score.
    #[error("No suitable splitter found for document")]
    NoSuitableSplitter,

    /// A splitter failed while processing a document.
    #[error("Splitter {splitter} failed: {source}")]
    SplitterExecution {
        splitter: String,
        #[source]
        source: Box<SplitError>,
    },

    /// Document content cannot be handled by the splitter.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SplitError {
    /// Create an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Wrap an error raised inside a splitter.
    pub fn execution(splitter: impl Into<String>, source: SplitError) -> Self {
        Self::SplitterExecution {
            splitter: splitter.into(),
            source: Box::new(source),
        }
    }

    /// Get a stable error code for callers that report errors over the wire.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            Self::NoSuitableSplitter => "NO_SUITABLE_SPLITTER",
            Self::SplitterExecution { .. } => "SPLITTER_EXECUTION_ERROR",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }
}
