//! docsplit-core - Core types and traits for the chunking engine
//!
//! This crate provides the document and chunk model, the error taxonomy,
//! configuration, and the traits every splitter implements.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{Result, SplitError};
pub use traits::*;
pub use types::*;
