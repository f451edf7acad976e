//! Conversion between labeled tokens and marker-delimited text.
//!
//! Round trip:
//!
//! ```text
//! tokens + labels ──tag──▶ "@@Barack Obama## est le président ." ──extract──▶ ["Barack Obama"]
//! ```

mod extractor;
mod tagger;

pub use extractor::*;
pub use tagger::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tagging errors.
#[derive(Error, Debug)]
pub enum TaggingError {
    #[error("Model error: {0}")]
    Model(#[from] crate::models::ModelError),

    #[error("Invalid marker pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type TaggingResult<T> = Result<T, TaggingError>;

/// Begin/end delimiters wrapping a mention in text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Markers {
    pub begin: String,
    pub end: String,
}

impl Markers {
    pub fn new(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
        }
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new("@@", "##")
    }
}
