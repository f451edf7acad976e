//! Domain models for few-shot NER experiments.

mod example;
mod label;

pub use example::*;
pub use label::*;

use thiserror::Error;

/// Errors raised while building or interpreting examples.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error("example {id}: {tokens} tokens but {labels} labels")]
    LengthMismatch {
        id: String,
        tokens: usize,
        labels: usize,
    },

    #[error("Unknown entity tag: {0}")]
    UnknownTag(String),

    #[error("Unknown domain: {0}")]
    UnknownDomain(String),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Unknown prompt style: {0}")]
    UnknownPromptStyle(String),

    #[error("Label name mapped twice: {0}")]
    DuplicateLabel(String),

    #[error("Label id mapped twice: {0}")]
    DuplicateLabelId(u32),

    #[error("Label map has no id for tag {0}")]
    UnmappedTag(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
