//! Few-shot NER core library.
//!
//! Evaluation of few-shot prompting of causal language models on named-entity
//! recognition.
//!
//! # Architecture
//!
//! ```text
//! Dataset ─▶ Subsample ─▶ Example Selector ─▶ Prompt ─▶ Model ─▶ Completion
//!                              │                                     │
//!                        Span Tagger (demos)                Mention Extractor
//!                                                                    │
//!                     Span Tagger (gold) ─▶ Mention Extractor ─▶ Scorer ─▶ P / R / F1
//! ```
//!
//! Prompt wording and the model collaborator live in `fewshot-ner-llm`; this
//! crate holds everything that does not depend on them.
//!
//! # Modules
//!
//! - [`models`]: Examples, entity tags, domains, label maps
//! - [`tagging`]: Span tagger and mention extractor
//! - [`selection`]: Few-shot example selection criteria
//! - [`scoring`]: Exact-match counters and micro-averaged metrics
//! - [`dataset`]: Loading, length filtering, seeded subsampling
//! - [`config`]: Experiment configuration and validation
//! - [`cache`]: On-disk prompt cache
//! - [`runlog`]: Text log and JSON results of a run

pub mod cache;
pub mod config;
pub mod dataset;
pub mod models;
pub mod runlog;
pub mod scoring;
pub mod selection;
pub mod tagging;

// Re-export commonly used types
pub use cache::{CachedPrompt, PromptCache, PromptCacheKey};
pub use config::{ConfigError, DecodingParams, ExperimentConfig};
pub use dataset::{filter_by_text_length, load_examples, load_label_map, subsample, DatasetError};
pub use models::{Domain, EntityTag, Example, LabelMap, Language, ModelError, PromptStyle};
pub use runlog::{RunLog, RunSummary, TagRecord};
pub use scoring::{Metrics, ScoreBoard, ScoreDelta, Scorer};
pub use selection::{select, select_shuffled, Criterion, SelectionError};
pub use tagging::{extract, tag, Markers, MentionExtractor, TaggingError};

use thiserror::Error;

/// Top-level error for callers that mix several core operations.
#[derive(Debug, Error)]
pub enum NerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("Tagging error: {0}")]
    Tagging(#[from] TaggingError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NerResult<T> = Result<T, NerError>;
