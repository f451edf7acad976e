//! Experiment configuration, validated once before any work starts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::PromptCacheKey;
use crate::models::{Domain, EntityTag, Language, PromptStyle};
use crate::selection::Criterion;
use crate::tagging::Markers;

/// Configuration errors. All of them are fatal at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Please specify a training size greater than zero")]
    MissingTrainingSize,

    #[error("Batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("Begin and end markers must not be empty")]
    EmptyMarker,

    #[error("Begin and end markers must differ (both are {0:?})")]
    IdenticalMarkers(String),

    #[error("No entity tag selected")]
    NoTags,

    #[error("Tag {tag} is not annotated in the {domain} domain")]
    TagNotInDomain { tag: EntityTag, domain: Domain },

    #[error("Number of beams must be at least 1")]
    InvalidBeamCount,

    #[error("Sampling temperature must be positive, got {0}")]
    InvalidTemperature(String),

    #[error("Top-p must be in (0, 1], got {0}")]
    InvalidTopP(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Decoding hyperparameters passed to the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub num_beams: u32,
    pub do_sample: bool,
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 1.0,
            top_k: 50,
            num_beams: 1,
            do_sample: false,
        }
    }
}

/// Everything that defines one prompting experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Dataset identifier, part of the prompt cache key
    pub dataset_name: String,
    pub language: Language,
    pub prompt_style: PromptStyle,
    pub domain: Domain,
    /// Tags evaluated, each in its own prompting pass
    pub tags: Vec<EntityTag>,
    pub markers: Markers,
    pub n_few_shot: usize,
    pub criterion: Criterion,
    pub model_name: String,
    pub batch_size: usize,
    pub decoding: DecodingParams,
    /// Seed of the training-subset draw
    pub seed_acquisition: u64,
    /// Seed of the few-shot order shuffle
    pub seed_prompt: u64,
    pub training_size: usize,
    pub test_on_test_set: bool,
    pub self_verification: bool,
    /// Examples whose text is this long or longer are dropped
    pub max_text_chars: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            dataset_name: "WikiNER".into(),
            language: Language::Fr,
            prompt_style: PromptStyle::Plain,
            domain: Domain::General,
            tags: Domain::General.tags().to_vec(),
            markers: Markers::default(),
            n_few_shot: 5,
            criterion: Criterion::MostOccurrences,
            model_name: "bigscience/bloom".into(),
            batch_size: 2,
            decoding: DecodingParams::default(),
            seed_acquisition: 1,
            seed_prompt: 42,
            training_size: 70,
            test_on_test_set: false,
            self_verification: false,
            max_text_chars: 512,
        }
    }
}

impl ExperimentConfig {
    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.training_size == 0 {
            return Err(ConfigError::MissingTrainingSize);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.markers.begin.is_empty() || self.markers.end.is_empty() {
            return Err(ConfigError::EmptyMarker);
        }
        if self.markers.begin == self.markers.end {
            return Err(ConfigError::IdenticalMarkers(self.markers.begin.clone()));
        }
        if self.tags.is_empty() {
            return Err(ConfigError::NoTags);
        }
        if let Some(&tag) = self.tags.iter().find(|t| !self.domain.tags().contains(*t)) {
            return Err(ConfigError::TagNotInDomain {
                tag,
                domain: self.domain,
            });
        }
        if self.decoding.num_beams == 0 {
            return Err(ConfigError::InvalidBeamCount);
        }
        if self.decoding.do_sample {
            if self.decoding.temperature <= 0.0 {
                return Err(ConfigError::InvalidTemperature(
                    self.decoding.temperature.to_string(),
                ));
            }
            if !(self.decoding.top_p > 0.0 && self.decoding.top_p <= 1.0) {
                return Err(ConfigError::InvalidTopP(self.decoding.top_p.to_string()));
            }
        }
        Ok(())
    }

    /// Prompt cache key of the prompts built for `tag`.
    pub fn cache_key(&self, tag: EntityTag) -> PromptCacheKey {
        PromptCacheKey {
            dataset_name: self.dataset_name.clone(),
            language: self.language,
            prompt_style: self.prompt_style,
            domain: self.domain,
            tag,
            markers: self.markers.clone(),
            n_few_shot: self.n_few_shot,
            criterion: self.criterion,
        }
    }
}
