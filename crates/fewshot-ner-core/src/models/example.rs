//! Labeled token sequences.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{ModelError, ModelResult};

/// A labeled sentence: tokens paired index-for-index with label ids.
///
/// Immutable once built; the constructor enforces equal lengths so every
/// downstream component can index both vectors with the same position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Example {
    id: String,
    tokens: Vec<String>,
    labels: Vec<u32>,
}

impl Example {
    /// Build an example, rejecting mismatched token/label lengths.
    pub fn new(id: impl Into<String>, tokens: Vec<String>, labels: Vec<u32>) -> ModelResult<Self> {
        let id = id.into();
        if tokens.len() != labels.len() {
            return Err(ModelError::LengthMismatch {
                id,
                tokens: tokens.len(),
                labels: labels.len(),
            });
        }
        Ok(Self { id, tokens, labels })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Plain sentence text: tokens joined by single spaces.
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    /// Number of tokens carrying `label`.
    pub fn count_label(&self, label: u32) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    /// Distinct tokens of the sentence, case preserved.
    pub fn token_set(&self) -> HashSet<&str> {
        self.tokens.iter().map(String::as_str).collect()
    }

    /// Surface text of every maximal run of `label`, in order of appearance.
    pub fn mentions(&self, label: u32) -> Vec<String> {
        let mut mentions = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for (token, &l) in self.tokens.iter().zip(&self.labels) {
            if l == label {
                current.push(token);
            } else if !current.is_empty() {
                mentions.push(current.join(" "));
                current.clear();
            }
        }
        if !current.is_empty() {
            mentions.push(current.join(" "));
        }

        mentions
    }
}

/// On-disk record format for a labeled sentence.
///
/// Accepts both the `words`/`ner_tags` column names used by Hugging Face NER
/// datasets and the shorter `tokens`/`labels`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "words")]
    pub tokens: Vec<String>,
    #[serde(alias = "ner_tags")]
    pub labels: Vec<u32>,
}

impl RawExample {
    /// Convert to an [`Example`], using `fallback_id` when the record has none.
    pub fn into_example(self, fallback_id: impl FnOnce() -> String) -> ModelResult<Example> {
        let id = self.id.unwrap_or_else(fallback_id);
        Example::new(id, self.tokens, self.labels)
    }
}

impl From<&Example> for RawExample {
    fn from(example: &Example) -> Self {
        Self {
            id: Some(example.id.clone()),
            tokens: example.tokens.clone(),
            labels: example.labels.clone(),
        }
    }
}
