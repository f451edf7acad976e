//! Few-shot example selection.
//!
//! Every [`Criterion`] scores each pool example against the query; the
//! selector keeps the `n` best. Ranking is deterministic. Callers shuffle the
//! result with their own seeded RNG so prompt position does not follow rank.

mod tfidf;

pub use tfidf::*;

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Example;

/// Selection errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Unknown selection criterion: {0}")]
    UnknownCriterion(String),
}

/// Ranking strategy for pool examples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Number of tokens carrying the target label.
    MostOccurrences,
    /// Size of the token-set intersection with the query.
    MostCommonTokens,
    /// TF-IDF cosine similarity with the query.
    ClosestTfIdf,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::MostOccurrences => "most_occurrences",
            Criterion::MostCommonTokens => "most_common_tokens",
            Criterion::ClosestTfIdf => "closest_tf_idf",
        }
    }

    /// Score of every pool example, index-aligned with `pool`.
    pub fn scores<E: Borrow<Example>>(&self, pool: &[E], query: &Example, target: u32) -> Vec<f64> {
        match self {
            Criterion::MostOccurrences => pool
                .iter()
                .map(|e| as_example(e).count_label(target) as f64)
                .collect(),
            Criterion::MostCommonTokens => {
                let query_tokens = query.token_set();
                pool.iter()
                    .map(|e| as_example(e).token_set().intersection(&query_tokens).count() as f64)
                    .collect()
            }
            Criterion::ClosestTfIdf => tfidf_scores(pool, query),
        }
    }
}

fn as_example<E: Borrow<Example>>(e: &E) -> &Example {
    e.borrow()
}

fn tfidf_scores<E: Borrow<Example>>(pool: &[E], query: &Example) -> Vec<f64> {
    let documents = pool
        .iter()
        .map(|e| as_example(e).tokens())
        .chain(std::iter::once(query.tokens()))
        .map(|tokens| tokens.iter().map(String::as_str));
    let space = TfIdfSpace::fit(documents);

    let query_vector = space.vectorize(query.tokens().iter().map(String::as_str));
    pool.iter()
        .map(|e| {
            let v = space.vectorize(as_example(e).tokens().iter().map(String::as_str));
            cosine(&query_vector, &v)
        })
        .collect()
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "most_occurrences" | "most_occurences" => Ok(Criterion::MostOccurrences),
            "most_common_tokens" => Ok(Criterion::MostCommonTokens),
            "closest_tf_idf" | "tf_idf" => Ok(Criterion::ClosestTfIdf),
            other => Err(SelectionError::UnknownCriterion(other.to_string())),
        }
    }
}

/// Indices of the `n` highest-scoring pool examples, lowest first.
///
/// Scores are sorted ascending with a stable sort and the last `n` kept; a
/// request larger than the pool returns the whole pool.
pub fn select<E: Borrow<Example>>(
    pool: &[E],
    query: &Example,
    target: u32,
    n: usize,
    criterion: Criterion,
) -> Vec<usize> {
    let scores = criterion.scores(pool, query, target);
    let mut order: Vec<usize> = (0..pool.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let keep = n.min(order.len());
    order.split_off(order.len() - keep)
}

/// [`select`] followed by a shuffle driven by `rng`.
pub fn select_shuffled<E, R>(
    pool: &[E],
    query: &Example,
    target: u32,
    n: usize,
    criterion: Criterion,
    rng: &mut R,
) -> Vec<usize>
where
    E: Borrow<Example>,
    R: Rng + ?Sized,
{
    let mut picked = select(pool, query, target, n, criterion);
    picked.shuffle(rng);
    picked
}
