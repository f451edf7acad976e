//! Exact-match scoring of extracted mentions.
//!
//! Mentions are compared as sets of surface strings. Counts are summed over
//! the whole evaluation pass and turned into micro-averaged metrics at the end.

mod board;

pub use board::*;

use std::collections::HashSet;
use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::tagging::MentionExtractor;

/// Counts contributed by one evaluated example.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDelta {
    /// Predicted mentions that exactly match a gold mention
    pub true_positives: usize,
    /// Distinct gold mentions
    pub relevant: usize,
    /// Distinct predicted mentions
    pub retrieved: usize,
}

impl Add for ScoreDelta {
    type Output = ScoreDelta;

    fn add(self, rhs: ScoreDelta) -> ScoreDelta {
        ScoreDelta {
            true_positives: self.true_positives + rhs.true_positives,
            relevant: self.relevant + rhs.relevant,
            retrieved: self.retrieved + rhs.retrieved,
        }
    }
}

impl AddAssign for ScoreDelta {
    fn add_assign(&mut self, rhs: ScoreDelta) {
        *self = *self + rhs;
    }
}

/// Compare gold and predicted mentions with set semantics.
pub fn score_mentions<G, P>(gold: &[G], predicted: &[P]) -> ScoreDelta
where
    G: AsRef<str>,
    P: AsRef<str>,
{
    let gold: HashSet<&str> = gold.iter().map(AsRef::as_ref).collect();
    let predicted: HashSet<&str> = predicted.iter().map(AsRef::as_ref).collect();

    ScoreDelta {
        true_positives: gold.intersection(&predicted).count(),
        relevant: gold.len(),
        retrieved: predicted.len(),
    }
}

/// Extract mentions from both tagged strings and compare them.
pub fn score(gold_tagged: &str, predicted_tagged: &str, extractor: &MentionExtractor) -> ScoreDelta {
    let gold = extractor.extract(gold_tagged);
    let predicted = extractor.extract(predicted_tagged);
    score_mentions(&gold, &predicted)
}

/// Precision, recall and F1 of an evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl Metrics {
    /// Micro-averaged metrics from summed counts. A zero denominator gives 0.
    pub fn from_counts(counts: ScoreDelta) -> Self {
        let tp = counts.true_positives as f64;
        let ratio = |num: f64, denom: usize| if denom == 0 { 0.0 } else { num / denom as f64 };

        Self {
            precision: ratio(tp, counts.retrieved),
            recall: ratio(tp, counts.relevant),
            f1: ratio(2.0 * tp, counts.relevant + counts.retrieved),
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "precision: {:.4}, recall: {:.4}, f1: {:.4}",
            self.precision, self.recall, self.f1
        )
    }
}

/// Running exact-match counters for one evaluation pass.
///
/// Counters only grow until [`Scorer::reset`] starts a new pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scorer {
    totals: ScoreDelta,
    examples: usize,
}

impl Scorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, delta: ScoreDelta) {
        self.totals += delta;
        self.examples += 1;
    }

    /// Score one example and accumulate it. Returns the delta.
    pub fn score(
        &mut self,
        gold_tagged: &str,
        predicted_tagged: &str,
        extractor: &MentionExtractor,
    ) -> ScoreDelta {
        let delta = score(gold_tagged, predicted_tagged, extractor);
        self.add(delta);
        delta
    }

    pub fn totals(&self) -> ScoreDelta {
        self.totals
    }

    /// Number of examples accumulated so far.
    pub fn examples(&self) -> usize {
        self.examples
    }

    pub fn finalize(&self) -> Metrics {
        Metrics::from_counts(self.totals)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagging::Markers;

    fn extractor() -> MentionExtractor {
        MentionExtractor::new(&Markers::default()).unwrap()
    }

    #[test]
    fn test_partial_overlap_scores_zero() {
        let delta = score(
            "@@Barack Obama## est le président des États-Unis .",
            "@@Barack## @@Obama## est le président des États-Unis .",
            &extractor(),
        );
        assert_eq!(
            delta,
            ScoreDelta {
                true_positives: 0,
                relevant: 1,
                retrieved: 2
            }
        );
        let metrics = Metrics::from_counts(delta);
        assert_eq!(metrics, Metrics::default());
    }

    #[test]
    fn test_exact_match() {
        let text = "Je vis à @@Paris## .";
        let mut scorer = Scorer::new();
        scorer.score(text, text, &extractor());
        let m = scorer.finalize();
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
    }

    #[test]
    fn test_empty_retrieval() {
        let mut scorer = Scorer::new();
        scorer.score("@@Paris## et @@Lyon##", "Paris et Lyon", &extractor());
        let m = scorer.finalize();
        assert_eq!(scorer.totals().retrieved, 0);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn test_duplicates_collapse() {
        let delta = score_mentions(&["Paris", "Paris"], &["Paris", "Paris", "Lyon"]);
        assert_eq!(
            delta,
            ScoreDelta {
                true_positives: 1,
                relevant: 1,
                retrieved: 2
            }
        );
    }

    #[test]
    fn test_micro_average() {
        let mut scorer = Scorer::new();
        // 1/1 correct, then 0/1 with 3 predictions
        scorer.score("@@Paris##", "@@Paris##", &extractor());
        scorer.score("@@Lyon##", "@@a## @@b## @@c##", &extractor());
        let m = scorer.finalize();
        assert_eq!(scorer.examples(), 2);
        assert!((m.precision - 0.25).abs() < 1e-12);
        assert!((m.recall - 0.5).abs() < 1e-12);
        assert!((m.f1 - 2.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset() {
        let mut scorer = Scorer::new();
        scorer.score("@@Paris##", "@@Paris##", &extractor());
        scorer.reset();
        assert_eq!(scorer.totals(), ScoreDelta::default());
        assert_eq!(scorer.finalize(), Metrics::default());
    }

    #[test]
    fn test_display() {
        let m = Metrics {
            precision: 0.5,
            recall: 0.25,
            f1: 1.0 / 3.0,
        };
        assert_eq!(m.to_string(), "precision: 0.5000, recall: 0.2500, f1: 0.3333");
    }
}
