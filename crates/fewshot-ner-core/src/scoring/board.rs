//! Per-tag score bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::EntityTag;

use super::{Metrics, ScoreDelta, Scorer};

/// One [`Scorer`] per entity tag, plus the micro total across tags.
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    scorers: BTreeMap<EntityTag, Scorer>,
}

/// Serializable snapshot of a tag's counts and metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagReport {
    pub tag: EntityTag,
    pub counts: ScoreDelta,
    pub metrics: Metrics,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tag: EntityTag, delta: ScoreDelta) {
        self.scorers.entry(tag).or_default().add(delta);
    }

    pub fn scorer(&self, tag: EntityTag) -> Option<&Scorer> {
        self.scorers.get(&tag)
    }

    pub fn tag_metrics(&self, tag: EntityTag) -> Option<Metrics> {
        self.scorer(tag).map(Scorer::finalize)
    }

    /// Counts summed over every tag.
    pub fn totals(&self) -> ScoreDelta {
        self.scorers
            .values()
            .fold(ScoreDelta::default(), |acc, s| acc + s.totals())
    }

    pub fn micro(&self) -> Metrics {
        Metrics::from_counts(self.totals())
    }

    pub fn tags(&self) -> impl Iterator<Item = EntityTag> + '_ {
        self.scorers.keys().copied()
    }

    pub fn reports(&self) -> Vec<TagReport> {
        self.scorers
            .iter()
            .map(|(tag, scorer)| TagReport {
                tag: *tag,
                counts: scorer.totals(),
                metrics: scorer.finalize(),
            })
            .collect()
    }
}
