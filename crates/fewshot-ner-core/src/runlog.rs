//! Human-readable run log and JSON results file.
//!
//! Layout of a run directory:
//!
//! ```text
//! hyp_search_2024-01-31_12-00-00/
//! ├── log_2024-01-31_12-00-00.txt   configuration, per-example outputs, metrics
//! └── results.json                  configuration + per-tag counts and metrics
//! ```

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::config::ExperimentConfig;
use crate::models::EntityTag;
use crate::scoring::{Metrics, ScoreBoard, TagReport};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Per-tag lines of one logged example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub tag: EntityTag,
    pub output: String,
    pub predicted: Vec<String>,
    pub gold: Vec<String>,
}

/// Final results written next to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub config: ExperimentConfig,
    pub examples: usize,
    pub tags: Vec<TagReport>,
    pub micro: Metrics,
}

impl RunSummary {
    pub fn new(config: &ExperimentConfig, examples: usize, board: &ScoreBoard) -> Self {
        Self {
            config: config.clone(),
            examples,
            tags: board.reports(),
            micro: board.micro(),
        }
    }
}

/// Append-only text log of one experiment run.
pub struct RunLog {
    dir: PathBuf,
    path: PathBuf,
    writer: BufWriter<fs::File>,
}

impl RunLog {
    /// Create `hyp_search_<timestamp>/log_<timestamp>.txt` under `base`.
    pub fn create<Tz>(base: &Path, started_at: &DateTime<Tz>) -> io::Result<Self>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let stamp = started_at.format(TIMESTAMP_FORMAT).to_string();
        let dir = base.join(format!("hyp_search_{stamp}"));
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("log_{stamp}.txt"));
        let writer = BufWriter::new(fs::File::create(&path)?);
        tracing::info!(path = %path.display(), "writing run log");

        Ok(Self { dir, path, writer })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_config(&mut self, config: &ExperimentConfig) -> io::Result<()> {
        let tags: Vec<&str> = config.tags.iter().map(EntityTag::as_str).collect();
        let w = &mut self.writer;
        writeln!(w, "dataset: {}", config.dataset_name)?;
        writeln!(w, "language: {}", config.language)?;
        writeln!(w, "prompt_style: {}", config.prompt_style)?;
        writeln!(w, "domain: {}", config.domain)?;
        writeln!(w, "ner_tags: {}", tags.join(", "))?;
        writeln!(w, "begin_tag: {}", config.markers.begin)?;
        writeln!(w, "end_tag: {}", config.markers.end)?;
        writeln!(w, "n_few_shot: {}", config.n_few_shot)?;
        writeln!(w, "model_name: {}", config.model_name)?;
        writeln!(w, "criterion: {}", config.criterion)?;
        writeln!(w, "training_size: {}", config.training_size)?;
        writeln!(w, "random_seed: {}", config.seed_acquisition)?;
        writeln!(w, "prompt_seed: {}", config.seed_prompt)?;
        writeln!(w, "num_beams: {}", config.decoding.num_beams)?;
        writeln!(w, "self verification: {}", config.self_verification)?;
        writeln!(w, "test on test set: {}", config.test_on_test_set)?;
        if config.decoding.do_sample {
            writeln!(w, "top_p: {}", config.decoding.top_p)?;
            writeln!(w, "top_k: {}", config.decoding.top_k)?;
            writeln!(w, "temperature: {}", config.decoding.temperature)?;
        } else {
            writeln!(w, "greedy")?;
        }
        writeln!(w, "{}", "=".repeat(50))
    }

    /// Log one query example with the model output and mentions of every tag.
    pub fn write_example(&mut self, input: &str, records: &[TagRecord]) -> io::Result<()> {
        let w = &mut self.writer;
        writeln!(w, "{}", "=".repeat(50))?;
        writeln!(w, "input: {input}")?;
        writeln!(w, "{}", "-".repeat(50))?;
        for record in records {
            writeln!(w, "{} output: {}", record.tag, record.output)?;
            writeln!(w, "final: {:?}", record.predicted)?;
            writeln!(w, "gold: {:?}", record.gold)?;
        }
        Ok(())
    }

    /// Closing metric lines, one per tag and one overall.
    pub fn write_summary(&mut self, board: &ScoreBoard) -> io::Result<()> {
        let w = &mut self.writer;
        writeln!(w, "{}", "=".repeat(50))?;
        for report in board.reports() {
            writeln!(w, "{}: {}", report.tag, report.metrics)?;
        }
        writeln!(w, "overall: {}", board.micro())
    }

    /// Write `results.json` into the run directory.
    pub fn write_results(&self, summary: &RunSummary) -> io::Result<PathBuf> {
        let path = self.dir.join("results.json");
        let json = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}
