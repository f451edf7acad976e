//! End-to-end evaluation: prompts, generation, extraction, scoring.

use fewshot_ner_core::cache::CacheError;
use fewshot_ner_core::scoring::score_mentions;
use fewshot_ner_core::{
    select_shuffled, CachedPrompt, ConfigError, EntityTag, Example, ExperimentConfig, LabelMap,
    MentionExtractor, ModelError, PromptCache, ScoreBoard, TagRecord, TaggingError,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::generation::{ensure_count, first_line, GenerationError, Generator};
use crate::prompts::{build_prompt, Demonstration, PromptError, PromptTemplate};
use crate::verification::{demonstrations, SelfVerifier, VerificationError};

/// Experiment errors.
#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Tagging(#[from] TaggingError),
}

pub type ExperimentResult<T> = Result<T, ExperimentError>;

/// Everything produced for one tag, indexed like the queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRun {
    pub tag: EntityTag,
    /// First line of each completion
    pub outputs: Vec<String>,
    pub predicted: Vec<Vec<String>>,
    pub gold: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    /// Query sentences, as shown to the model
    pub queries: Vec<String>,
    pub runs: Vec<TagRun>,
    pub board: ScoreBoard,
}

impl ExperimentOutcome {
    /// Log lines of query `index`, one per tag.
    pub fn records(&self, index: usize) -> Vec<TagRecord> {
        self.runs
            .iter()
            .filter(|run| index < run.outputs.len())
            .map(|run| TagRecord {
                tag: run.tag,
                output: run.outputs[index].clone(),
                predicted: run.predicted[index].clone(),
                gold: run.gold[index].clone(),
            })
            .collect()
    }
}

/// A configured prompting experiment.
pub struct Experiment<'a> {
    config: &'a ExperimentConfig,
    template: &'a PromptTemplate,
    labels: &'a LabelMap,
    extractor: MentionExtractor,
    cache: Option<&'a PromptCache>,
    overwrite_cache: bool,
}

impl<'a> Experiment<'a> {
    /// Validate the configuration, the template and the label mapping of
    /// every configured tag.
    pub fn new(
        config: &'a ExperimentConfig,
        template: &'a PromptTemplate,
        labels: &'a LabelMap,
    ) -> ExperimentResult<Self> {
        config.validate()?;
        template.validate(config.domain)?;
        for &tag in &config.tags {
            labels.id_for_tag(tag)?;
        }
        Ok(Self {
            config,
            template,
            labels,
            extractor: MentionExtractor::new(&config.markers)?,
            cache: None,
            overwrite_cache: false,
        })
    }

    pub fn with_cache(mut self, cache: &'a PromptCache, overwrite: bool) -> Self {
        self.cache = Some(cache);
        self.overwrite_cache = overwrite;
        self
    }

    /// Few-shot examples for `query`, in prompt order.
    ///
    /// Without a test set the queries come from the pool itself, so the
    /// query is left out of its own candidates.
    fn few_shot<'p>(
        &self,
        pool: &'p [Example],
        query: &Example,
        target: u32,
        rng: &mut StdRng,
    ) -> Vec<&'p Example> {
        let leave_one_out = !self.config.test_on_test_set;
        let candidates: Vec<&Example> = pool
            .iter()
            .filter(|e| !leave_one_out || e.id() != query.id())
            .collect();
        select_shuffled(
            &candidates,
            query,
            target,
            self.config.n_few_shot,
            self.config.criterion,
            rng,
        )
        .into_iter()
        .map(|i| candidates[i])
        .collect()
    }

    fn render_prompts(
        &self,
        tag: EntityTag,
        target: u32,
        pool: &[Example],
        queries: &[Example],
    ) -> ExperimentResult<Vec<CachedPrompt>> {
        let mut rng = StdRng::seed_from_u64(self.config.seed_prompt);
        queries
            .iter()
            .map(|query| {
                let demos: Vec<Demonstration> = self
                    .few_shot(pool, query, target, &mut rng)
                    .into_iter()
                    .map(|e| Demonstration {
                        text: e.text(),
                        tagged: e.tagged(target, &self.config.markers),
                    })
                    .collect();
                let prompt = build_prompt(
                    self.template,
                    self.config.domain,
                    tag,
                    &self.config.markers,
                    &demos,
                    &query.text(),
                )?;
                Ok(CachedPrompt {
                    example_id: query.id().to_string(),
                    prompt,
                })
            })
            .collect()
    }

    /// One prompt per query for `tag`, from the cache when possible.
    pub fn build_prompts(
        &self,
        tag: EntityTag,
        pool: &[Example],
        queries: &[Example],
    ) -> ExperimentResult<Vec<CachedPrompt>> {
        let target = self.labels.id_for_tag(tag)?;
        let key = self.config.cache_key(tag);

        if let Some(cache) = self.cache.filter(|_| !self.overwrite_cache) {
            if let Some(prompts) = cache.load(&key)? {
                let matches = prompts.len() == queries.len()
                    && prompts
                        .iter()
                        .zip(queries)
                        .all(|(p, q)| p.example_id == q.id());
                if matches {
                    info!(%tag, path = %cache.path_for(&key).display(), "using cached prompts");
                    return Ok(prompts);
                }
                warn!(
                    %tag,
                    cached = prompts.len(),
                    queries = queries.len(),
                    "cached prompts do not match the queries, rebuilding"
                );
            }
        }

        let prompts = self.render_prompts(tag, target, pool, queries)?;
        if let Some(cache) = self.cache {
            cache.store(&key, &prompts)?;
            debug!(%tag, path = %cache.path_for(&key).display(), "stored prompts");
        }
        Ok(prompts)
    }

    fn complete<G: Generator + ?Sized>(
        &self,
        generator: &mut G,
        prompts: &[String],
    ) -> ExperimentResult<Vec<String>> {
        let mut outputs = Vec::with_capacity(prompts.len());
        for (i, batch) in prompts.chunks(self.config.batch_size).enumerate() {
            let completions = generator.generate(batch, &self.config.decoding)?;
            ensure_count(batch.len(), &completions)?;
            debug!(batch = i, size = batch.len(), "batch generated");
            outputs.extend(completions);
        }
        Ok(outputs)
    }

    /// Evaluate every configured tag on `queries`, picking few-shot
    /// examples from `pool`.
    pub fn run<G: Generator + ?Sized>(
        &self,
        generator: &mut G,
        pool: &[Example],
        queries: &[Example],
    ) -> ExperimentResult<ExperimentOutcome> {
        let verifier = SelfVerifier::new(self.template, self.config.domain);
        let mut board = ScoreBoard::new();
        let mut runs = Vec::with_capacity(self.config.tags.len());

        for &tag in &self.config.tags {
            info!(%tag, queries = queries.len(), pool = pool.len(), "prompting");
            let target = self.labels.id_for_tag(tag)?;
            let prompts: Vec<String> = self
                .build_prompts(tag, pool, queries)?
                .into_iter()
                .map(|p| p.prompt)
                .collect();
            let completions = self.complete(generator, &prompts)?;

            let mut run = TagRun {
                tag,
                outputs: Vec::with_capacity(queries.len()),
                predicted: Vec::with_capacity(queries.len()),
                gold: Vec::with_capacity(queries.len()),
            };
            // Same seed as prompt construction, so verification sees the
            // examples the prompt showed.
            let mut rng = StdRng::seed_from_u64(self.config.seed_prompt);

            for (query, completion) in queries.iter().zip(&completions) {
                let output = first_line(completion);
                let mut predicted = self.extractor.extract(output);

                if self.config.self_verification {
                    let shots = self.few_shot(pool, query, target, &mut rng);
                    let demos = demonstrations(shots, target);
                    predicted = verifier.verify(
                        generator,
                        &self.config.decoding,
                        tag,
                        &demos,
                        &query.text(),
                        &predicted,
                    )?;
                }

                let gold = self
                    .extractor
                    .extract(&query.tagged(target, &self.config.markers));
                board.record(tag, score_mentions(&gold, &predicted));

                run.outputs.push(output.to_string());
                run.predicted.push(predicted);
                run.gold.push(gold);
            }

            if let Some(metrics) = board.tag_metrics(tag) {
                info!(%tag, %metrics, "tag evaluated");
            }
            runs.push(run);
        }

        Ok(ExperimentOutcome {
            queries: queries.iter().map(Example::text).collect(),
            runs,
            board,
        })
    }
}
