use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Args;
use fewshot_ner_core::scoring::score;
use fewshot_ner_core::{
    filter_by_text_length, load_examples, load_label_map, subsample, Criterion, DecodingParams,
    Domain, EntityTag, Example, ExperimentConfig, LabelMap, Language, Markers, MentionExtractor,
    PromptCache, PromptStyle, RunLog, RunSummary, ScoreBoard,
};
use fewshot_ner_llm::{CommandGenerator, Experiment, Generator, PromptTemplate, ReplayGenerator};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Data, prompt and selection flags shared by `evaluate` and `prompts`.
#[derive(Args, Debug)]
pub struct ExperimentArgs {
    /// Training examples (.jsonl or .json); the few-shot pool is drawn from them
    #[arg(long)]
    pub train: PathBuf,

    /// Test examples, used with --test-on-test-set
    #[arg(long)]
    pub test: Option<PathBuf>,

    /// Dataset name, part of the prompt cache key
    #[arg(long, default_value = "WikiNER")]
    pub dataset_name: String,

    #[arg(long, default_value = "fr")]
    pub language: Language,

    /// plain or chat-assistant
    #[arg(long, default_value = "plain")]
    pub prompt_style: PromptStyle,

    /// Custom prompt template (JSON) instead of the built-in one
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// general or clinical
    #[arg(long, default_value = "general")]
    pub domain: Domain,

    /// Tag to evaluate; repeat for several (default: every tag of the domain)
    #[arg(long = "ner-tag")]
    pub ner_tags: Vec<EntityTag>,

    /// JSON object mapping label ids to tag names (default: WikiNER map)
    #[arg(long)]
    pub label_map: Option<PathBuf>,

    #[arg(long, default_value = "@@")]
    pub begin_tag: String,

    #[arg(long, default_value = "##")]
    pub end_tag: String,

    #[arg(long, default_value_t = 5)]
    pub n_few_shot: usize,

    /// most_occurrences, most_common_tokens or closest_tf_idf
    #[arg(long, default_value = "most_occurrences")]
    pub criterion: Criterion,

    #[arg(short = 's', long, default_value_t = 70)]
    pub training_size: usize,

    #[arg(long, default_value_t = 1)]
    pub random_seed_acquisition: u64,

    #[arg(long, default_value_t = 42)]
    pub random_seed_prompt_generation: u64,

    /// Evaluate on --test instead of the training subset
    #[arg(short = 't', long)]
    pub test_on_test_set: bool,

    /// Examples whose text has at least this many characters are dropped
    #[arg(long, default_value_t = 512)]
    pub max_text_chars: usize,

    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    #[arg(long)]
    pub overwrite_cache: bool,
}

#[derive(Args, Debug)]
pub struct DecodingArgs {
    #[arg(long, default_value = "bigscience/bloom")]
    pub model_name: String,

    #[arg(long, default_value_t = 2)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1.0)]
    pub top_p: f32,

    #[arg(long, default_value_t = 50)]
    pub top_k: u32,

    #[arg(long, default_value_t = 1.0)]
    pub temperature: f32,

    #[arg(long, default_value_t = 1)]
    pub num_beams: u32,

    #[arg(long)]
    pub do_sample: bool,
}

/// Where completions come from.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct GeneratorArgs {
    /// Inference command: reads JSON request lines on stdin, prints one JSON string per line
    #[arg(long)]
    pub generator_command: Option<String>,

    /// Recorded completions (JSONL with "prompt" and "completion")
    #[arg(long)]
    pub completions: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub experiment: ExperimentArgs,

    #[command(flatten)]
    pub decoding: DecodingArgs,

    #[command(flatten)]
    pub generator: GeneratorArgs,

    /// Ask the model to confirm every predicted mention
    #[arg(long)]
    pub self_verification: bool,

    /// Directory receiving the hyp_search_<timestamp> run folder
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct PromptsArgs {
    #[command(flatten)]
    pub experiment: ExperimentArgs,

    /// Output JSONL file (default: stdout)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// JSONL with "tag", "gold" and "predicted" tagged sentences
    pub input: PathBuf,

    #[arg(long, default_value = "@@")]
    pub begin_tag: String,

    #[arg(long, default_value = "##")]
    pub end_tag: String,
}

/// Examples and settings ready for an [`Experiment`].
struct Prepared {
    config: ExperimentConfig,
    template: PromptTemplate,
    labels: LabelMap,
    pool: Vec<Example>,
    queries: Vec<Example>,
}

fn build_config(
    args: &ExperimentArgs,
    decoding: Option<&DecodingArgs>,
    self_verification: bool,
) -> ExperimentConfig {
    let tags = if args.ner_tags.is_empty() {
        args.domain.tags().to_vec()
    } else {
        args.ner_tags.clone()
    };
    let mut config = ExperimentConfig {
        dataset_name: args.dataset_name.clone(),
        language: args.language,
        prompt_style: args.prompt_style,
        domain: args.domain,
        tags,
        markers: Markers::new(args.begin_tag.as_str(), args.end_tag.as_str()),
        n_few_shot: args.n_few_shot,
        criterion: args.criterion,
        seed_acquisition: args.random_seed_acquisition,
        seed_prompt: args.random_seed_prompt_generation,
        training_size: args.training_size,
        test_on_test_set: args.test_on_test_set,
        self_verification,
        max_text_chars: args.max_text_chars,
        ..ExperimentConfig::default()
    };
    if let Some(d) = decoding {
        config.model_name = d.model_name.clone();
        config.batch_size = d.batch_size;
        config.decoding = DecodingParams {
            temperature: d.temperature,
            top_p: d.top_p,
            top_k: d.top_k,
            num_beams: d.num_beams,
            do_sample: d.do_sample,
        };
    }
    config
}

fn load_split(path: &Path, max_chars: usize) -> Result<Vec<Example>> {
    let examples = load_examples(path)
        .with_context(|| format!("failed to load examples from {}", path.display()))?;
    let loaded = examples.len();
    let kept = filter_by_text_length(examples, max_chars);
    info!(path = %path.display(), loaded, kept = kept.len(), "loaded examples");
    Ok(kept)
}

fn prepare(
    args: &ExperimentArgs,
    decoding: Option<&DecodingArgs>,
    self_verification: bool,
) -> Result<Prepared> {
    let config = build_config(args, decoding, self_verification);
    config.validate().context("invalid experiment configuration")?;

    let labels = match (&args.label_map, config.domain) {
        (Some(path), _) => load_label_map(path)
            .with_context(|| format!("failed to load label map {}", path.display()))?,
        (None, Domain::General) => LabelMap::wikiner(),
        (None, domain) => bail!("--label-map is required for the {domain} domain"),
    };

    let template = match &args.template {
        Some(path) => PromptTemplate::from_json_file(path)?,
        None => PromptTemplate::builtin(config.language, config.prompt_style)?,
    };

    let train = load_split(&args.train, config.max_text_chars)?;
    let mut rng = StdRng::seed_from_u64(config.seed_acquisition);
    let pool = subsample(&train, config.training_size, &mut rng)
        .context("cannot draw the training subset")?;

    let queries = if config.test_on_test_set {
        let Some(test) = &args.test else {
            bail!("--test-on-test-set needs --test");
        };
        load_split(test, config.max_text_chars)?
    } else {
        pool.clone()
    };

    Ok(Prepared {
        config,
        template,
        labels,
        pool,
        queries,
    })
}

fn open_cache(args: &ExperimentArgs) -> Result<Option<PromptCache>> {
    args.cache_dir
        .as_ref()
        .map(|dir| {
            PromptCache::open(dir)
                .with_context(|| format!("failed to open prompt cache {}", dir.display()))
        })
        .transpose()
}

fn generator(args: &GeneratorArgs, model_name: &str) -> Result<Box<dyn Generator>> {
    match (&args.generator_command, &args.completions) {
        (Some(command), _) => Ok(Box::new(CommandGenerator::shell(command, model_name))),
        (None, Some(path)) => {
            let replay = ReplayGenerator::from_jsonl(path)
                .with_context(|| format!("failed to load completions {}", path.display()))?;
            info!(completions = replay.len(), "replaying recorded completions");
            Ok(Box::new(replay))
        }
        (None, None) => bail!("one of --generator-command or --completions is required"),
    }
}

pub fn evaluate(args: EvaluateArgs) -> Result<()> {
    let prepared = prepare(&args.experiment, Some(&args.decoding), args.self_verification)?;
    let cache = open_cache(&args.experiment)?;
    let mut generator = generator(&args.generator, &prepared.config.model_name)?;

    let mut experiment = Experiment::new(&prepared.config, &prepared.template, &prepared.labels)?;
    if let Some(cache) = &cache {
        experiment = experiment.with_cache(cache, args.experiment.overwrite_cache);
    }
    let outcome = experiment.run(&mut generator, &prepared.pool, &prepared.queries)?;

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;
    let mut log = RunLog::create(&args.output_dir, &Local::now()).context("failed to create run log")?;
    log.write_config(&prepared.config)?;
    for (i, query) in outcome.queries.iter().enumerate() {
        log.write_example(query, &outcome.records(i))?;
    }
    log.write_summary(&outcome.board)?;
    let summary = RunSummary::new(&prepared.config, outcome.queries.len(), &outcome.board);
    let results = log.write_results(&summary)?;
    let log_path = log.finish()?;

    print_board(&outcome.board);
    println!("log: {}", log_path.display());
    println!("results: {}", results.display());
    Ok(())
}

/// One exported prompt.
#[derive(Debug, Serialize)]
struct PromptLine<'a> {
    tag: EntityTag,
    example_id: &'a str,
    prompt: &'a str,
}

pub fn prompts(args: PromptsArgs) -> Result<()> {
    let prepared = prepare(&args.experiment, None, false)?;
    let cache = open_cache(&args.experiment)?;
    let mut experiment = Experiment::new(&prepared.config, &prepared.template, &prepared.labels)?;
    if let Some(cache) = &cache {
        experiment = experiment.with_cache(cache, args.experiment.overwrite_cache);
    }

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);

    let mut written = 0;
    for &tag in &prepared.config.tags {
        for prompt in experiment.build_prompts(tag, &prepared.pool, &prepared.queries)? {
            let line = PromptLine {
                tag,
                example_id: &prompt.example_id,
                prompt: &prompt.prompt,
            };
            serde_json::to_writer(&mut out, &line)?;
            writeln!(out)?;
            written += 1;
        }
    }
    out.flush()?;
    info!(prompts = written, "exported prompts");
    Ok(())
}

/// One line of a `score` input file.
#[derive(Debug, Deserialize)]
struct ScoreLine {
    tag: EntityTag,
    gold: String,
    predicted: String,
}

pub fn score_file(args: ScoreArgs) -> Result<()> {
    let board = score_lines(&args.input, &Markers::new(args.begin_tag, args.end_tag))?;
    print_board(&board);
    Ok(())
}

fn score_lines(path: &Path, markers: &Markers) -> Result<ScoreBoard> {
    let extractor = MentionExtractor::new(markers)?;
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut board = ScoreBoard::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: ScoreLine = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid score line", path.display(), i + 1))?;
        board.record(entry.tag, score(&entry.gold, &entry.predicted, &extractor));
    }
    Ok(board)
}

fn print_board(board: &ScoreBoard) {
    for report in board.reports() {
        println!("{}: {}", report.tag, report.metrics);
    }
    println!("overall: {}", board.micro());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        experiment: ExperimentArgs,
    }

    #[test]
    fn test_default_config() {
        let harness = Harness::parse_from(["fewshot-ner", "--train", "train.jsonl"]);
        let config = build_config(&harness.experiment, None, false);
        assert_eq!(config.tags, Domain::General.tags().to_vec());
        assert_eq!(config.language, Language::Fr);
        assert_eq!(config.criterion, Criterion::MostOccurrences);
        assert_eq!(config.training_size, 70);
        assert_eq!(config.seed_prompt, 42);
        config.validate().unwrap();
    }

    #[test]
    fn test_clinical_flags() {
        let harness = Harness::parse_from([
            "fewshot-ner",
            "--train",
            "train.jsonl",
            "--domain",
            "clinical",
            "--ner-tag",
            "DISO",
            "--ner-tag",
            "anat",
            "--criterion",
            "closest_tf_idf",
            "-s",
            "10",
            "-t",
        ]);
        let config = build_config(&harness.experiment, None, true);
        assert_eq!(config.tags, vec![EntityTag::Diso, EntityTag::Anat]);
        assert_eq!(config.criterion, Criterion::ClosestTfIdf);
        assert_eq!(config.training_size, 10);
        assert!(config.test_on_test_set);
        assert!(config.self_verification);
    }

    #[test]
    fn test_clinical_needs_label_map() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train.jsonl");
        fs::write(&train, "{\"tokens\": [\"fièvre\"], \"labels\": [1]}\n").unwrap();
        let harness = Harness::parse_from([
            "fewshot-ner",
            "--train",
            train.to_str().unwrap(),
            "--domain",
            "clinical",
        ]);
        let err = prepare(&harness.experiment, None, false).err().unwrap();
        assert!(err.to_string().contains("--label-map"));
    }

    #[test]
    fn test_training_subset_and_queries() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train.jsonl");
        let lines: Vec<String> = (0..6)
            .map(|i| format!("{{\"id\": \"t{i}\", \"tokens\": [\"Paris\", \"{i}\"], \"labels\": [1, 0]}}"))
            .collect();
        fs::write(&train, lines.join("\n")).unwrap();
        let harness = Harness::parse_from([
            "fewshot-ner",
            "--train",
            train.to_str().unwrap(),
            "-s",
            "4",
        ]);
        let prepared = prepare(&harness.experiment, None, false).unwrap();
        assert_eq!(prepared.pool.len(), 4);
        assert_eq!(prepared.queries, prepared.pool);

        let too_big = Harness::parse_from([
            "fewshot-ner",
            "--train",
            train.to_str().unwrap(),
            "-s",
            "7",
        ]);
        assert!(prepare(&too_big.experiment, None, false).is_err());
    }

    #[test]
    fn test_score_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.jsonl");
        fs::write(
            &path,
            concat!(
                "{\"tag\": \"PER\", \"gold\": \"@@Jean## habite Paris\", \"predicted\": \"@@Jean## habite @@Paris##\"}\n",
                "\n",
                "{\"tag\": \"LOC\", \"gold\": \"Jean habite @@Paris##\", \"predicted\": \"Jean habite Paris\"}\n",
            ),
        )
        .unwrap();
        let board = score_lines(&path, &Markers::default()).unwrap();
        let per = board.scorer(EntityTag::Per).unwrap().totals();
        assert_eq!((per.true_positives, per.relevant, per.retrieved), (1, 1, 2));
        let loc = board.scorer(EntityTag::Loc).unwrap().totals();
        assert_eq!((loc.true_positives, loc.relevant, loc.retrieved), (0, 1, 0));
    }
}
