//! `fewshot-ner`: few-shot NER prompting experiments from the command line.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{EvaluateArgs, PromptsArgs, ScoreArgs};

#[derive(Parser)]
#[command(name = "fewshot-ner", version)]
#[command(about = "Few-shot named entity recognition by prompting a language model", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[arg(long, short, global = true, help = "Show debug output")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Prompt the model for every tag and score its answers")]
    Evaluate(Box<EvaluateArgs>),

    #[command(about = "Export the prompts as JSONL for an external inference run")]
    Prompts(PromptsArgs),

    #[command(about = "Score tagged predictions against tagged gold sentences")]
    Score(ScoreArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "fewshot_ner=debug"
    } else {
        "fewshot_ner=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Evaluate(args) => commands::evaluate(*args),
        Commands::Prompts(args) => commands::prompts(args),
        Commands::Score(args) => commands::score_file(args),
    }
}
