//! Language-model collaborators.
//!
//! The model is opaque: a [`Generator`] maps a batch of prompts to one
//! completion per prompt. Inference itself happens outside this crate, either
//! in a child process ([`CommandGenerator`]) or ahead of time
//! ([`ReplayGenerator`]).

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use fewshot_ner_core::cache::hash_data;
use fewshot_ner_core::DecodingParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Generation errors.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("failed to run generator command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode generator request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("generator I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("generator command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("generator returned {got} completions for {expected} prompts")]
    CountMismatch { expected: usize, got: usize },

    #[error("invalid generator output on line {line}: {source}")]
    InvalidOutput {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read completions '{path}' line {line}: {source}")]
    Completions {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("no recorded completion for prompt {0}")]
    MissingCompletion(String),
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Produces one completion per prompt.
pub trait Generator {
    fn generate(
        &mut self,
        prompts: &[String],
        params: &DecodingParams,
    ) -> GenerationResult<Vec<String>>;
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn generate(
        &mut self,
        prompts: &[String],
        params: &DecodingParams,
    ) -> GenerationResult<Vec<String>> {
        (**self).generate(prompts, params)
    }
}

/// First non-empty line of a completion, trimmed.
///
/// Models keep generating after the tagged sentence (often a new
/// `Input:` line); only the first line is the answer.
pub fn first_line(completion: &str) -> &str {
    completion
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

/// Check a generator honoured the one-completion-per-prompt contract.
pub fn ensure_count(expected: usize, completions: &[String]) -> GenerationResult<()> {
    if completions.len() == expected {
        Ok(())
    } else {
        Err(GenerationError::CountMismatch {
            expected,
            got: completions.len(),
        })
    }
}

/// One line sent to an external inference command.
#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    #[serde(flatten)]
    params: &'a DecodingParams,
}

/// Runs an external inference command once per batch.
///
/// Requests are written to stdin as JSON lines
/// (`{"prompt", "model", "temperature", ...}`); the command answers with one
/// JSON string per line on stdout, in order.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    model_name: String,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>, model_name: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            model_name: model_name.into(),
        }
    }

    /// Run `command_line` through `sh -c`.
    pub fn shell(command_line: &str, model_name: impl Into<String>) -> Self {
        Self::new("sh", vec!["-c".into(), command_line.into()], model_name)
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn encode(&self, prompts: &[String], params: &DecodingParams) -> GenerationResult<Vec<u8>> {
        let mut payload = Vec::new();
        for prompt in prompts {
            let request = GenerationRequest {
                prompt,
                model: &self.model_name,
                params,
            };
            serde_json::to_writer(&mut payload, &request)
                .map_err(GenerationError::Encode)?;
            payload.push(b'\n');
        }
        Ok(payload)
    }
}

fn parse_completions(stdout: &str) -> GenerationResult<Vec<String>> {
    stdout
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<String>(line)
                .map_err(|source| GenerationError::InvalidOutput { line: i + 1, source })
        })
        .collect()
}

impl Generator for CommandGenerator {
    fn generate(
        &mut self,
        prompts: &[String],
        params: &DecodingParams,
    ) -> GenerationResult<Vec<String>> {
        if prompts.is_empty() {
            return Ok(Vec::new());
        }
        let payload = self.encode(prompts, params)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| GenerationError::Spawn {
                command: self.command_line(),
                source,
            })?;

        // Feed stdin from another thread so a chatty child cannot fill its
        // stdout pipe while we are still writing.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("generator stdin unavailable"))?;
        let writer = thread::spawn(move || stdin.write_all(&payload));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .map_err(|_| io::Error::other("generator stdin writer panicked"))?;

        if !output.status.success() {
            return Err(GenerationError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;

        let completions = parse_completions(&String::from_utf8_lossy(&output.stdout))?;
        ensure_count(prompts.len(), &completions)?;
        debug!(prompts = prompts.len(), "generator command answered");
        Ok(completions)
    }
}

/// A prompt and the completion a model gave for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedCompletion {
    pub prompt: String,
    pub completion: String,
}

/// Serves completions recorded by an earlier inference run.
#[derive(Debug, Clone, Default)]
pub struct ReplayGenerator {
    completions: HashMap<String, String>,
}

impl ReplayGenerator {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = RecordedCompletion>,
    {
        let completions = records
            .into_iter()
            .map(|r| (hash_data(r.prompt.as_bytes()), r.completion))
            .collect();
        Self { completions }
    }

    /// Load `{"prompt", "completion"}` JSON lines.
    pub fn from_jsonl(path: &Path) -> GenerationResult<Self> {
        let content = fs::read_to_string(path)?;
        let mut records = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: RecordedCompletion =
                serde_json::from_str(line).map_err(|source| GenerationError::Completions {
                    path: path.to_path_buf(),
                    line: i + 1,
                    source,
                })?;
            records.push(record);
        }
        debug!(path = %path.display(), records = records.len(), "loaded recorded completions");
        Ok(Self::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.completions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completions.is_empty()
    }
}

impl Generator for ReplayGenerator {
    fn generate(
        &mut self,
        prompts: &[String],
        _params: &DecodingParams,
    ) -> GenerationResult<Vec<String>> {
        prompts
            .iter()
            .map(|prompt| {
                let digest = hash_data(prompt.as_bytes());
                self.completions
                    .get(&digest)
                    .cloned()
                    .ok_or(GenerationError::MissingCompletion(digest))
            })
            .collect()
    }
}

/// Mock generator for testing without a model.
///
/// Each rule pairs a needle with a completion; the first rule whose needle
/// occurs in the last two lines of a prompt answers it. Unmatched prompts get
/// the fallback completion.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    rules: Vec<(String, String)>,
    fallback: String,
    prompts: Vec<String>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, needle: impl Into<String>, completion: impl Into<String>) -> Self {
        self.rules.push((needle.into(), completion.into()));
        self
    }

    pub fn with_fallback(mut self, completion: impl Into<String>) -> Self {
        self.fallback = completion.into();
        self
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    fn answer(&self, prompt: &str) -> String {
        let tail: Vec<&str> = prompt.rsplitn(3, '\n').take(2).collect();
        self.rules
            .iter()
            .find(|(needle, _)| tail.iter().any(|line| line.contains(needle.as_str())))
            .map(|(_, completion)| completion.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Generator for MockGenerator {
    fn generate(
        &mut self,
        prompts: &[String],
        _params: &DecodingParams,
    ) -> GenerationResult<Vec<String>> {
        let completions = prompts.iter().map(|p| self.answer(p)).collect();
        self.prompts.extend(prompts.iter().cloned());
        Ok(completions)
    }
}
