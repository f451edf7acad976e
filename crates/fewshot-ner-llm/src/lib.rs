//! Language-model side of few-shot NER.
//!
//! Builds prompts from templates, hands them to an opaque [`Generator`],
//! optionally self-verifies the predicted mentions and scores the results.

pub mod experiment;
pub mod generation;
pub mod prompts;
pub mod verification;

pub use experiment::{Experiment, ExperimentError, ExperimentOutcome, ExperimentResult, TagRun};
pub use generation::{
    first_line, CommandGenerator, GenerationError, GenerationResult, Generator, MockGenerator,
    RecordedCompletion, ReplayGenerator,
};
pub use prompts::{build_prompt, Demonstration, PromptError, PromptResult, PromptTemplate, TagTexts};
pub use verification::{SelfVerifier, VerificationDemo, VerificationError};
