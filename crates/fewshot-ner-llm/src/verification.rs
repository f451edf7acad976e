//! Self-verification of predicted mentions.
//!
//! Each candidate mention is put back to the model as a yes/no question,
//! after demonstrations drawn from the same few-shot examples used to
//! predict it.

use std::collections::HashSet;

use fewshot_ner_core::{DecodingParams, Domain, EntityTag, Example};
use thiserror::Error;
use tracing::debug;

use crate::generation::{ensure_count, first_line, GenerationError, Generator};
use crate::prompts::{PromptError, PromptTemplate};

#[derive(Error, Debug)]
pub enum VerificationError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

pub type VerificationResult<T> = Result<T, VerificationError>;

/// A solved yes/no question shown before the real one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationDemo {
    pub sentence: String,
    pub word: String,
    pub answer: bool,
}

/// Demonstrations from few-shot examples: every gold mention of `target` is a
/// "yes", the first token outside any mention is a "no".
pub fn demonstrations<'a, I>(examples: I, target: u32) -> Vec<VerificationDemo>
where
    I: IntoIterator<Item = &'a Example>,
{
    let mut demos = Vec::new();
    for example in examples {
        let sentence = example.text();
        for mention in example.mentions(target) {
            demos.push(VerificationDemo {
                sentence: sentence.clone(),
                word: mention,
                answer: true,
            });
        }
        let negative = example
            .tokens()
            .iter()
            .zip(example.labels())
            .find(|(_, label)| **label != target);
        if let Some((token, _)) = negative {
            demos.push(VerificationDemo {
                sentence,
                word: token.clone(),
                answer: false,
            });
        }
    }
    demos
}

pub struct SelfVerifier<'a> {
    template: &'a PromptTemplate,
    domain: Domain,
}

impl<'a> SelfVerifier<'a> {
    pub fn new(template: &'a PromptTemplate, domain: Domain) -> Self {
        Self { template, domain }
    }

    pub fn prompt(
        &self,
        tag: EntityTag,
        demos: &[VerificationDemo],
        sentence: &str,
        word: &str,
    ) -> VerificationResult<String> {
        let mut prompt = self.template.verification_header(self.domain, tag)?;
        for demo in demos {
            prompt.push_str(
                &self
                    .template
                    .verification_question(tag, &demo.sentence, &demo.word)?,
            );
            prompt.push_str(if demo.answer {
                &self.template.yes
            } else {
                &self.template.no
            });
            prompt.push('\n');
        }
        prompt.push_str(&self.template.verification_question(tag, sentence, word)?);
        Ok(prompt)
    }

    /// Whether a completion answers "yes".
    pub fn is_confirmed(&self, completion: &str) -> bool {
        first_line(completion)
            .to_lowercase()
            .starts_with(&self.template.yes.to_lowercase())
    }

    /// Keep the candidates the model confirms, deduplicated in first-seen order.
    pub fn verify<G: Generator + ?Sized>(
        &self,
        generator: &mut G,
        params: &DecodingParams,
        tag: EntityTag,
        demos: &[VerificationDemo],
        sentence: &str,
        candidates: &[String],
    ) -> VerificationResult<Vec<String>> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = candidates.iter().filter(|c| seen.insert(*c)).collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let prompts = unique
            .iter()
            .map(|word| self.prompt(tag, demos, sentence, word))
            .collect::<VerificationResult<Vec<_>>>()?;
        let completions = generator.generate(&prompts, params)?;
        ensure_count(prompts.len(), &completions)?;

        let kept: Vec<String> = unique
            .into_iter()
            .zip(&completions)
            .filter(|(_, completion)| self.is_confirmed(completion))
            .map(|(word, _)| word.clone())
            .collect();
        debug!(%tag, candidates = prompts.len(), kept = kept.len(), "self-verification");
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::MockGenerator;
    use fewshot_ner_core::{Language, PromptStyle};

    fn example() -> Example {
        Example::new(
            "d0",
            vec!["Jean".into(), "habite".into(), "Paris".into()],
            vec![2, 0, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_demonstrations() {
        let ex = example();
        let demos = demonstrations([&ex], 1);
        assert_eq!(
            demos,
            vec![
                VerificationDemo {
                    sentence: "Jean habite Paris".into(),
                    word: "Paris".into(),
                    answer: true,
                },
                VerificationDemo {
                    sentence: "Jean habite Paris".into(),
                    word: "Jean".into(),
                    answer: false,
                },
            ]
        );
    }

    #[test]
    fn test_prompt_layout() {
        let template = PromptTemplate::builtin(Language::En, PromptStyle::Plain).unwrap();
        let verifier = SelfVerifier::new(&template, Domain::General);
        let ex = example();
        let prompt = verifier
            .prompt(EntityTag::Loc, &demonstrations([&ex], 1), "I saw Rome .", "Rome")
            .unwrap();
        assert!(prompt.contains("is \"Paris\" a place?\nYes\n"));
        assert!(prompt.contains("is \"Jean\" a place?\nNo\n"));
        assert!(prompt.ends_with("In the sentence \"I saw Rome .\", is \"Rome\" a place?\n"));
    }

    #[test]
    fn test_verify_keeps_confirmed() {
        let template = PromptTemplate::builtin(Language::Fr, PromptStyle::Plain).unwrap();
        let verifier = SelfVerifier::new(&template, Domain::General);
        let mut generator = MockGenerator::new()
            .with_rule("\"Lyon\"", " oui, bien sûr")
            .with_fallback("Non");

        let kept = verifier
            .verify(
                &mut generator,
                &DecodingParams::default(),
                EntityTag::Loc,
                &[],
                "Lyon et Nice",
                &["Lyon".into(), "Nice".into(), "Lyon".into()],
            )
            .unwrap();
        assert_eq!(kept, vec!["Lyon"]);
        assert_eq!(generator.prompts().len(), 2);
    }

    #[test]
    fn test_no_candidates_no_calls() {
        let template = PromptTemplate::builtin(Language::En, PromptStyle::Plain).unwrap();
        let verifier = SelfVerifier::new(&template, Domain::General);
        let mut generator = MockGenerator::new();
        let kept = verifier
            .verify(&mut generator, &DecodingParams::default(), EntityTag::Per, &[], "x", &[])
            .unwrap();
        assert!(kept.is_empty());
        assert!(generator.prompts().is_empty());
    }
}
