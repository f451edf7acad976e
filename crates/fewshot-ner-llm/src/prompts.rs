//! NER prompt templates and prompt construction.
//!
//! A prompt is laid out as:
//!
//! ```text
//! <first sentence: task framing for the tag>
//! <input intro><demo sentence>
//! <output intro><demo sentence with markers>
//! ...                                         (one pair per few-shot example)
//! <last sentence: marker instructions>        (omitted when empty)
//! <input intro><query sentence>
//! <output intro>
//! ```
//!
//! Template strings use named placeholders (`{job}`, `{tags}`, `{description}`,
//! `{begin}`, `{end}`, `{sentence}`, `{word}`, `{tag}`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fewshot_ner_core::{Domain, EntityTag, Language, Markers, PromptStyle};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prompt template errors.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("prompt template is missing field '{0}'")]
    MissingTemplateField(&'static str),

    #[error("prompt template field '{field}' lacks placeholder {{{placeholder}}}")]
    MissingPlaceholder {
        field: &'static str,
        placeholder: &'static str,
    },

    #[error("prompt template has no texts for tag {0}")]
    MissingTagTexts(EntityTag),

    #[error("no built-in {style} prompt template for language {language}")]
    UnsupportedStyle {
        language: Language,
        style: PromptStyle,
    },

    #[error("failed to read prompt template '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse prompt template '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type PromptResult<T> = Result<T, PromptError>;

/// Wording used for one entity tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagTexts {
    /// Plural name, e.g. "person names"
    pub plural: String,
    /// Singular description, e.g. "a person's name"
    pub singular: String,
    /// Sentence describing what counts as a mention
    pub description: String,
}

/// Job title the model impersonates, per domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainJobs {
    pub general: String,
    pub clinical: String,
}

impl DomainJobs {
    pub fn get(&self, domain: Domain) -> &str {
        match domain {
            Domain::General => &self.general,
            Domain::Clinical => &self.clinical,
        }
    }
}

/// Every text slot needed to build NER and self-verification prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Placeholders: `{job}`, `{tags}`, `{description}`
    pub first_sentence: String,
    /// Placeholders: `{tags}`, `{begin}`, `{end}`. May be empty.
    #[serde(default)]
    pub last_sentence: String,
    pub domain_jobs: DomainJobs,
    pub tags: BTreeMap<EntityTag, TagTexts>,
    pub input_intro: String,
    pub output_intro: String,
    /// Placeholders: `{job}`, `{tags}`
    pub self_verification_first_sentence: String,
    /// Placeholders: `{sentence}`, `{word}`, `{tag}`
    pub self_verification_question: String,
    pub yes: String,
    pub no: String,
}

/// A few-shot example as shown in the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demonstration {
    pub text: String,
    pub tagged: String,
}

/// Replace `{name}` placeholders.
/// Replace `{name}` placeholders in one left-to-right pass. Substituted text
/// is never scanned again; unknown names are kept verbatim.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn require(field: &'static str, value: &str) -> PromptResult<()> {
    if value.trim().is_empty() {
        Err(PromptError::MissingTemplateField(field))
    } else {
        Ok(())
    }
}

fn require_placeholder(field: &'static str, value: &str, placeholder: &'static str) -> PromptResult<()> {
    if value.contains(&format!("{{{placeholder}}}")) {
        Ok(())
    } else {
        Err(PromptError::MissingPlaceholder { field, placeholder })
    }
}

impl PromptTemplate {
    /// Built-in template for a language and style.
    pub fn builtin(language: Language, style: PromptStyle) -> PromptResult<Self> {
        match (language, style) {
            (Language::En, PromptStyle::Plain) => Ok(english()),
            (Language::Fr, PromptStyle::Plain) => Ok(french()),
            (Language::Es, PromptStyle::Plain) => Ok(spanish()),
            (Language::En, PromptStyle::ChatAssistant) => Ok(chat_assistant()),
            (language, style) => Err(PromptError::UnsupportedStyle { language, style }),
        }
    }

    /// Load a custom template from a JSON file.
    pub fn from_json_file(path: &Path) -> PromptResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| PromptError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check that every slot needed for `domain` is filled in.
    pub fn validate(&self, domain: Domain) -> PromptResult<()> {
        require("first_sentence", &self.first_sentence)?;
        require_placeholder("first_sentence", &self.first_sentence, "tags")?;
        if !self.last_sentence.is_empty() {
            require_placeholder("last_sentence", &self.last_sentence, "begin")?;
            require_placeholder("last_sentence", &self.last_sentence, "end")?;
        }
        require("domain_jobs", self.domain_jobs.get(domain))?;
        require("input_intro", &self.input_intro)?;
        require("output_intro", &self.output_intro)?;
        require(
            "self_verification_first_sentence",
            &self.self_verification_first_sentence,
        )?;
        require("self_verification_question", &self.self_verification_question)?;
        require_placeholder(
            "self_verification_question",
            &self.self_verification_question,
            "sentence",
        )?;
        require_placeholder(
            "self_verification_question",
            &self.self_verification_question,
            "word",
        )?;
        require("yes", &self.yes)?;
        require("no", &self.no)?;

        for &tag in domain.tags() {
            let texts = self.tag_texts(tag)?;
            if texts.plural.trim().is_empty()
                || texts.singular.trim().is_empty()
                || texts.description.trim().is_empty()
            {
                return Err(PromptError::MissingTagTexts(tag));
            }
        }
        Ok(())
    }

    pub fn tag_texts(&self, tag: EntityTag) -> PromptResult<&TagTexts> {
        self.tags.get(&tag).ok_or(PromptError::MissingTagTexts(tag))
    }

    /// Task framing sentence for `tag`.
    pub fn header(&self, domain: Domain, tag: EntityTag) -> PromptResult<String> {
        let texts = self.tag_texts(tag)?;
        Ok(fill(
            &self.first_sentence,
            &[
                ("job", self.domain_jobs.get(domain)),
                ("tags", &texts.plural),
                ("description", &texts.description),
            ],
        ))
    }

    /// Marker instructions placed before the query.
    pub fn instruction(&self, tag: EntityTag, markers: &Markers) -> PromptResult<String> {
        let texts = self.tag_texts(tag)?;
        Ok(fill(
            &self.last_sentence,
            &[
                ("tags", &texts.plural),
                ("begin", &markers.begin),
                ("end", &markers.end),
            ],
        ))
    }

    /// Framing sentence of a self-verification prompt.
    pub fn verification_header(&self, domain: Domain, tag: EntityTag) -> PromptResult<String> {
        let texts = self.tag_texts(tag)?;
        Ok(fill(
            &self.self_verification_first_sentence,
            &[
                ("job", self.domain_jobs.get(domain)),
                ("tags", &texts.plural),
            ],
        ))
    }

    /// Yes/no question about `word` in `sentence`.
    pub fn verification_question(
        &self,
        tag: EntityTag,
        sentence: &str,
        word: &str,
    ) -> PromptResult<String> {
        let texts = self.tag_texts(tag)?;
        Ok(fill(
            &self.self_verification_question,
            &[("word", word), ("tag", &texts.singular), ("sentence", sentence)],
        ))
    }
}

/// Build the full few-shot prompt for one query sentence.
pub fn build_prompt(
    template: &PromptTemplate,
    domain: Domain,
    tag: EntityTag,
    markers: &Markers,
    demonstrations: &[Demonstration],
    query: &str,
) -> PromptResult<String> {
    let mut prompt = template.header(domain, tag)?;

    for demo in demonstrations {
        prompt.push_str(&template.input_intro);
        prompt.push_str(&demo.text);
        prompt.push('\n');
        prompt.push_str(&template.output_intro);
        prompt.push_str(&demo.tagged);
        prompt.push('\n');
    }

    prompt.push_str(&template.instruction(tag, markers)?);
    prompt.push_str(&template.input_intro);
    prompt.push_str(query);
    prompt.push('\n');
    prompt.push_str(&template.output_intro);

    Ok(prompt)
}

fn tag_table(rows: [(EntityTag, &str, &str, &str); 8]) -> BTreeMap<EntityTag, TagTexts> {
    rows.into_iter()
        .map(|(tag, plural, singular, description)| {
            (
                tag,
                TagTexts {
                    plural: plural.into(),
                    singular: singular.into(),
                    description: description.into(),
                },
            )
        })
        .collect()
}

fn english_tags() -> BTreeMap<EntityTag, TagTexts> {
    tag_table([
        (EntityTag::Per, "person names", "a person's name",
            "These are words that refer to the name of a real or fictional person."),
        (EntityTag::Diso, "disorders", "an alteration of the functions of the body",
            "These are words that refer to an alteration or abnormality of the functions or health of the body."),
        (EntityTag::Loc, "places", "a place",
            "These are words that refer to the name of a place."),
        (EntityTag::Org, "organizations", "an organization",
            "These are words that refer to the name of an organization."),
        (EntityTag::Anat, "parts of the body", "a part of the body",
            "These are words that refer to a part of the human body."),
        (EntityTag::Livb, "living beings", "a living being",
            "These are words that refer to a living being."),
        (EntityTag::Proc, "procedures", "a procedure",
            "These are words that refer to a medical procedure."),
        (EntityTag::Fac, "facilities", "a facility",
            "These are words that refer to a facility made by humans."),
    ])
}

fn english() -> PromptTemplate {
    PromptTemplate {
        first_sentence: "I am an excellent {job}. The task is to label all mentions of {tags} in a sentence. {description} I can also put them in a specific format. Here are some examples of sentences I can handle:\n".into(),
        last_sentence: "Imitate me. Identify all the mentions of {tags} in the following sentence, by putting \"{begin}\" in front and a \"{end}\" behind each of them.\n".into(),
        domain_jobs: DomainJobs {
            general: "linguist".into(),
            clinical: "clinician".into(),
        },
        tags: english_tags(),
        input_intro: "Input: ".into(),
        output_intro: "Output: ".into(),
        self_verification_first_sentence: "I am an excellent {job}. The task is to verify whether a given word is a mention of {tags}. Below some examples :\n".into(),
        self_verification_question: "In the sentence \"{sentence}\", is \"{word}\" {tag}?\n".into(),
        yes: "Yes".into(),
        no: "No".into(),
    }
}

fn chat_assistant() -> PromptTemplate {
    PromptTemplate {
        first_sentence: "A chat between a curious {job} and an artificial intelligence assistant. The assistant can label all mentions of {tags} in a sentence. {description} It can also put them in a specific format. Here are some examples of sentences it can handle:\n".into(),
        last_sentence: String::new(),
        domain_jobs: DomainJobs {
            general: "linguist".into(),
            clinical: "clinician".into(),
        },
        tags: english_tags(),
        input_intro: "USER : ".into(),
        output_intro: "ASSISTANT : ".into(),
        self_verification_first_sentence: "A chat between a curious {job} and an artificial intelligence assistant. The assistant can verify whether a given word is a mention of {tags}. Below some examples :\n".into(),
        self_verification_question: "USER : In the sentence \"{sentence}\", is \"{word}\" {tag}?\n".into(),
        yes: "ASSISTANT : Yes".into(),
        no: "ASSISTANT : No".into(),
    }
}

fn french() -> PromptTemplate {
    PromptTemplate {
        first_sentence: "Je suis un {job} expert, je sais identifier les mentions des {tags} dans une phrase. {description} Je peux aussi les mettre en forme. Voici quelques exemples de phrases que je peux traiter :\n".into(),
        last_sentence: "Imite-moi. Identifie les mentions de {tags} dans la phrase suivante, en mettant \"{begin}\" devant et un \"{end}\" derrière la mention dans la phrase suivante.\n".into(),
        domain_jobs: DomainJobs {
            general: "linguiste".into(),
            clinical: "clinicien".into(),
        },
        tags: tag_table([
            (EntityTag::Per, "noms de personnes", "un nom de personne",
                "Il s'agit des mots faisant mention du nom d'une personne qu'elle soit réelle ou fictive."),
            (EntityTag::Diso, "maladies et symptômes", "une altération des fonctions du corps",
                "Il s'agit des mots faisant mention d'une altération ou une anormalité des fonctions ou de la santé du corps."),
            (EntityTag::Loc, "lieux", "un lieu",
                "Il s'agit des mots faisant mention du nom d'un lieu."),
            (EntityTag::Org, "organisations", "une organisation",
                "Il s'agit des mots faisant mention du nom d'une organisation."),
            (EntityTag::Anat, "parties du corps", "une partie du corps",
                "Il s'agit des mots faisant mention d'une partie du corps humain."),
            (EntityTag::Livb, "êtres vivants", "un être vivant",
                "Il s'agit des mots faisant mention d'un être vivant."),
            (EntityTag::Proc, "procédures médicales", "une procédure médicale",
                "Il s'agit des mots faisant mention d'une procédure médicale."),
            (EntityTag::Fac, "installations", "une installation",
                "Il s'agit des mots faisant mention d'une installation faite/construite par les humains."),
        ]),
        input_intro: "Entrée : ".into(),
        output_intro: "Sortie : ".into(),
        self_verification_first_sentence: "Je suis un {job} expert, je sais identifier si un mot est une mention des {tags} dans une phrase. Voici quelques exemples de phrases que je peux traiter :\n".into(),
        self_verification_question: "Dans la phrase \"{sentence}\", le mot \"{word}\" désigne-t-il {tag} ?\n".into(),
        yes: "Oui".into(),
        no: "Non".into(),
    }
}

fn spanish() -> PromptTemplate {
    PromptTemplate {
        first_sentence: "Soy un {job} experto, sé identificar las menciones de {tags} en una frase. {description} También puedo ponerlas en un formato específico. Aquí hay algunos ejemplos de frases que puedo tratar:\n".into(),
        last_sentence: "Imítame. Identifica las menciones de {tags} en la frase siguiente, poniendo \"{begin}\" delante y un \"{end}\" detrás de cada mención.\n".into(),
        domain_jobs: DomainJobs {
            general: "lingüista".into(),
            clinical: "clínico".into(),
        },
        tags: tag_table([
            (EntityTag::Per, "nombres de personas", "un nombre de persona",
                "Se trata de palabras que mencionan el nombre de una persona, real o ficticia."),
            (EntityTag::Diso, "enfermedades y síntomas", "una alteración de las funciones del cuerpo",
                "Se trata de palabras que mencionan una alteración o anomalía de las funciones o de la salud del cuerpo."),
            (EntityTag::Loc, "lugares", "un lugar",
                "Se trata de palabras que mencionan el nombre de un lugar."),
            (EntityTag::Org, "organizaciones", "una organización",
                "Se trata de palabras que mencionan el nombre de una organización."),
            (EntityTag::Anat, "partes del cuerpo", "una parte del cuerpo",
                "Se trata de palabras que mencionan una parte del cuerpo humano."),
            (EntityTag::Livb, "seres vivos", "un ser vivo",
                "Se trata de palabras que mencionan un ser vivo."),
            (EntityTag::Proc, "procedimientos médicos", "un procedimiento médico",
                "Se trata de palabras que mencionan un procedimiento médico."),
            (EntityTag::Fac, "instalaciones", "una instalación",
                "Se trata de palabras que mencionan una instalación hecha o construida por los humanos."),
        ]),
        input_intro: "Entrada: ".into(),
        output_intro: "Salida: ".into(),
        self_verification_first_sentence: "Soy un {job} experto, sé identificar si una palabra es una mención de {tags} en una frase. Aquí hay algunos ejemplos:\n".into(),
        self_verification_question: "En la frase \"{sentence}\", ¿la palabra \"{word}\" designa {tag}?\n".into(),
        yes: "Sí".into(),
        no: "No".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> Demonstration {
        Demonstration {
            text: "Jacques Chirac est né à Paris .".into(),
            tagged: "@@Jacques Chirac## est né à Paris .".into(),
        }
    }

    #[test]
    fn test_builtins_validate() {
        for (language, style) in [
            (Language::En, PromptStyle::Plain),
            (Language::Fr, PromptStyle::Plain),
            (Language::Es, PromptStyle::Plain),
            (Language::En, PromptStyle::ChatAssistant),
        ] {
            let template = PromptTemplate::builtin(language, style).unwrap();
            template.validate(Domain::General).unwrap();
            template.validate(Domain::Clinical).unwrap();
        }
    }

    #[test]
    fn test_unsupported_style() {
        assert!(matches!(
            PromptTemplate::builtin(Language::Fr, PromptStyle::ChatAssistant),
            Err(PromptError::UnsupportedStyle { .. })
        ));
    }

    #[test]
    fn test_french_prompt_layout() {
        let template = PromptTemplate::builtin(Language::Fr, PromptStyle::Plain).unwrap();
        let prompt = build_prompt(
            &template,
            Domain::General,
            EntityTag::Per,
            &Markers::default(),
            &[demo()],
            "Emmanuel Macron visite Lyon .",
        )
        .unwrap();

        assert!(prompt.starts_with("Je suis un linguiste expert, je sais identifier les mentions des noms de personnes"));
        assert!(prompt.contains("Entrée : Jacques Chirac est né à Paris .\nSortie : @@Jacques Chirac## est né à Paris .\n"));
        assert!(prompt.contains("en mettant \"@@\" devant et un \"##\" derrière"));
        assert!(prompt.ends_with("Entrée : Emmanuel Macron visite Lyon .\nSortie : "));
    }

    #[test]
    fn test_chat_prompt_skips_empty_instruction() {
        let template = PromptTemplate::builtin(Language::En, PromptStyle::ChatAssistant).unwrap();
        let prompt = build_prompt(
            &template,
            Domain::Clinical,
            EntityTag::Diso,
            &Markers::default(),
            &[],
            "The patient has a fever .",
        )
        .unwrap();
        assert!(prompt.starts_with("A chat between a curious clinician"));
        assert!(prompt.ends_with(
            "Here are some examples of sentences it can handle:\nUSER : The patient has a fever .\nASSISTANT : "
        ));
    }

    #[test]
    fn test_missing_tag_texts() {
        let mut template = PromptTemplate::builtin(Language::En, PromptStyle::Plain).unwrap();
        template.tags.remove(&EntityTag::Anat);
        template.validate(Domain::General).unwrap();
        assert!(matches!(
            template.validate(Domain::Clinical),
            Err(PromptError::MissingTagTexts(EntityTag::Anat))
        ));
    }

    #[test]
    fn test_missing_placeholder() {
        let mut template = PromptTemplate::builtin(Language::En, PromptStyle::Plain).unwrap();
        template.last_sentence = "Put markers around them.\n".into();
        assert!(matches!(
            template.validate(Domain::General),
            Err(PromptError::MissingPlaceholder {
                field: "last_sentence",
                placeholder: "begin"
            })
        ));
    }

    #[test]
    fn test_json_template_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        let mut value = serde_json::to_value(
            PromptTemplate::builtin(Language::Es, PromptStyle::Plain).unwrap(),
        )
        .unwrap();
        value.as_object_mut().unwrap().remove("output_intro");
        fs::write(&path, value.to_string()).unwrap();

        assert!(matches!(
            PromptTemplate::from_json_file(&path),
            Err(PromptError::Json { .. })
        ));
    }

    #[test]
    fn test_json_template_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        let template = PromptTemplate::builtin(Language::Es, PromptStyle::Plain).unwrap();
        fs::write(&path, serde_json::to_string(&template).unwrap()).unwrap();
        assert_eq!(PromptTemplate::from_json_file(&path).unwrap(), template);
    }

    #[test]
    fn test_verification_question() {
        let template = PromptTemplate::builtin(Language::En, PromptStyle::Plain).unwrap();
        let q = template
            .verification_question(EntityTag::Loc, "I live in Paris .", "Paris")
            .unwrap();
        assert_eq!(q, "In the sentence \"I live in Paris .\", is \"Paris\" a place?\n");
    }

    #[test]
    fn test_verification_question_keeps_braces_in_values() {
        let template = PromptTemplate::builtin(Language::En, PromptStyle::Plain).unwrap();
        let q = template
            .verification_question(EntityTag::Loc, "see {word} and {tag}", "{sentence} {tag}")
            .unwrap();
        assert_eq!(
            q,
            "In the sentence \"see {word} and {tag}\", is \"{sentence} {tag}\" a place?\n"
        );
    }

    #[test]
    fn test_fill_single_pass() {
        assert_eq!(
            fill("{a}-{b}-{c}", &[("a", "{b}"), ("b", "x")]),
            "{b}-x-{c}"
        );
        assert_eq!(fill("open { brace", &[("a", "x")]), "open { brace");
        assert_eq!(fill("{{a}}", &[("a", "x")]), "{x}");
    }
}
