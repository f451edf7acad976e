//! Entity tags, domains, prompt languages and label id mappings.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ModelError, ModelResult};

/// Entity types evaluated by the experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityTag {
    Per,
    Loc,
    Org,
    Fac,
    Diso,
    Anat,
    Proc,
    Livb,
}

impl EntityTag {
    pub const ALL: [EntityTag; 8] = [
        EntityTag::Per,
        EntityTag::Loc,
        EntityTag::Org,
        EntityTag::Fac,
        EntityTag::Diso,
        EntityTag::Anat,
        EntityTag::Proc,
        EntityTag::Livb,
    ];

    /// Canonical upper-case name, as found in label maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityTag::Per => "PER",
            EntityTag::Loc => "LOC",
            EntityTag::Org => "ORG",
            EntityTag::Fac => "FAC",
            EntityTag::Diso => "DISO",
            EntityTag::Anat => "ANAT",
            EntityTag::Proc => "PROC",
            EntityTag::Livb => "LIVB",
        }
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityTag {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        EntityTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == upper)
            .ok_or_else(|| ModelError::UnknownTag(s.to_string()))
    }
}

/// Text domain of a dataset; decides which tags are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    General,
    Clinical,
}

impl Domain {
    /// Tags annotated in datasets of this domain.
    pub fn tags(&self) -> &'static [EntityTag] {
        match self {
            Domain::General => &[EntityTag::Per, EntityTag::Loc, EntityTag::Org, EntityTag::Fac],
            Domain::Clinical => &[
                EntityTag::Diso,
                EntityTag::Anat,
                EntityTag::Proc,
                EntityTag::Livb,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::General => "general",
            Domain::Clinical => "clinical",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(Domain::General),
            "clinical" => Ok(Domain::Clinical),
            _ => Err(ModelError::UnknownDomain(s.to_string())),
        }
    }
}

/// Language of the dataset and of the prompt wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fr,
    Es,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Es => "es",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "fr" | "french" => Ok(Language::Fr),
            "es" | "spanish" => Ok(Language::Es),
            _ => Err(ModelError::UnknownLanguage(s.to_string())),
        }
    }
}

/// Framing of the prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptStyle {
    /// "I am an excellent linguist..." completion framing.
    Plain,
    /// USER / ASSISTANT dialogue framing for chat-tuned models.
    ChatAssistant,
}

impl PromptStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptStyle::Plain => "plain",
            PromptStyle::ChatAssistant => "chat-assistant",
        }
    }
}

impl fmt::Display for PromptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptStyle {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(PromptStyle::Plain),
            "chat-assistant" | "chat_assistant" | "vicuna_assistant" => {
                Ok(PromptStyle::ChatAssistant)
            }
            _ => Err(ModelError::UnknownPromptStyle(s.to_string())),
        }
    }
}

/// Bidirectional mapping between label ids and label names.
///
/// Id 0 conventionally means "no entity". The mapping is supplied by the
/// caller; nothing here infers it from data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    names: BTreeMap<u32, String>,
    ids: HashMap<String, u32>,
}

impl LabelMap {
    /// Build a map from `(id, name)` pairs. Ids and names must both be unique.
    pub fn new<I, S>(pairs: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        let mut names = BTreeMap::new();
        let mut ids = HashMap::new();
        for (id, name) in pairs {
            let name = name.into();
            if names.contains_key(&id) {
                return Err(ModelError::DuplicateLabelId(id));
            }
            if ids.insert(name.clone(), id).is_some() {
                return Err(ModelError::DuplicateLabel(name));
            }
            names.insert(id, name);
        }
        Ok(Self { names, ids })
    }

    /// Tag map of the WikiNER datasets.
    pub fn wikiner() -> Self {
        let names: BTreeMap<u32, String> = [(0, "O"), (1, "LOC"), (2, "PER"), (3, "FAC"), (4, "ORG")]
            .into_iter()
            .map(|(id, name)| (id, name.to_string()))
            .collect();
        let ids = names.iter().map(|(id, name)| (name.clone(), *id)).collect();
        Self { names, ids }
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn id(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Label id carried by tokens of `tag`.
    pub fn id_for_tag(&self, tag: EntityTag) -> ModelResult<u32> {
        self.id(tag.as_str())
            .ok_or_else(|| ModelError::UnmappedTag(tag.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names.iter().map(|(id, name)| (*id, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
