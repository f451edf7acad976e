//! On-disk cache of generated prompts.
//!
//! One JSON file per key. The key covers the configuration fields that shape
//! prompt content; wording changes inside templates are not part of it, so a
//! stale cache has to be overwritten explicitly.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use md5::Md5;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{Domain, EntityTag, Language, PromptStyle};
use crate::selection::Criterion;
use crate::tagging::Markers;

/// Cache errors.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt cache entry '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Configuration fields that identify a set of prompts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PromptCacheKey {
    pub dataset_name: String,
    pub language: Language,
    pub prompt_style: PromptStyle,
    pub domain: Domain,
    pub tag: EntityTag,
    pub markers: Markers,
    pub n_few_shot: usize,
    pub criterion: Criterion,
}

impl PromptCacheKey {
    /// Hex MD5 of the concatenated key fields.
    pub fn digest(&self) -> String {
        let material = [
            self.dataset_name.as_str(),
            self.language.as_str(),
            self.prompt_style.as_str(),
            self.domain.as_str(),
            self.tag.as_str(),
            self.markers.begin.as_str(),
            self.markers.end.as_str(),
            &self.n_few_shot.to_string(),
            criterion_key(self.criterion),
        ]
        .concat();
        hex::encode(Md5::digest(material.as_bytes()))
    }
}

/// Criterion names as they appear in existing cache keys.
fn criterion_key(criterion: Criterion) -> &'static str {
    match criterion {
        Criterion::MostOccurrences => "most_occurences",
        other => other.as_str(),
    }
}

/// Hash arbitrary bytes to a hex SHA-256 string.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// A prompt built for one query example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPrompt {
    pub example_id: String,
    pub prompt: String,
}

/// Directory-backed prompt cache.
#[derive(Debug, Clone)]
pub struct PromptCache {
    dir: PathBuf,
}

impl PromptCache {
    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> CacheResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &PromptCacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }

    /// Cached prompts for `key`, or `None` if nothing was stored.
    pub fn load(&self, key: &PromptCacheKey) -> CacheResult<Option<Vec<CachedPrompt>>> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let prompts = serde_json::from_str(&content).map_err(|source| CacheError::Json {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "prompt cache hit");
        Ok(Some(prompts))
    }

    /// Store prompts for `key`, replacing any previous entry.
    pub fn store(&self, key: &PromptCacheKey, prompts: &[CachedPrompt]) -> CacheResult<()> {
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(prompts).map_err(|source| CacheError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| CacheError::Io { path, source })
    }
}
