//! Loading, filtering and subsampling labeled datasets.
//!
//! Supported files:
//! - `.jsonl`: one record per line (blank lines skipped)
//! - `.json`: an array of records
//!
//! A record is `{"id": ..., "tokens": [...], "labels": [...]}`; `words` and
//! `ner_tags` are accepted as field aliases.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use rand::seq::index;
use rand::Rng;
use thiserror::Error;

use crate::models::{Example, LabelMap, ModelError, RawExample};

/// Dataset errors.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse '{path}' line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported dataset format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid example: {0}")]
    Model(#[from] ModelError),

    #[error("cannot sample {requested} examples from a pool of {available}")]
    SampleTooLarge { requested: usize, available: usize },
}

pub type DatasetResult<T> = Result<T, DatasetError>;

/// Load examples from a `.jsonl` or `.json` file.
pub fn load_examples(path: &Path) -> DatasetResult<Vec<Example>> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("example")
        .to_string();

    let raw = match path.extension().and_then(|ext| ext.to_str()) {
        Some("jsonl") => read_jsonl(path)?,
        Some("json") => read_json_array(path)?,
        _ => return Err(DatasetError::UnsupportedFormat(path.to_path_buf())),
    };

    let examples = raw
        .into_iter()
        .enumerate()
        .map(|(i, record)| record.into_example(|| format!("{stem}-{i}")))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(path = %path.display(), count = examples.len(), "loaded examples");
    Ok(examples)
}

fn read_jsonl(path: &Path) -> DatasetResult<Vec<RawExample>> {
    let file = fs::File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    for (line_num, line) in io::BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|source| DatasetError::Json {
            path: path.to_path_buf(),
            line: line_num + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

fn read_json_array(path: &Path) -> DatasetResult<Vec<RawExample>> {
    let content = read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        line: source.line(),
        source,
    })
}

fn read_to_string(path: &Path) -> DatasetResult<String> {
    fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a label map from a JSON object such as `{"0": "O", "1": "LOC"}`.
pub fn load_label_map(path: &Path) -> DatasetResult<LabelMap> {
    let content = read_to_string(path)?;
    let raw: BTreeMap<u32, String> =
        serde_json::from_str(&content).map_err(|source| DatasetError::Json {
            path: path.to_path_buf(),
            line: source.line(),
            source,
        })?;
    Ok(LabelMap::new(raw)?)
}

/// Keep examples whose text is strictly shorter than `max_chars` characters.
pub fn filter_by_text_length(examples: Vec<Example>, max_chars: usize) -> Vec<Example> {
    let before = examples.len();
    let kept: Vec<Example> = examples
        .into_iter()
        .filter(|e| e.text().chars().count() < max_chars)
        .collect();
    if kept.len() < before {
        tracing::debug!(dropped = before - kept.len(), max_chars, "filtered long examples");
    }
    kept
}

/// Draw `size` distinct examples without replacement.
pub fn subsample<R: Rng + ?Sized>(
    examples: &[Example],
    size: usize,
    rng: &mut R,
) -> DatasetResult<Vec<Example>> {
    if size > examples.len() {
        return Err(DatasetError::SampleTooLarge {
            requested: size,
            available: examples.len(),
        });
    }
    Ok(index::sample(rng, examples.len(), size)
        .into_iter()
        .map(|i| examples[i].clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "train.jsonl",
            "{\"id\":\"s1\",\"words\":[\"Paris\",\"brille\"],\"ner_tags\":[1,0]}\n\n{\"tokens\":[\"Lyon\"],\"labels\":[1]}\n",
        );
        let examples = load_examples(&path).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].id(), "s1");
        assert_eq!(examples[1].id(), "train-1");
    }

    #[test]
    fn test_load_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "test.json",
            r#"[{"words":["Madrid"],"ner_tags":[1]},{"words":["y"],"ner_tags":[0]}]"#,
        );
        let examples = load_examples(&path).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].id(), "test-0");
    }

    #[test]
    fn test_load_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "bad.jsonl",
            "{\"tokens\":[\"a\"],\"labels\":[0]}\nnot json\n",
        );
        match load_examples(&path) {
            Err(DatasetError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_load_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "m.jsonl", "{\"tokens\":[\"a\",\"b\"],\"labels\":[0]}\n");
        assert!(matches!(
            load_examples(&path),
            Err(DatasetError::Model(ModelError::LengthMismatch { .. }))
        ));
    }

    #[test]
    fn test_unsupported_format() {
        assert!(matches!(
            load_examples(Path::new("data.csv")),
            Err(DatasetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_label_map_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "labels.json", r#"{"0":"O","1":"DISO","2":"ANAT"}"#);
        let map = load_label_map(&path).unwrap();
        assert_eq!(map.id("ANAT"), Some(2));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_filter_by_text_length() {
        let short = Example::new("a", vec!["abc".into()], vec![0]).unwrap();
        let long = Example::new("b", vec!["abcdef".into()], vec![0]).unwrap();
        let kept = filter_by_text_length(vec![short, long], 6);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id(), "a");
    }

    #[test]
    fn test_subsample() {
        let pool: Vec<Example> = (0..10)
            .map(|i| Example::new(i.to_string(), vec!["x".into()], vec![0]).unwrap())
            .collect();

        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            subsample(&pool, 4, &mut rng)
                .unwrap()
                .iter()
                .map(|e| e.id().to_string())
                .collect::<Vec<_>>()
        };
        let first = draw(1);
        assert_eq!(first.len(), 4);
        assert_eq!(first, draw(1));

        let mut unique = first.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 4);

        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            subsample(&pool, 11, &mut rng),
            Err(DatasetError::SampleTooLarge {
                requested: 11,
                available: 10
            })
        ));
    }
}
