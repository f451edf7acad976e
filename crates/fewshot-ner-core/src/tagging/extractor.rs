//! Mention extractor: recovers the text between begin/end markers.

use regex::Regex;

use super::{Markers, TaggingResult};

/// Compiled matcher for one pair of markers.
#[derive(Debug, Clone)]
pub struct MentionExtractor {
    pattern: Regex,
}

impl MentionExtractor {
    /// Compile a non-greedy `begin(.+?)end` pattern with both markers escaped.
    pub fn new(markers: &Markers) -> TaggingResult<Self> {
        let pattern = format!(
            "{}(.+?){}",
            regex::escape(&markers.begin),
            regex::escape(&markers.end)
        );
        Ok(Self {
            pattern: Regex::new(&pattern)?,
        })
    }

    /// Mentions in order of appearance. Duplicates are kept; an unmatched
    /// begin marker yields nothing.
    pub fn extract(&self, text: &str) -> Vec<String> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// One-off extraction; compiles the pattern on every call.
pub fn extract(text: &str, markers: &Markers) -> TaggingResult<Vec<String>> {
    Ok(MentionExtractor::new(markers)?.extract(text))
}
