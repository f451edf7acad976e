//! Span tagger: wraps maximal runs of a target label with markers.

use crate::models::{Example, ModelError, ModelResult};

use super::Markers;

/// Render `tokens` as one string, wrapping every maximal run of `target`
/// with the begin and end markers.
///
/// Tokens are joined by single spaces; the begin marker is glued to the first
/// token of a run and the end marker to the last one.
pub fn tag<S: AsRef<str>>(
    tokens: &[S],
    labels: &[u32],
    target: u32,
    markers: &Markers,
) -> ModelResult<String> {
    if tokens.len() != labels.len() {
        return Err(ModelError::LengthMismatch {
            id: String::new(),
            tokens: tokens.len(),
            labels: labels.len(),
        });
    }

    let mut out = String::new();
    let last = labels.len().saturating_sub(1);

    for (i, (token, &label)) in tokens.iter().zip(labels).enumerate() {
        let inside = label == target;
        if inside && (i == 0 || labels[i - 1] != target) {
            out.push_str(&markers.begin);
        }
        out.push_str(token.as_ref());
        if inside && (i == last || labels[i + 1] != target) {
            out.push_str(&markers.end);
        }
        out.push(' ');
    }

    out.truncate(out.trim_end().len());
    Ok(out)
}

impl Example {
    /// Tagged rendering of this example for `target`.
    pub fn tagged(&self, target: u32, markers: &Markers) -> String {
        // Lengths are validated in `Example::new`.
        tag(self.tokens(), self.labels(), target, markers).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<&str> {
        s.split(' ').collect()
    }

    #[test]
    fn test_tag_runs() {
        let toks = tokens("Barack Obama est le président des États-Unis .");
        let labels = [2, 2, 0, 0, 0, 0, 1, 0];
        let markers = Markers::default();

        assert_eq!(
            tag(&toks, &labels, 2, &markers).unwrap(),
            "@@Barack Obama## est le président des États-Unis ."
        );
        assert_eq!(
            tag(&toks, &labels, 1, &markers).unwrap(),
            "Barack Obama est le président des @@États-Unis## ."
        );
    }

    #[test]
    fn test_tag_whole_sequence() {
        let toks = tokens("New York City");
        let out = tag(&toks, &[1, 1, 1], 1, &Markers::default()).unwrap();
        assert_eq!(out, "@@New York City##");
    }

    #[test]
    fn test_tag_no_target() {
        let toks = tokens("rien à signaler");
        let out = tag(&toks, &[0, 0, 0], 1, &Markers::default()).unwrap();
        assert_eq!(out, "rien à signaler");
    }

    #[test]
    fn test_tag_single_token_runs() {
        let toks = tokens("Paris Lyon et Nice");
        let out = tag(&toks, &[1, 1, 0, 1], 1, &Markers::new("<", ">")).unwrap();
        assert_eq!(out, "<Paris Lyon> et <Nice>");
    }

    #[test]
    fn test_tag_empty() {
        let toks: Vec<&str> = Vec::new();
        assert_eq!(tag(&toks, &[], 1, &Markers::default()).unwrap(), "");
    }

    #[test]
    fn test_tag_length_mismatch() {
        let toks = tokens("a b");
        assert!(matches!(
            tag(&toks, &[0], 1, &Markers::default()),
            Err(ModelError::LengthMismatch { tokens: 2, labels: 1, .. })
        ));
    }
}
