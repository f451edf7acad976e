//! TF-IDF vector space over token sequences.
//!
//! Tokens are atomic terms (no lowercasing, no sub-tokenisation). Weights use
//! raw term counts and smoothed idf, `ln((1 + n) / (1 + df)) + 1`, and every
//! vector is L2-normalised so the dot product is the cosine similarity.

use std::collections::HashMap;

/// Sparse, L2-normalised document vector.
pub type SparseVector<'a> = HashMap<&'a str, f64>;

/// Inverse document frequencies fitted on a document collection.
#[derive(Debug, Clone, Default)]
pub struct TfIdfSpace {
    idf: HashMap<String, f64>,
    documents: usize,
}

impl TfIdfSpace {
    /// Fit idf weights on `documents`.
    pub fn fit<'a, I, D>(documents: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: IntoIterator<Item = &'a str>,
    {
        let mut df: HashMap<String, usize> = HashMap::new();
        let mut n = 0;

        for doc in documents {
            n += 1;
            let mut seen: Vec<&str> = doc.into_iter().collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *df.entry(term.to_string()).or_insert(0) += 1;
            }
        }

        let idf = df
            .into_iter()
            .map(|(term, count)| {
                let weight = ((1.0 + n as f64) / (1.0 + count as f64)).ln() + 1.0;
                (term, weight)
            })
            .collect();

        Self { idf, documents: n }
    }

    /// Number of documents the space was fitted on.
    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    /// Weighted, normalised vector for `doc`. Terms unseen during fitting
    /// are dropped.
    pub fn vectorize<'a, I>(&self, doc: I) -> SparseVector<'a>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: HashMap<&'a str, f64> = HashMap::new();
        for term in doc {
            if self.idf.contains_key(term) {
                *counts.entry(term).or_insert(0.0) += 1.0;
            }
        }

        for (term, weight) in counts.iter_mut() {
            *weight *= self.idf[*term];
        }

        let norm = counts.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for weight in counts.values_mut() {
                *weight /= norm;
            }
        }
        counts
    }
}

/// Cosine similarity of two normalised vectors.
pub fn cosine(a: &SparseVector<'_>, b: &SparseVector<'_>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, wa)| large.get(term).map(|wb| wa * wb))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<Vec<&'static str>> {
        vec![
            vec!["le", "chat", "dort"],
            vec!["le", "chien", "dort"],
            vec!["Paris", "est", "grande"],
        ]
    }

    #[test]
    fn test_idf_smoothing() {
        let space = TfIdfSpace::fit(docs());
        assert_eq!(space.documents(), 3);
        // "le" appears in 2 of 3 documents
        let expected = (4.0_f64 / 3.0).ln() + 1.0;
        assert!((space.idf("le").unwrap() - expected).abs() < 1e-12);
        // "Paris" appears once
        let expected = (4.0_f64 / 2.0).ln() + 1.0;
        assert!((space.idf("Paris").unwrap() - expected).abs() < 1e-12);
        assert!(space.idf("paris").is_none());
    }

    #[test]
    fn test_vectors_are_normalised() {
        let space = TfIdfSpace::fit(docs());
        let v = space.vectorize(["le", "chat", "chat"]);
        let norm: f64 = v.values().map(|w| w * w).sum();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_ordering() {
        let space = TfIdfSpace::fit(docs());
        let query = space.vectorize(["le", "chat", "dort"]);
        let same = space.vectorize(["le", "chat", "dort"]);
        let close = space.vectorize(["le", "chien", "dort"]);
        let far = space.vectorize(["Paris", "est", "grande"]);

        assert!((cosine(&query, &same) - 1.0).abs() < 1e-12);
        assert!(cosine(&query, &close) > cosine(&query, &far));
        assert_eq!(cosine(&query, &far), 0.0);
    }

    #[test]
    fn test_empty_document() {
        let space = TfIdfSpace::fit(docs());
        let empty = space.vectorize(std::iter::empty());
        let query = space.vectorize(["le"]);
        assert!(empty.is_empty());
        assert_eq!(cosine(&query, &empty), 0.0);
    }
}
