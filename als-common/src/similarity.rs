//! Item text similarity
//!
//! Bag-of-n-grams TF-IDF vectors (word unigrams and bigrams) compared by cosine
//! similarity. Vectors are fitted per call, so idf weights reflect only the texts
//! being compared (one subscale pool at a time).
//!
//! Weighting: raw term counts × smoothed idf `ln((1 + n) / (1 + df)) + 1`, then L2
//! normalization. Tokens are runs of two or more word characters, lowercased.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("token pattern is a valid regex"));

/// Symmetric pairwise similarity scores in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    size: usize,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }

    /// Build from explicit rows (used by tests and callers with their own metric)
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let size = rows.len();
        let values = rows.into_iter().flatten().collect::<Vec<_>>();
        debug_assert_eq!(values.len(), size * size);
        Self { size, values }
    }
}

/// Unigram and bigram terms of a text
fn terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = TOKEN_PATTERN.find_iter(&lowered).map(|m| m.as_str()).collect();

    let mut terms: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    terms.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

/// L2-normalized TF-IDF vectors, sparse as term-id → weight
fn tfidf_vectors(texts: &[&str]) -> Vec<HashMap<usize, f64>> {
    let mut vocabulary: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<HashMap<usize, f64>> = Vec::with_capacity(texts.len());

    for text in texts {
        let mut doc: HashMap<usize, f64> = HashMap::new();
        for term in terms(text) {
            let next_id = vocabulary.len();
            let id = *vocabulary.entry(term).or_insert(next_id);
            *doc.entry(id).or_insert(0.0) += 1.0;
        }
        counts.push(doc);
    }

    let mut document_frequency = vec![0usize; vocabulary.len()];
    for doc in &counts {
        for &id in doc.keys() {
            document_frequency[id] += 1;
        }
    }

    let n = texts.len() as f64;
    let idf: Vec<f64> = document_frequency
        .iter()
        .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
        .collect();

    counts
        .into_iter()
        .map(|doc| {
            let mut weighted: HashMap<usize, f64> =
                doc.into_iter().map(|(id, tf)| (id, tf * idf[id])).collect();
            let norm = weighted.values().map(|w| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                for w in weighted.values_mut() {
                    *w /= norm;
                }
            }
            weighted
        })
        .collect()
}

fn cosine(a: &HashMap<usize, f64>, b: &HashMap<usize, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(id, w)| large.get(id).map(|v| w * v))
        .sum()
}

/// Pairwise TF-IDF cosine similarity of `texts`
///
/// Texts without any token have similarity 0 to everything.
pub fn similarity_matrix(texts: &[&str]) -> SimilarityMatrix {
    let vectors = tfidf_vectors(texts);
    let size = vectors.len();
    let mut values = vec![0.0; size * size];

    for i in 0..size {
        for j in i..size {
            let sim = cosine(&vectors[i], &vectors[j]).clamp(0.0, 1.0);
            values[i * size + j] = sim;
            values[j * size + i] = sim;
        }
    }

    SimilarityMatrix { size, values }
}
