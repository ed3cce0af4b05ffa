//! Hand-rolled TF-IDF vectorizer for the 49-dimensional description feature
//! block: unigrams + bigrams, token pattern `[a-z]{2,}`, `min_df=1`,
//! `max_df=0.95`, `max_features=49`. Small enough, and specific enough to
//! this fixed-width contract, to implement directly rather than pull in an
//! NLP crate.

use std::collections::{BTreeMap, HashMap};

pub const MAX_FEATURES: usize = 49;

/// Lower-cases and splits on anything that isn't `[a-z]`, keeping tokens of
/// length >= 2, then appends the bigrams of consecutive unigrams.
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_ascii_lowercase();
    let unigrams: Vec<String> = lowered
        .split(|c: char| !c.is_ascii_lowercase())
        .filter(|token| token.len() >= 2)
        .map(str::to_string)
        .collect();

    let mut tokens = unigrams.clone();
    for pair in unigrams.windows(2) {
        tokens.push(format!("{} {}", pair[0], pair[1]));
    }
    tokens
}

/// A fitted vocabulary: ordered feature names (stable column order) and,
/// for each, the document frequency used to compute idf.
pub struct Vocabulary {
    terms: Vec<String>,
    document_frequency: HashMap<String, usize>,
    document_count: usize,
}

impl Vocabulary {
    /// Builds the vocabulary from a corpus of raw descriptions, selecting at
    /// most [`MAX_FEATURES`] terms by total corpus frequency (ties broken
    /// alphabetically for determinism), after dropping terms outside the
    /// `min_df`/`max_df` document-frequency band.
    pub fn fit(documents: &[String]) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|doc| tokenize(doc)).collect();
        let document_count = documents.len();

        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let mut total_count: HashMap<String, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen_in_doc = std::collections::HashSet::new();
            for token in tokens {
                *total_count.entry(token.clone()).or_insert(0) += 1;
                if seen_in_doc.insert(token.clone()) {
                    *document_frequency.entry(token.clone()).or_insert(0) += 1;
                }
            }
        }

        let max_df_count = ((document_count as f64) * 0.95).floor() as usize;
        let mut candidates: Vec<(&String, &usize)> = total_count
            .iter()
            .filter(|(term, _)| {
                let df = document_frequency.get(*term).copied().unwrap_or(0);
                // min_df=1: every observed term qualifies on the low end.
                df >= 1 && (document_count < 2 || df <= max_df_count.max(1))
            })
            .collect();

        candidates.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let terms: Vec<String> = candidates.into_iter().take(MAX_FEATURES).map(|(term, _)| term.clone()).collect();

        Self {
            terms,
            document_frequency,
            document_count,
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// TF-IDF vector for `document` over the fitted vocabulary, smooth-idf
    /// weighted (`ln((1+n)/(1+df)) + 1`) and L2-normalized. Padded with
    /// zeros to [`MAX_FEATURES`] dimensions regardless of vocabulary size, so
    /// callers can always concatenate a fixed-width block.
    pub fn transform(&self, document: &str) -> Vec<f64> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for token in tokenize(document) {
            if let Some(term) = self.terms.iter().find(|t| t.as_str() == token) {
                *counts.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let mut vector = vec![0.0; MAX_FEATURES];
        for (index, term) in self.terms.iter().enumerate() {
            let tf = counts.get(term.as_str()).copied().unwrap_or(0) as f64;
            if tf == 0.0 {
                continue;
            }
            let df = self.document_frequency.get(term).copied().unwrap_or(0) as f64;
            let idf = ((1.0 + self.document_count as f64) / (1.0 + df)).ln() + 1.0;
            vector[index] = tf * idf;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

/// Convenience entry point: fits a vocabulary over `documents` and returns
/// one 49-dimensional row per document, in order. An empty or
/// unbuildable vocabulary yields all-zero rows.
pub fn vectorize(documents: &[String]) -> Vec<Vec<f64>> {
    let vocabulary = Vocabulary::fit(documents);
    if vocabulary.is_empty() {
        return documents.iter().map(|_| vec![0.0; MAX_FEATURES]).collect();
    }
    documents.iter().map(|doc| vocabulary.transform(doc)).collect()
}
