//! TF-IDF lexical index
//!
//! Fits a vocabulary with smoothed IDF weights over the corpus texts and
//! keeps one L2-normalized sparse row per document, so cosine similarity
//! against a query reduces to a sparse dot product.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tokenizer::analyze;
use crate::error::{Result, SearchError};

/// Sparse vector over vocabulary columns, indices strictly ascending
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    fn from_weights(mut weights: Vec<(u32, f32)>) -> Self {
        weights.sort_by_key(|(index, _)| *index);
        let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        let (indices, values) = weights
            .into_iter()
            .map(|(index, w)| (index, if norm > 0.0 { w / norm } else { w }))
            .unzip();
        Self { indices, values }
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Dot product by merging the two sorted index lists
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// Serialized form of the lexical model
#[derive(Serialize, Deserialize)]
struct LexicalModel {
    terms: Vec<String>,
    idf: Vec<f32>,
    rows: Vec<SparseVector>,
}

/// Fitted vocabulary, IDF weights and document-term matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LexicalModel", into = "LexicalModel")]
pub struct LexicalIndex {
    terms: Vec<String>,
    idf: Vec<f32>,
    rows: Vec<SparseVector>,
    columns: HashMap<String, u32>,
}

impl LexicalIndex {
    /// Fit over `texts`, one matrix row per text in input order.
    ///
    /// With `max_terms`, only the terms with the highest document frequency
    /// are kept (ties broken by total count, then alphabetically).
    pub fn fit<S: AsRef<str>>(texts: &[S], max_terms: Option<usize>) -> Result<Self> {
        if texts.is_empty() {
            return Err(SearchError::EmptyCorpus);
        }

        let counts: Vec<BTreeMap<String, u32>> = texts
            .iter()
            .map(|text| {
                let mut tf = BTreeMap::new();
                for token in analyze(text.as_ref()) {
                    *tf.entry(token).or_insert(0) += 1;
                }
                tf
            })
            .collect();

        // term -> (document frequency, total count)
        let mut stats: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
        for tf in &counts {
            for (term, count) in tf {
                let entry = stats.entry(term.as_str()).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += count;
            }
        }
        if stats.is_empty() {
            return Err(SearchError::EmptyVocabulary);
        }

        let mut kept: Vec<(&str, (u32, u32))> = stats.into_iter().collect();
        if let Some(cap) = max_terms {
            if kept.len() > cap {
                kept.sort_by(|a, b| {
                    b.1 .0
                        .cmp(&a.1 .0)
                        .then_with(|| b.1 .1.cmp(&a.1 .1))
                        .then_with(|| a.0.cmp(b.0))
                });
                let dropped = kept.len() - cap;
                kept.truncate(cap);
                kept.sort_by(|a, b| a.0.cmp(b.0));
                debug!(dropped, kept = cap, "Capped lexical vocabulary");
            }
        }

        let n_docs = texts.len() as f32;
        let terms: Vec<String> = kept.iter().map(|(term, _)| term.to_string()).collect();
        let idf: Vec<f32> = kept
            .iter()
            .map(|(_, (df, _))| ((1.0 + n_docs) / (1.0 + *df as f32)).ln() + 1.0)
            .collect();
        let columns = column_lookup(&terms);

        let rows = counts
            .iter()
            .map(|tf| {
                let weights = tf
                    .iter()
                    .filter_map(|(term, count)| {
                        columns
                            .get(term)
                            .map(|&col| (col, *count as f32 * idf[col as usize]))
                    })
                    .collect();
                SparseVector::from_weights(weights)
            })
            .collect();

        Ok(Self {
            terms,
            idf,
            rows,
            columns,
        })
    }

    /// Query vector over the fitted vocabulary; unknown terms are ignored
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut tf: HashMap<u32, u32> = HashMap::new();
        for token in analyze(text) {
            if let Some(&col) = self.columns.get(&token) {
                *tf.entry(col).or_insert(0) += 1;
            }
        }
        let weights = tf
            .into_iter()
            .map(|(col, count)| (col, count as f32 * self.idf[col as usize]))
            .collect();
        SparseVector::from_weights(weights)
    }

    /// Cosine similarity of `query` against each of `rows`, in the given order.
    ///
    /// Rows outside the matrix score zero.
    pub fn similarity(&self, query: &SparseVector, rows: &[usize]) -> Vec<f32> {
        rows.iter()
            .map(|&row| self.rows.get(row).map_or(0.0, |doc| query.dot(doc)))
            .collect()
    }

    /// The `n` heaviest query terms with their weights, heaviest first
    pub fn top_terms(&self, query: &SparseVector, n: usize) -> Vec<(String, f32)> {
        let mut weighted: Vec<(&str, f32)> = query
            .indices
            .iter()
            .zip(&query.values)
            .filter(|(_, weight)| **weight > 0.0)
            .filter_map(|(&col, &weight)| {
                self.terms.get(col as usize).map(|t| (t.as_str(), weight))
            })
            .collect();

        weighted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        weighted
            .into_iter()
            .take(n)
            .map(|(term, weight)| (term.to_string(), weight))
            .collect()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.terms.len()
    }

    /// Number of document rows in the matrix
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.columns.get(term).map(|&col| self.idf[col as usize])
    }
}

fn column_lookup(terms: &[String]) -> HashMap<String, u32> {
    terms
        .iter()
        .enumerate()
        .map(|(col, term)| (term.clone(), col as u32))
        .collect()
}

impl TryFrom<LexicalModel> for LexicalIndex {
    type Error = SearchError;

    fn try_from(model: LexicalModel) -> Result<Self> {
        if model.terms.len() != model.idf.len() {
            return Err(SearchError::InconsistentGeneration(format!(
                "lexical model has {} terms but {} idf weights",
                model.terms.len(),
                model.idf.len()
            )));
        }
        let width = model.terms.len() as u32;
        for row in &model.rows {
            let ordered = row.indices.windows(2).all(|w| w[0] < w[1]);
            if row.indices.len() != row.values.len()
                || !ordered
                || row.indices.iter().any(|&col| col >= width)
            {
                return Err(SearchError::InconsistentGeneration(
                    "lexical matrix row is malformed".to_string(),
                ));
            }
        }

        let columns = column_lookup(&model.terms);
        Ok(Self {
            terms: model.terms,
            idf: model.idf,
            rows: model.rows,
            columns,
        })
    }
}

impl From<LexicalIndex> for LexicalModel {
    fn from(index: LexicalIndex) -> Self {
        Self {
            terms: index.terms,
            idf: index.idf,
            rows: index.rows,
        }
    }
}
