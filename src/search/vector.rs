//! Exact inner-product search over L2-normalized dense vectors
//!
//! Vectors are stored row-major in one flat buffer; row `i` belongs to the
//! `i`-th id of the owning generation. Every query scores the whole corpus,
//! which is sufficient at profile-directory scale.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Brute-force semantic index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticIndex {
    dimension: usize,
    rows: usize,
    data: Vec<f32>,
}

impl SemanticIndex {
    /// Build an index from corpus vectors, which are expected to be pre-normalized
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dimension = match vectors.first() {
            Some(first) => first.len(),
            None => return Err(SearchError::EmptyCorpus),
        };
        if dimension == 0 {
            return Err(SearchError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let rows = vectors.len();
        let mut data = Vec::with_capacity(rows * dimension);
        for vector in vectors {
            if vector.len() != dimension {
                return Err(SearchError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            data.extend(vector);
        }

        Ok(Self {
            dimension,
            rows,
            data,
        })
    }

    /// Check that the flat buffer holds exactly `rows` vectors
    pub fn check_layout(&self) -> Result<()> {
        if (self.rows > 0 && self.dimension == 0) || self.data.len() != self.rows * self.dimension {
            return Err(SearchError::InconsistentGeneration(format!(
                "semantic buffer holds {} values for {} rows of dimension {}",
                self.data.len(),
                self.rows,
                self.dimension
            )));
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Vector stored at `row`
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// Up to `k` `(row, score)` pairs, best first.
    ///
    /// Equal scores are ordered by row so repeated searches are identical.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.is_empty() || k == 0 {
            return Ok(vec![]);
        }
        if query.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .map(|row| dot(row, query))
            .enumerate()
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Full-corpus search filtered to `allowed` rows, keeping the global ranking
    pub fn search_within(
        &self,
        query: &[f32],
        allowed: &[usize],
        k: usize,
    ) -> Result<Vec<(usize, f32)>> {
        let mut mask = vec![false; self.rows];
        for &row in allowed {
            if let Some(slot) = mask.get_mut(row) {
                *slot = true;
            }
        }

        let ranked = self.search(query, self.rows)?;
        Ok(ranked
            .into_iter()
            .filter(|(row, _)| mask[*row])
            .take(k)
            .collect())
    }
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale `vector` to unit length in place; the zero vector is left untouched
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
