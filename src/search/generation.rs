//! Generations: immutable, internally consistent index snapshots
//!
//! A generation bundles the id list, the semantic index, the optional
//! lexical model and the keyword sets. All four share one row space and are
//! validated together before a generation can exist, so a published
//! generation is always queryable as a whole.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::keyword::KeywordSetStore;
use super::lexical::LexicalIndex;
use super::vector::SemanticIndex;
use crate::error::{Result, SearchError};

/// Descriptive metadata stored next to a generation's artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationManifest {
    pub id: String,
    pub built_at: DateTime<Utc>,
    pub embedding_model: String,
    pub dimension: usize,
    pub documents: usize,
    pub lexical_available: bool,
}

/// Raw parts of a generation before validation
#[derive(Debug, Clone)]
pub struct GenerationParts {
    pub manifest: GenerationManifest,
    pub ids: Vec<String>,
    pub semantic: SemanticIndex,
    pub lexical: Option<LexicalIndex>,
    pub keywords: KeywordSetStore,
}

/// One published snapshot of all build artifacts
#[derive(Debug, Clone)]
pub struct Generation {
    manifest: Option<GenerationManifest>,
    ids: Vec<String>,
    rows_by_id: HashMap<String, usize>,
    semantic: SemanticIndex,
    lexical: Option<LexicalIndex>,
    keywords: KeywordSetStore,
}

/// Candidate allow-list resolved against a generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateRows {
    /// No allow-list was supplied
    Unrestricted,
    /// Known rows from the allow-list, in first-mention order; may be empty
    Restricted(Vec<usize>),
}

impl Generation {
    /// Sentinel served before the first build; every query on it returns nothing
    pub fn empty() -> Self {
        Self {
            manifest: None,
            ids: vec![],
            rows_by_id: HashMap::new(),
            semantic: SemanticIndex::default(),
            lexical: None,
            keywords: KeywordSetStore::new(),
        }
    }

    /// Validate parts and assemble a generation
    pub fn new(parts: GenerationParts) -> Result<Self> {
        let GenerationParts {
            mut manifest,
            ids,
            semantic,
            lexical,
            keywords,
        } = parts;

        let rows = ids.len();
        if rows == 0 {
            return Err(SearchError::EmptyCorpus);
        }
        semantic.check_layout()?;
        if semantic.len() != rows {
            return Err(inconsistent(format!(
                "{} ids but {} semantic rows",
                rows,
                semantic.len()
            )));
        }
        if let Some(lexical) = &lexical {
            if lexical.len() != rows {
                return Err(inconsistent(format!(
                    "{} ids but {} lexical rows",
                    rows,
                    lexical.len()
                )));
            }
        }
        if keywords.len() != rows {
            return Err(inconsistent(format!(
                "{} ids but {} keyword sets",
                rows,
                keywords.len()
            )));
        }

        let mut rows_by_id = HashMap::with_capacity(rows);
        for (row, id) in ids.iter().enumerate() {
            if rows_by_id.insert(id.clone(), row).is_some() {
                return Err(inconsistent(format!("duplicate id {id}")));
            }
            if !keywords.contains(id) {
                return Err(inconsistent(format!("no keyword set for {id}")));
            }
        }

        manifest.documents = rows;
        manifest.dimension = semantic.dimension();
        manifest.lexical_available = lexical.is_some();

        Ok(Self {
            manifest: Some(manifest),
            ids,
            rows_by_id,
            semantic,
            lexical,
            keywords,
        })
    }

    /// Whether a real build is behind this generation
    pub fn is_built(&self) -> bool {
        self.manifest.is_some()
    }

    pub fn manifest(&self) -> Option<&GenerationManifest> {
        self.manifest.as_ref()
    }

    pub fn generation_id(&self) -> Option<&str> {
        self.manifest.as_ref().map(|m| m.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn id_at(&self, row: usize) -> Option<&str> {
        self.ids.get(row).map(String::as_str)
    }

    pub fn row_of(&self, id: &str) -> Option<usize> {
        self.rows_by_id.get(id).copied()
    }

    pub fn semantic(&self) -> &SemanticIndex {
        &self.semantic
    }

    /// Lexical model, present only when the build produced one
    pub fn lexical(&self) -> Option<&LexicalIndex> {
        self.lexical.as_ref()
    }

    pub fn lexical_available(&self) -> bool {
        self.lexical.is_some()
    }

    pub fn keywords(&self) -> &KeywordSetStore {
        &self.keywords
    }

    /// Map an optional allow-list to rows, dropping unknown and repeated ids.
    ///
    /// An absent or empty list means the whole corpus.
    pub fn resolve_candidates(&self, candidate_ids: Option<&[String]>) -> CandidateRows {
        let candidate_ids = match candidate_ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => return CandidateRows::Unrestricted,
        };
        let mut rows: Vec<usize> = Vec::with_capacity(candidate_ids.len());
        for id in candidate_ids {
            if let Some(row) = self.row_of(id) {
                if !rows.contains(&row) {
                    rows.push(row);
                }
            }
        }
        CandidateRows::Restricted(rows)
    }

    /// Copy of this generation without its lexical model
    pub fn without_lexical(&self) -> Self {
        let mut stripped = self.clone();
        stripped.lexical = None;
        if let Some(manifest) = stripped.manifest.as_mut() {
            manifest.lexical_available = false;
        }
        stripped
    }

    /// Split back into parts, e.g. for persistence
    pub fn to_parts(&self) -> Option<GenerationParts> {
        let manifest = self.manifest.clone()?;
        Some(GenerationParts {
            manifest,
            ids: self.ids.clone(),
            semantic: self.semantic.clone(),
            lexical: self.lexical.clone(),
            keywords: self.keywords.clone(),
        })
    }
}

fn inconsistent(reason: String) -> SearchError {
    SearchError::InconsistentGeneration(reason)
}
