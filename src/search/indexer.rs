//! Staging builds of new generations
//!
//! A build validates the incoming documents, embeds them batch by batch,
//! fits the lexical model and extracts keyword sets. Nothing it produces is
//! visible to queries until the caller publishes the finished generation.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::embedding::Embedder;
use super::generation::{Generation, GenerationManifest, GenerationParts};
use super::keyword::{extract_keywords, KeywordSetStore};
use super::lexical::LexicalIndex;
use super::types::{BuildReport, ProfileDocument};
use super::vector::SemanticIndex;
use crate::config::EngineConfig;
use crate::error::{Result, SearchError};

/// Builds a complete generation from a corpus snapshot
pub struct GenerationBuilder<'a> {
    embedder: &'a dyn Embedder,
    config: &'a EngineConfig,
}

impl<'a> GenerationBuilder<'a> {
    pub fn new(embedder: &'a dyn Embedder, config: &'a EngineConfig) -> Self {
        Self { embedder, config }
    }

    /// Build a staging generation; on error nothing is left behind
    pub fn build(&self, documents: Vec<ProfileDocument>) -> Result<(Generation, BuildReport)> {
        let started = Instant::now();
        let total = documents.len();
        if total == 0 {
            return Err(SearchError::EmptyCorpus);
        }

        let (accepted, skipped) = accept_documents(documents);
        let ratio = skipped as f64 / total as f64;
        if ratio > self.config.max_skip_ratio {
            return Err(SearchError::TooManyMalformed {
                skipped,
                total,
                max_ratio: self.config.max_skip_ratio,
            });
        }
        if accepted.is_empty() {
            return Err(SearchError::EmptyCorpus);
        }

        let built_at = Utc::now();
        let generation_id = format!(
            "{}-{}",
            built_at.format("%Y%m%dT%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        info!(
            generation = %generation_id,
            documents = accepted.len(),
            skipped,
            model = self.embedder.model_id(),
            "Building generation"
        );

        let texts: Vec<&str> = accepted.iter().map(|doc| doc.text.as_str()).collect();
        let (vectors, batches) = self.embed_corpus(&texts)?;
        let semantic = SemanticIndex::build(vectors)
            .map_err(|e| SearchError::BuildFailed(format!("semantic index: {e}")))?;

        let lexical = LexicalIndex::fit(&texts, self.config.max_vocabulary)
            .map_err(|e| SearchError::BuildFailed(format!("lexical model: {e}")))?;
        debug!(terms = lexical.vocabulary_len(), "Fitted lexical model");

        let mut keywords = KeywordSetStore::new();
        for doc in &accepted {
            keywords.insert(doc.id.clone(), extract_keywords(&doc.keyword_fields));
        }

        let manifest = GenerationManifest {
            id: generation_id.clone(),
            built_at,
            embedding_model: self.embedder.model_id().to_string(),
            dimension: semantic.dimension(),
            documents: accepted.len(),
            lexical_available: true,
        };
        let generation = Generation::new(GenerationParts {
            manifest,
            ids: accepted.into_iter().map(|doc| doc.id).collect(),
            semantic,
            lexical: Some(lexical),
            keywords,
        })?;

        let report = BuildReport {
            generation: generation_id,
            indexed: generation.len(),
            skipped,
            batches,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            generation = %report.generation,
            indexed = report.indexed,
            elapsed_ms = report.elapsed_ms,
            "Generation built"
        );
        Ok((generation, report))
    }

    fn embed_corpus(&self, texts: &[&str]) -> Result<(Vec<Vec<f32>>, usize)> {
        let batch_size = self.config.embed_batch_size.max(1);
        let expected = self.embedder.dimension();
        let mut vectors = Vec::with_capacity(texts.len());
        let mut batches = 0;

        for (batch, chunk) in texts.chunks(batch_size).enumerate() {
            let embedded = self.embedder.embed_batch(chunk).map_err(|e| {
                SearchError::BuildFailed(format!("embedding batch {} failed: {e}", batch + 1))
            })?;
            if embedded.len() != chunk.len() {
                return Err(SearchError::BuildFailed(format!(
                    "embedding batch {} returned {} vectors for {} texts",
                    batch + 1,
                    embedded.len(),
                    chunk.len()
                )));
            }
            if let Some(bad) = embedded.iter().find(|v| v.len() != expected) {
                return Err(SearchError::BuildFailed(format!(
                    "embedding batch {} returned dimension {}, expected {}",
                    batch + 1,
                    bad.len(),
                    expected
                )));
            }

            vectors.extend(embedded);
            batches += 1;
            info!(
                batch = batches,
                embedded = vectors.len(),
                total = texts.len(),
                "Embedded document batch"
            );
        }
        Ok((vectors, batches))
    }
}

/// Split documents into usable ones and a count of malformed ones
fn accept_documents(documents: Vec<ProfileDocument>) -> (Vec<ProfileDocument>, usize) {
    let mut seen = HashSet::with_capacity(documents.len());
    let mut accepted = Vec::with_capacity(documents.len());
    let mut skipped = 0;

    for doc in documents {
        match check_document(&doc, &seen) {
            Ok(()) => {
                seen.insert(doc.id.clone());
                accepted.push(doc);
            }
            Err(e) => {
                warn!("Skipping document: {}", e);
                skipped += 1;
            }
        }
    }
    (accepted, skipped)
}

fn check_document(doc: &ProfileDocument, seen: &HashSet<String>) -> Result<()> {
    let malformed = |reason: &str| SearchError::MalformedDocument {
        id: doc.id.clone(),
        reason: reason.to_string(),
    };
    if doc.id.trim().is_empty() {
        return Err(malformed("missing id"));
    }
    if doc.text.trim().is_empty() {
        return Err(malformed("no indexable text"));
    }
    if seen.contains(&doc.id) {
        return Err(malformed("duplicate id"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embedding::HashingEmbedder;

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn model_id(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            4
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(SearchError::Embedding("provider offline".to_string()))
        }
    }

    fn docs(n: usize) -> Vec<ProfileDocument> {
        (0..n)
            .map(|i| {
                ProfileDocument::new(format!("doc-{i}"), format!("structural engineer number{i}"))
                    .with_keywords(vec![format!("specialty{i}")])
            })
            .collect()
    }

    #[test]
    fn test_build_produces_consistent_generation() {
        let embedder = HashingEmbedder::new(32);
        let config = EngineConfig::default().with_embed_batch_size(2);
        let (generation, report) = GenerationBuilder::new(&embedder, &config)
            .build(docs(5))
            .unwrap();

        assert_eq!(generation.len(), 5);
        assert_eq!(generation.semantic().len(), 5);
        assert_eq!(generation.lexical().unwrap().len(), 5);
        assert_eq!(generation.keywords().len(), 5);
        assert_eq!(report.indexed, 5);
        assert_eq!(report.batches, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(
            generation.keywords().get("doc-3").unwrap(),
            &["specialty3".to_string()]
        );
    }

    #[test]
    fn test_malformed_documents_are_skipped_and_counted() {
        let embedder = HashingEmbedder::new(32);
        let config = EngineConfig::default().with_max_skip_ratio(0.5);
        let mut corpus = docs(4);
        corpus.push(ProfileDocument::new("", "no id here"));
        corpus.push(ProfileDocument::new("doc-0", "duplicate"));

        let (generation, report) = GenerationBuilder::new(&embedder, &config)
            .build(corpus)
            .unwrap();
        assert_eq!(generation.len(), 4);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_skip_ratio_aborts_build() {
        let embedder = HashingEmbedder::new(32);
        let config = EngineConfig::default().with_max_skip_ratio(0.1);
        let mut corpus = docs(3);
        corpus.push(ProfileDocument::new("blank", "   "));

        let result = GenerationBuilder::new(&embedder, &config).build(corpus);
        assert!(matches!(
            result,
            Err(SearchError::TooManyMalformed {
                skipped: 1,
                total: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_embedding_failure_is_build_failure() {
        let config = EngineConfig::default();
        let result = GenerationBuilder::new(&FailingEmbedder, &config).build(docs(2));
        assert!(matches!(result, Err(SearchError::BuildFailed(_))));
    }

    #[test]
    fn test_empty_corpus() {
        let embedder = HashingEmbedder::new(8);
        let config = EngineConfig::default();
        assert!(matches!(
            GenerationBuilder::new(&embedder, &config).build(vec![]),
            Err(SearchError::EmptyCorpus)
        ));
    }
}
