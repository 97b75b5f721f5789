//! Query service over the published generation
//!
//! Readers clone an `Arc` to the current generation and run against it
//! without holding any lock, so a concurrent rebuild never blocks or
//! disturbs in-flight queries. A rebuild stages a complete generation,
//! persists it and only then swaps the pointer.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::embedding::Embedder;
use super::generation::{CandidateRows, Generation};
use super::hybrid::{fuse, round_to, Candidate};
use super::indexer::GenerationBuilder;
use super::keyword::tokenize_query;
use super::types::{
    BuildReport, ProfileDocument, ScoredResult, SearchRequest, SearchResponse, SearchStatus,
};
use crate::config::EngineConfig;
use crate::docs::source::DocumentSource;
use crate::docs::store::GenerationStore;
use crate::error::{Result, SearchError};

/// Decimal places kept for per-channel scores
const CHANNEL_DECIMALS: i32 = 4;

/// Hybrid relevance engine
pub struct SearchEngine {
    current: RwLock<Arc<Generation>>,
    build_lock: Mutex<()>,
    embedder: Arc<dyn Embedder>,
    config: EngineConfig,
    store: Option<GenerationStore>,
}

impl SearchEngine {
    /// Create an engine with no generation and no persistence
    pub fn new(embedder: Arc<dyn Embedder>, config: EngineConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(Generation::empty())),
            build_lock: Mutex::new(()),
            embedder,
            config,
            store: None,
        }
    }

    /// Create an engine backed by a store, serving its current generation if there is one
    pub fn open(
        embedder: Arc<dyn Embedder>,
        config: EngineConfig,
        store: GenerationStore,
    ) -> Result<Self> {
        let mut engine = Self::new(embedder, config);
        match store.load_current()? {
            Some(generation) => {
                if engine.accepts(&generation) {
                    info!(
                        "Loaded generation {} ({} documents)",
                        generation.generation_id().unwrap_or_default(),
                        generation.len()
                    );
                    engine.current = RwLock::new(Arc::new(generation));
                }
            }
            None => info!("No persisted generation in {:?}", store.base_dir()),
        }
        engine.store = Some(store);
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    // A generation embedded by another model cannot be queried with ours
    fn accepts(&self, generation: &Generation) -> bool {
        let Some(manifest) = generation.manifest() else {
            return false;
        };
        if manifest.embedding_model != self.embedder.model_id()
            || manifest.dimension != self.embedder.dimension()
        {
            warn!(
                "Generation {} was built with {} (dim {}), engine uses {} (dim {}); a rebuild is required",
                manifest.id,
                manifest.embedding_model,
                manifest.dimension,
                self.embedder.model_id(),
                self.embedder.dimension()
            );
            return false;
        }
        true
    }

    /// The generation queries currently run against
    pub async fn snapshot(&self) -> Arc<Generation> {
        Arc::clone(&*self.current.read().await)
    }

    /// Swap in a generation, returning the one it replaced
    pub async fn publish(&self, generation: Generation) -> Arc<Generation> {
        let next = Arc::new(generation);
        let mut current = self.current.write().await;
        info!(
            "Publishing generation {} ({} documents)",
            next.generation_id().unwrap_or_default(),
            next.len()
        );
        std::mem::replace(&mut *current, next)
    }

    /// Build, persist and publish a generation from documents.
    ///
    /// Builds are serialized. If any step fails the published generation
    /// stays as it was.
    pub async fn rebuild(&self, documents: Vec<ProfileDocument>) -> Result<BuildReport> {
        let _guard = self.build_lock.lock().await;

        let embedder = Arc::clone(&self.embedder);
        let config = self.config.clone();
        let (generation, report) = tokio::task::spawn_blocking(move || {
            GenerationBuilder::new(embedder.as_ref(), &config).build(documents)
        })
        .await
        .map_err(|e| SearchError::BuildFailed(format!("build task failed: {e}")))??;

        if let Some(store) = &self.store {
            store.save(&generation).map_err(|e| {
                warn!("Failed to persist generation {}: {}", report.generation, e);
                SearchError::BuildFailed(format!("persisting generation: {e}"))
            })?;
        }

        self.publish(generation).await;
        Ok(report)
    }

    /// Fetch records from a source and rebuild from them
    pub async fn rebuild_from(&self, source: &dyn DocumentSource) -> Result<BuildReport> {
        info!("Fetching documents from {}", source.describe());
        let documents = source
            .fetch()?
            .iter()
            .map(|record| record.to_document())
            .collect();
        self.rebuild(documents).await
    }

    /// Re-read the store's current generation and publish it if it differs
    pub async fn reload(&self) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let Some(id) = store.current_id()? else {
            return Ok(false);
        };
        if self.snapshot().await.generation_id() == Some(id.as_str()) {
            return Ok(false);
        }

        let generation = store.load(&id)?;
        if !self.accepts(&generation) {
            return Ok(false);
        }
        self.publish(generation).await;
        Ok(true)
    }

    /// Embed a text with the engine's provider off the async runtime
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| SearchError::Embedding(format!("embedding task failed: {e}")))?
    }

    /// Rank profiles for a query against the current generation
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let generation = self.snapshot().await;
        if !generation.is_built() {
            debug!("Search before first build");
            return Ok(SearchResponse::empty(SearchStatus::NotBuilt));
        }

        let candidates = generation.resolve_candidates(request.candidate_ids.as_deref());
        let limit = request
            .limit
            .filter(|limit| *limit > 0)
            .unwrap_or(self.config.default_limit);
        let k = match &candidates {
            CandidateRows::Unrestricted => limit.min(generation.len()),
            CandidateRows::Restricted(rows) if rows.is_empty() => {
                debug!("No requested candidate is indexed");
                return Ok(SearchResponse::empty(SearchStatus::NoCandidates));
            }
            CandidateRows::Restricted(rows) => limit.min(rows.len()),
        };

        let query_vector = match self.embed(&request.query).await {
            Ok(vector) => vector,
            Err(e) if e.is_provider_unavailable() => {
                warn!("Query embedding failed, returning degraded response: {}", e);
                return Ok(SearchResponse::empty(SearchStatus::Degraded {
                    reason: e.to_string(),
                }));
            }
            Err(e) => return Err(e),
        };

        let results = rank(
            &generation,
            &self.config,
            &request.query,
            &query_vector,
            &candidates,
            k,
        )?;
        debug!(
            "Query {:?} returned {} results from generation {}",
            request.query,
            results.len(),
            generation.generation_id().unwrap_or_default()
        );
        Ok(SearchResponse::ok(results))
    }
}

/// Score one query against one generation
pub fn rank(
    generation: &Generation,
    config: &EngineConfig,
    query: &str,
    query_vector: &[f32],
    candidates: &CandidateRows,
    k: usize,
) -> Result<Vec<ScoredResult>> {
    let hits = match candidates {
        CandidateRows::Unrestricted => generation.semantic().search(query_vector, k)?,
        CandidateRows::Restricted(rows) => {
            generation.semantic().search_within(query_vector, rows, k)?
        }
    };
    let rows: Vec<usize> = hits.iter().map(|(row, _)| *row).collect();

    let (lexical_scores, top_terms) = match generation.lexical() {
        Some(lexical) => {
            let query_terms = lexical.transform(query);
            let top_terms: Vec<String> = lexical
                .top_terms(&query_terms, config.top_terms)
                .into_iter()
                .map(|(term, weight)| format!("{term} ({weight:.2})"))
                .collect();
            (lexical.similarity(&query_terms, &rows), top_terms)
        }
        None => (vec![0.0; rows.len()], vec![]),
    };

    let query_tokens = tokenize_query(query);
    let candidates: Vec<Candidate> = hits
        .iter()
        .zip(&lexical_scores)
        .map(|(&(row, semantic), &lexical)| Candidate {
            row,
            semantic,
            lexical,
            full_match: generation
                .id_at(row)
                .is_some_and(|id| generation.keywords().fully_matches(id, &query_tokens)),
        })
        .collect();

    let fused = fuse(&candidates, &config.fusion_weights(), config.result_order);
    Ok(fused
        .into_iter()
        .map(|score| ScoredResult {
            id: generation.id_at(score.row).unwrap_or_default().to_string(),
            sem_score: round_to(score.semantic, CHANNEL_DECIMALS),
            kw_score: round_to(score.lexical, CHANNEL_DECIMALS),
            final_score: score.final_score,
            top_terms: top_terms.clone(),
            all_keywords_matched: score.full_match,
        })
        .collect())
}
