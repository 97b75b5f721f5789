//! Hybrid relevance search
//!
//! Dense semantic similarity and TF-IDF lexical similarity are fused into a
//! single match percentage, with a full keyword-set match overriding the
//! blend. All artifacts live in immutable generations that are built off to
//! the side and swapped in atomically.

pub mod embedding;
pub mod engine;
pub mod generation;
pub mod hybrid;
pub mod indexer;
pub mod keyword;
pub mod lexical;
pub mod tokenizer;
pub mod types;
pub mod vector;

pub use embedding::{embedder_for_model, Embedder, FastEmbedder, HashingEmbedder, HASHING_MODEL};
pub use engine::SearchEngine;
pub use generation::{CandidateRows, Generation, GenerationManifest};
pub use hybrid::{fuse, Candidate, FusedScore, FusionWeights, ResultOrder};
pub use indexer::GenerationBuilder;
pub use keyword::{KeywordField, KeywordSetStore};
pub use lexical::LexicalIndex;
pub use types::{
    BuildReport, ProfileDocument, ScoredResult, SearchRequest, SearchResponse, SearchStatus,
};
pub use vector::SemanticIndex;
