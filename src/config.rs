//! Engine configuration
//!
//! Values resolve in order: built-in defaults, an optional YAML file, then
//! environment variables. The engine itself only ever sees the final,
//! validated [`EngineConfig`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::search::hybrid::{FusionWeights, ResultOrder};

pub const ENV_EMBED_MODEL: &str = "EMBED_MODEL";
pub const ENV_SEMANTIC_WEIGHT: &str = "MATCH_W_SEM";
pub const ENV_KEYWORD_WEIGHT: &str = "MATCH_W_KW";
pub const ENV_FILTER_WEIGHT: &str = "MATCH_W_FILT";
pub const ENV_DEFAULT_LIMIT: &str = "SEARCH_DEFAULT_LIMIT";
pub const ENV_MAX_VOCABULARY: &str = "LEXICAL_MAX_FEATURES";

/// Configuration for building and querying generations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Embedding model identity; `hashing` selects the offline embedder
    pub embedding_model: String,

    /// Weight of the normalized semantic score
    pub semantic_weight: f32,

    /// Weight of the normalized lexical score
    pub keyword_weight: f32,

    /// Reserved for filter boosts applied by callers; carried, never used in fusion
    pub filter_weight: f32,

    /// Result count when a request gives no limit
    pub default_limit: usize,

    /// Cap on the lexical vocabulary; `None` keeps every term
    pub max_vocabulary: Option<usize>,

    /// Number of query terms reported per result
    pub top_terms: usize,

    /// Documents per embedding batch during a build
    pub embed_batch_size: usize,

    /// Largest tolerated share of malformed source records (0.0 - 1.0)
    pub max_skip_ratio: f64,

    pub result_order: ResultOrder,

    /// Persisted generations kept on disk, including the current one
    pub keep_generations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            semantic_weight: 0.6,
            keyword_weight: 0.25,
            filter_weight: 0.15,
            default_limit: 50,
            max_vocabulary: Some(5000),
            top_terms: 5,
            embed_batch_size: 64,
            max_skip_ratio: 0.1,
            result_order: ResultOrder::FinalScore,
            keep_generations: 2,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve defaults, an optional YAML file and the environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| SearchError::Config(format!("Invalid config file: {e}")))
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(ENV_EMBED_MODEL) {
            self.embedding_model = model;
        }
        if let Some(value) = lookup(ENV_SEMANTIC_WEIGHT) {
            self.semantic_weight = parse_value(ENV_SEMANTIC_WEIGHT, &value)?;
        }
        if let Some(value) = lookup(ENV_KEYWORD_WEIGHT) {
            self.keyword_weight = parse_value(ENV_KEYWORD_WEIGHT, &value)?;
        }
        if let Some(value) = lookup(ENV_FILTER_WEIGHT) {
            self.filter_weight = parse_value(ENV_FILTER_WEIGHT, &value)?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_LIMIT) {
            self.default_limit = parse_value(ENV_DEFAULT_LIMIT, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_VOCABULARY) {
            let cap: usize = parse_value(ENV_MAX_VOCABULARY, &value)?;
            self.max_vocabulary = (cap > 0).then_some(cap);
        }
        Ok(())
    }

    pub fn with_weights(mut self, semantic: f32, keyword: f32) -> Self {
        self.semantic_weight = semantic;
        self.keyword_weight = keyword;
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_max_vocabulary(mut self, cap: Option<usize>) -> Self {
        self.max_vocabulary = cap;
        self
    }

    pub fn with_result_order(mut self, order: ResultOrder) -> Self {
        self.result_order = order;
        self
    }

    pub fn with_max_skip_ratio(mut self, ratio: f64) -> Self {
        self.max_skip_ratio = ratio;
        self
    }

    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size;
        self
    }

    /// Fusion weights derived from this configuration
    pub fn fusion_weights(&self) -> FusionWeights {
        FusionWeights {
            semantic: self.semantic_weight,
            keyword: self.keyword_weight,
            filter: self.filter_weight,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.embedding_model.trim().is_empty() {
            return Err(SearchError::Config("embedding_model must not be empty".into()));
        }
        for (name, weight) in [
            ("semantic_weight", self.semantic_weight),
            ("keyword_weight", self.keyword_weight),
            ("filter_weight", self.filter_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(SearchError::Config(format!(
                    "{name} must be a finite, non-negative number"
                )));
            }
        }
        if self.default_limit == 0 {
            return Err(SearchError::Config("default_limit must be greater than 0".into()));
        }
        if self.max_vocabulary == Some(0) {
            return Err(SearchError::Config("max_vocabulary must be greater than 0".into()));
        }
        if self.embed_batch_size == 0 {
            return Err(SearchError::Config("embed_batch_size must be greater than 0".into()));
        }
        if !(0.0..=1.0).contains(&self.max_skip_ratio) {
            return Err(SearchError::Config("max_skip_ratio must be between 0.0 and 1.0".into()));
        }
        if self.keep_generations == 0 {
            return Err(SearchError::Config("keep_generations must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| SearchError::Config(format!("{key} has an invalid value: {raw:?}")))
}
