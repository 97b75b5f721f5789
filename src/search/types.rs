//! Common types for the search module

use serde::{Deserialize, Serialize};

use super::keyword::KeywordField;

/// A document ready for indexing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDocument {
    /// Stable unique document ID
    pub id: String,
    /// Concatenated free text used for the semantic and lexical channels
    pub text: String,
    /// Structured fields feeding the keyword set, in extraction order
    pub keyword_fields: Vec<KeywordField>,
}

impl ProfileDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            keyword_fields: vec![],
        }
    }

    pub fn with_keywords(mut self, field: impl Into<KeywordField>) -> Self {
        self.keyword_fields.push(field.into());
        self
    }
}

/// Search request as received from the transport layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub candidate_ids: Option<Vec<String>>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
            candidate_ids: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_candidates<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidate_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

/// One ranked profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    /// Document ID
    pub id: String,
    /// Normalized semantic score (0.0 - 1.0)
    pub sem_score: f32,
    /// Normalized lexical score (0.0 - 1.0)
    pub kw_score: f32,
    /// Match percentage (0.0 - 100.0)
    pub final_score: f32,
    /// Heaviest query terms, formatted as `term (weight)`
    pub top_terms: Vec<String>,
    /// Every query token is in the document's keyword set
    pub all_keywords_matched: bool,
}

/// Outcome of a search beyond its result list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchStatus {
    Ok,
    /// No generation has been published yet
    NotBuilt,
    /// A candidate allow-list was given but none of its ids are indexed
    NoCandidates,
    /// The embedding provider could not embed the query
    Degraded { reason: String },
}

impl SearchStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SearchStatus::Degraded { .. })
    }
}

/// Search results with their status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<ScoredResult>,
    pub status: SearchStatus,
}

impl SearchResponse {
    pub fn ok(results: Vec<ScoredResult>) -> Self {
        Self {
            results,
            status: SearchStatus::Ok,
        }
    }

    pub fn empty(status: SearchStatus) -> Self {
        Self {
            results: vec![],
            status,
        }
    }
}

/// Statistics from a generation build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub generation: String,
    pub indexed: usize,
    pub skipped: usize,
    pub batches: usize,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_camel_case() {
        let request: SearchRequest = serde_json::from_str(
            r#"{"query": "sandstone", "limit": 5, "candidateIds": ["a", "b"]}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            SearchRequest::new("sandstone")
                .with_limit(5)
                .with_candidates(["a", "b"])
        );

        let minimal: SearchRequest = serde_json::from_str(r#"{"query": "x"}"#).unwrap();
        assert_eq!(minimal.limit, None);
        assert_eq!(minimal.candidate_ids, None);
    }

    #[test]
    fn test_result_field_names() {
        let result = ScoredResult {
            id: "doc".into(),
            sem_score: 1.0,
            kw_score: 0.5,
            final_score: 100.0,
            top_terms: vec!["bridge (0.71)".into()],
            all_keywords_matched: true,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["semScore"], 1.0);
        assert_eq!(json["kwScore"], 0.5);
        assert_eq!(json["finalScore"], 100.0);
        assert_eq!(json["allKeywordsMatched"], true);
        assert_eq!(json["topTerms"][0], "bridge (0.71)");
    }

    #[test]
    fn test_status_serialization() {
        let degraded = SearchStatus::Degraded {
            reason: "offline".into(),
        };
        let json = serde_json::to_value(&degraded).unwrap();
        assert_eq!(json["kind"], "degraded");
        assert!(degraded.is_degraded());
        assert_eq!(serde_json::to_value(SearchStatus::NotBuilt).unwrap()["kind"], "not_built");
    }
}
