//! Keyword sets for full-match detection
//!
//! Each document carries a curated, deduplicated token list built from its
//! structured fields. A query whose every token appears in that list is a
//! full keyword match and overrides the blended score during fusion.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::tokenizer::tokenize;

/// One structured field value fed into keyword extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordField {
    Missing,
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<KeywordField>),
}

impl KeywordField {
    fn collect_tokens(&self, out: &mut Vec<String>) {
        match self {
            Self::Missing => {}
            Self::Flag(value) => out.extend(tokenize(&value.to_string())),
            Self::Integer(value) => out.extend(tokenize(&value.to_string())),
            Self::Float(value) => out.extend(tokenize(&float_text(*value))),
            Self::Text(value) => out.extend(tokenize(value)),
            Self::List(items) => {
                for item in items {
                    item.collect_tokens(out);
                }
            }
        }
    }
}

/// Shortest round-trip text of a float, always with a fractional part or an
/// exponent: `3.0`, `0.0001`, `1e+20`, `1.5e-07`. Exponent form is used below
/// 1e-4 and from 1e16 on.
fn float_text(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return format!("{value:?}");
    }
    let scientific = format!("{value:e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }
    let fixed = value.to_string();
    if fixed.contains('.') {
        fixed
    } else {
        format!("{fixed}.0")
    }
}

impl From<&str> for KeywordField {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for KeywordField {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for KeywordField {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<i64> for KeywordField {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for KeywordField {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<KeywordField>> From<Vec<T>> for KeywordField {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<KeywordField>> From<Option<T>> for KeywordField {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Missing)
    }
}

/// Flatten, tokenize and dedupe fields, keeping first-seen order.
///
/// `["steel", "Steel", "glass"]` extracts to `["steel", "glass"]`.
pub fn extract_keywords(fields: &[KeywordField]) -> Vec<String> {
    let mut tokens = Vec::new();
    for field in fields {
        field.collect_tokens(&mut tokens);
    }

    let mut seen = HashSet::with_capacity(tokens.len());
    tokens.retain(|token| seen.insert(token.clone()));
    tokens
}

/// Normalized query tokens as a set; only membership matters.
pub fn tokenize_query(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

/// True when both sides are non-empty and every query token is in `doc_tokens`.
pub fn fully_matches(query_tokens: &BTreeSet<String>, doc_tokens: &[String]) -> bool {
    if query_tokens.is_empty() || doc_tokens.is_empty() {
        return false;
    }
    query_tokens
        .iter()
        .all(|token| doc_tokens.iter().any(|candidate| candidate == token))
}

/// Keyword sets by document id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordSetStore {
    by_id: BTreeMap<String, Vec<String>>,
}

impl KeywordSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the extracted keyword set for a document, replacing any previous one
    pub fn insert(&mut self, id: impl Into<String>, keywords: Vec<String>) {
        self.by_id.insert(id.into(), keywords);
    }

    pub fn get(&self, id: &str) -> Option<&[String]> {
        self.by_id.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Full-match test for one document; unknown ids never match
    pub fn fully_matches(&self, id: &str, query_tokens: &BTreeSet<String>) -> bool {
        self.get(id)
            .is_some_and(|keywords| fully_matches(query_tokens, keywords))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.keys().map(String::as_str)
    }
}
