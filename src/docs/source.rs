//! Profile records and where they come from
//!
//! The engine never reaches into a database; a [`DocumentSource`] hands it a
//! snapshot of raw records and [`ProfileRecord::to_document`] turns each one
//! into the text and keyword fields the indexes consume.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::search::keyword::KeywordField;
use crate::search::types::ProfileDocument;

/// Raw expert profile as stored upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub projects_current: Vec<String>,
    #[serde(default)]
    pub projects_completed: Vec<String>,
}

impl ProfileRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Indexable document; a missing id becomes empty and is rejected at build time
    pub fn to_document(&self) -> ProfileDocument {
        let specialties = self.specialties.join(" ");
        let text = [
            self.name.as_deref().unwrap_or_default(),
            self.company.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default(),
            specialties.as_str(),
            self.city.as_deref().unwrap_or_default(),
            self.state.as_deref().unwrap_or_default(),
        ]
        .iter()
        .filter(|part| !part.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

        ProfileDocument {
            id: self.id.clone().unwrap_or_default(),
            text,
            keyword_fields: vec![
                KeywordField::from(self.specialties.clone()),
                KeywordField::from(self.certifications.clone()),
                KeywordField::from(self.projects_current.clone()),
                KeywordField::from(self.projects_completed.clone()),
                KeywordField::from(self.name.clone()),
                KeywordField::from(self.company.clone()),
                KeywordField::from(self.city.clone()),
                KeywordField::from(self.state.clone()),
            ],
        }
    }
}

/// Supplier of a corpus snapshot for one build
pub trait DocumentSource: Send + Sync {
    /// Human-readable origin, used in logs
    fn describe(&self) -> String;

    fn fetch(&self) -> Result<Vec<ProfileRecord>>;
}

/// Records read from a JSON array or a JSON Lines file
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentSource for JsonFileSource {
    fn describe(&self) -> String {
        format!("{:?}", self.path)
    }

    fn fetch(&self) -> Result<Vec<ProfileRecord>> {
        let raw = fs::read_to_string(&self.path)?;
        let records = parse_records(&raw)?;
        debug!("Read {} records from {:?}", records.len(), self.path);
        Ok(records)
    }
}

/// Parse a JSON array, or JSON Lines when the content is not an array.
///
/// An unparseable element or line yields an empty record so the build
/// counts it as malformed instead of silently dropping it.
pub fn parse_records(raw: &str) -> Result<Vec<ProfileRecord>> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(trimmed)?;
        let records = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                serde_json::from_value(value).unwrap_or_else(|e| {
                    warn!("Unparseable record at index {}: {}", index, e);
                    ProfileRecord::default()
                })
            })
            .collect();
        return Ok(records);
    }

    let mut records = vec![];
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Unparseable record on line {}: {}", line_no + 1, e);
                records.push(ProfileRecord::default());
            }
        }
    }
    Ok(records)
}

/// Records held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<ProfileRecord>,
}

impl StaticSource {
    pub fn new(records: Vec<ProfileRecord>) -> Self {
        Self { records }
    }
}

impl DocumentSource for StaticSource {
    fn describe(&self) -> String {
        format!("{} in-memory records", self.records.len())
    }

    fn fetch(&self) -> Result<Vec<ProfileRecord>> {
        Ok(self.records.clone())
    }
}
