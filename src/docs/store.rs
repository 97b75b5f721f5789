//! On-disk generation store
//!
//! Layout under the data directory:
//!
//! ```text
//! CURRENT                      id of the published generation
//! generations/<id>/manifest.json
//! generations/<id>/ids.json
//! generations/<id>/semantic.json
//! generations/<id>/lexical.json   (absent when no lexical model was built)
//! generations/<id>/keywords.json
//! ```
//!
//! A generation is written into `<id>.tmp` and renamed into place once
//! complete, then `CURRENT` is replaced through its own temp file. A crash
//! at any point leaves the previously published generation loadable.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, SearchError};
use crate::search::generation::{Generation, GenerationManifest, GenerationParts};

const CURRENT_FILE: &str = "CURRENT";
const GENERATIONS_DIR: &str = "generations";
const STAGING_SUFFIX: &str = ".tmp";

const MANIFEST_FILE: &str = "manifest.json";
const IDS_FILE: &str = "ids.json";
const SEMANTIC_FILE: &str = "semantic.json";
const LEXICAL_FILE: &str = "lexical.json";
const KEYWORDS_FILE: &str = "keywords.json";

pub struct GenerationStore {
    base_dir: PathBuf,
    keep: usize,
}

impl GenerationStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        // Directories are created lazily by save()
        Self {
            base_dir: base_dir.into(),
            keep: 2,
        }
    }

    /// Number of generations kept on disk, the current one included
    pub fn with_keep(mut self, keep: usize) -> Self {
        self.keep = keep.max(1);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn generations_dir(&self) -> PathBuf {
        self.base_dir.join(GENERATIONS_DIR)
    }

    fn generation_dir(&self, id: &str) -> PathBuf {
        self.generations_dir().join(id)
    }

    /// Persist a generation and make it the current one
    pub fn save(&self, generation: &Generation) -> Result<PathBuf> {
        let parts = generation.to_parts().ok_or_else(|| {
            SearchError::InconsistentGeneration("cannot persist an unbuilt generation".into())
        })?;
        let id = parts.manifest.id.clone();
        let final_dir = self.generation_dir(&id);
        let staging_dir = self.generations_dir().join(format!("{id}{STAGING_SUFFIX}"));

        if staging_dir.exists() {
            fs::remove_dir_all(&staging_dir)?;
        }
        fs::create_dir_all(&staging_dir)?;

        write_json(&staging_dir.join(MANIFEST_FILE), &parts.manifest)?;
        write_json(&staging_dir.join(IDS_FILE), &parts.ids)?;
        write_json(&staging_dir.join(SEMANTIC_FILE), &parts.semantic)?;
        if let Some(lexical) = &parts.lexical {
            write_json(&staging_dir.join(LEXICAL_FILE), lexical)?;
        }
        write_json(&staging_dir.join(KEYWORDS_FILE), &parts.keywords)?;

        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&staging_dir, &final_dir)?;
        self.write_current(&id)?;
        info!("Persisted generation {} to {:?}", id, final_dir);

        if let Err(e) = self.prune(&id) {
            warn!("Failed to prune old generations: {}", e);
        }
        Ok(final_dir)
    }

    fn write_current(&self, id: &str) -> Result<()> {
        let path = self.base_dir.join(CURRENT_FILE);
        let tmp_path = self.base_dir.join(format!("{CURRENT_FILE}{STAGING_SUFFIX}"));
        {
            let mut file = File::create(&tmp_path)?;
            writeln!(file, "{id}")?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Id of the published generation, if any
    pub fn current_id(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.base_dir.join(CURRENT_FILE)) {
            Ok(raw) => {
                let id = raw.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load and validate the published generation
    pub fn load_current(&self) -> Result<Option<Generation>> {
        match self.current_id()? {
            Some(id) => self.load(&id).map(Some),
            None => Ok(None),
        }
    }

    /// Load and validate one generation by id
    pub fn load(&self, id: &str) -> Result<Generation> {
        let dir = self.generation_dir(id);
        if !dir.is_dir() {
            return Err(SearchError::InconsistentGeneration(format!(
                "generation {id} not found in {:?}",
                self.generations_dir()
            )));
        }

        let manifest: GenerationManifest = read_json(&dir.join(MANIFEST_FILE))?;
        if manifest.id != id {
            return Err(SearchError::InconsistentGeneration(format!(
                "manifest id {} does not match directory {id}",
                manifest.id
            )));
        }
        let lexical_path = dir.join(LEXICAL_FILE);
        let lexical = if lexical_path.exists() {
            Some(read_json(&lexical_path)?)
        } else {
            None
        };
        if manifest.lexical_available && lexical.is_none() {
            return Err(SearchError::InconsistentGeneration(format!(
                "generation {id} is missing its lexical model"
            )));
        }

        let generation = Generation::new(GenerationParts {
            manifest,
            ids: read_json(&dir.join(IDS_FILE))?,
            semantic: read_json(&dir.join(SEMANTIC_FILE))?,
            lexical,
            keywords: read_json(&dir.join(KEYWORDS_FILE))?,
        })?;
        debug!("Loaded generation {} ({} documents)", id, generation.len());
        Ok(generation)
    }

    /// Complete generations on disk, oldest first
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.generations_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut ids = vec![];
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.ends_with(STAGING_SUFFIX) {
                    ids.push(name.to_string());
                }
            }
        }
        // Ids start with a UTC timestamp
        ids.sort();
        Ok(ids)
    }

    /// Remove abandoned staging directories and generations beyond the keep count
    pub fn prune(&self, current: &str) -> Result<Vec<String>> {
        let dir = self.generations_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_staging = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(STAGING_SUFFIX));
            if is_staging && path.is_dir() {
                debug!("Removing abandoned staging directory {:?}", path);
                fs::remove_dir_all(&path)?;
            }
        }

        let ids = self.list()?;
        let mut kept = 0;
        let mut removed = vec![];
        for id in ids.iter().rev() {
            if id == current || kept < self.keep.saturating_sub(1) {
                if id != current {
                    kept += 1;
                }
                continue;
            }
            fs::remove_dir_all(self.generation_dir(id))?;
            removed.push(id.clone());
        }
        if !removed.is_empty() {
            info!("Pruned {} old generation(s)", removed.len());
        }
        Ok(removed)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        SearchError::InconsistentGeneration(format!("cannot open {:?}: {e}", path))
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::search::embedding::HashingEmbedder;
    use crate::search::indexer::GenerationBuilder;
    use crate::search::types::ProfileDocument;
    use tempfile::TempDir;

    fn build(texts: &[(&str, &str)]) -> Generation {
        let embedder = HashingEmbedder::new(16);
        let config = EngineConfig::default();
        let docs = texts
            .iter()
            .map(|(id, text)| ProfileDocument::new(*id, *text).with_keywords(*text))
            .collect();
        GenerationBuilder::new(&embedder, &config)
            .build(docs)
            .unwrap()
            .0
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = GenerationStore::new(temp.path());
        let generation = build(&[("a", "steel bridge"), ("b", "glass facade")]);
        let id = generation.generation_id().unwrap().to_string();

        store.save(&generation).unwrap();
        assert_eq!(store.current_id().unwrap(), Some(id.clone()));

        let loaded = store.load_current().unwrap().unwrap();
        assert_eq!(loaded.generation_id(), Some(id.as_str()));
        assert_eq!(loaded.ids(), generation.ids());
        assert_eq!(loaded.semantic(), generation.semantic());
        assert!(loaded.lexical_available());
        assert_eq!(loaded.keywords(), generation.keywords());
        assert!(!temp.path().join("CURRENT.tmp").exists());
    }

    #[test]
    fn test_missing_store_has_no_current() {
        let temp = TempDir::new().unwrap();
        let store = GenerationStore::new(temp.path().join("never-written"));
        assert!(store.load_current().unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_lexical_artifact_is_optional() {
        let temp = TempDir::new().unwrap();
        let store = GenerationStore::new(temp.path());
        let generation = build(&[("a", "steel bridge")]).without_lexical();
        let dir = store.save(&generation).unwrap();

        assert!(!dir.join(LEXICAL_FILE).exists());
        assert!(!store.load_current().unwrap().unwrap().lexical_available());
    }

    #[test]
    fn test_corrupt_artifact_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = GenerationStore::new(temp.path());
        let dir = store.save(&build(&[("a", "steel"), ("b", "glass")])).unwrap();

        fs::write(dir.join(IDS_FILE), r#"["a"]"#).unwrap();
        assert!(matches!(
            store.load_current(),
            Err(SearchError::InconsistentGeneration(_))
        ));
    }

    #[test]
    fn test_prune_keeps_newest() {
        let temp = TempDir::new().unwrap();
        let store = GenerationStore::new(temp.path()).with_keep(2);
        fs::create_dir_all(temp.path().join(GENERATIONS_DIR).join("19990101T000000-dead.tmp"))
            .unwrap();

        let mut saved = vec![];
        for text in ["masonry", "roofing", "glazing"] {
            let generation = build(&[("a", text)]);
            saved.push(generation.generation_id().unwrap().to_string());
            store.save(&generation).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(1100));
        }

        let remaining = store.list().unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&saved[2]));
        assert!(remaining.contains(&saved[1]));
        assert!(!temp
            .path()
            .join(GENERATIONS_DIR)
            .join("19990101T000000-dead.tmp")
            .exists());
    }

    #[test]
    fn test_unbuilt_generation_cannot_be_saved() {
        let temp = TempDir::new().unwrap();
        let store = GenerationStore::new(temp.path());
        assert!(store.save(&Generation::empty()).is_err());
    }
}
