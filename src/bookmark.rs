//! Bookmark persistence for workflow results.
//!
//! JSON-file store keyed by bookmark id. List ordering is unspecified.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::Result;
use crate::novelty::jaccard_similarity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub id: String,
    pub text: String,
    pub topic: String,
    pub context: String,
    pub score: i32,
    pub critique: String,
    #[serde(default)]
    pub advocacy: String,
    #[serde(default)]
    pub skepticism: String,
    pub bookmarked_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub struct BookmarkStore {
    path: PathBuf,
}

impl BookmarkStore {
    /// Store at the default location under the user's data directory.
    pub fn new() -> Self {
        let path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("madspark")
            .join("bookmarks.json");
        Self { path }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<HashMap<String, BookmarkRecord>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn persist(&self, records: &HashMap<String, BookmarkRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(records)?)?;
        Ok(())
    }

    /// Save a record, assigning an id when one is missing. Returns the id.
    pub fn save(&self, mut record: BookmarkRecord) -> Result<String> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let id = record.id.clone();
        let mut records = self.load()?;
        records.insert(id.clone(), record);
        self.persist(&records)?;
        Ok(id)
    }

    pub fn list(&self) -> Result<Vec<BookmarkRecord>> {
        Ok(self.load()?.into_values().collect())
    }

    /// Delete by id. Returns true when a record was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut records = self.load()?;
        let removed = records.remove(id).is_some();
        if removed {
            self.persist(&records)?;
        }
        Ok(removed)
    }

    /// Bookmarks whose text is similar to the given idea for the same topic.
    pub fn find_similar(&self, text: &str, topic: &str, threshold: f64) -> Result<Vec<BookmarkRecord>> {
        let records = self.load()?;
        Ok(records
            .into_values()
            .filter(|record| {
                record.topic == topic && jaccard_similarity(&record.text, text) >= threshold
            })
            .collect())
    }
}

impl Default for BookmarkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record(text: &str, topic: &str) -> BookmarkRecord {
        BookmarkRecord {
            id: String::new(),
            text: text.to_string(),
            topic: topic.to_string(),
            context: "low budget".to_string(),
            score: 8,
            critique: "promising".to_string(),
            advocacy: String::new(),
            skepticism: String::new(),
            bookmarked_at: Utc::now(),
            tags: vec!["transport".to_string()],
        }
    }

    #[test]
    fn test_save_list_delete_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = BookmarkStore::with_path(dir.path().join("bookmarks.json"));

        let id = store.save(sample_record("solar bus", "transport")).unwrap();
        assert!(!id.is_empty());
        assert_eq!(store.list().unwrap().len(), 1);

        assert!(store.delete(&id).unwrap());
        assert!(store.list().unwrap().is_empty());
        assert!(!store.delete(&id).unwrap());
    }

    #[test]
    fn test_find_similar_respects_topic_and_threshold() {
        let dir = TempDir::new().unwrap();
        let store = BookmarkStore::with_path(dir.path().join("bookmarks.json"));

        store
            .save(sample_record("solar powered bus network", "transport"))
            .unwrap();
        store
            .save(sample_record("solar powered bus network", "energy"))
            .unwrap();

        let similar = store
            .find_similar("solar powered bus network", "transport", 0.8)
            .unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].topic, "transport");

        let dissimilar = store
            .find_similar("underground mushroom farms", "transport", 0.8)
            .unwrap();
        assert!(dissimilar.is_empty());
    }
}
