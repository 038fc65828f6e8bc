//! File-backed record of already-submitted assignments.
//!
//! The external database assigns a fresh opaque id on every create, so
//! deduplication keys off the task content itself. Entries are never pruned;
//! the file grows by one line per submitted assignment.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::notion_client::TaskRecord;

/// Identity key for a task that has no external id yet, stable across runs
/// as long as re-extraction yields the same title and link.
pub fn identity_key(record: &TaskRecord) -> String {
    format!("{}|{}", record.title(), record.link())
}

#[derive(Debug)]
pub struct SubmittedCache {
    path: PathBuf,
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl SubmittedCache {
    /// Load the cache, treating a missing or corrupt file as empty.
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        "Submitted cache {} is corrupt ({}); starting empty",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keep only candidates whose identity key has not been recorded yet.
    pub fn filter_new(&self, candidates: Vec<TaskRecord>) -> Vec<TaskRecord> {
        candidates
            .into_iter()
            .filter(|record| !self.contains(&identity_key(record)))
            .collect()
    }

    /// Record one submitted key and persist immediately, so a failure later
    /// in the batch cannot lose it.
    pub fn record(&mut self, key: String) -> Result<()> {
        self.entries.insert(key, Utc::now());
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractedAssignment;
    use crate::processor::build_task_record;

    fn record(name: &str, link: &str) -> TaskRecord {
        let assignment = ExtractedAssignment {
            assignment_name: name.to_string(),
            assignment_link: link.to_string(),
            class_link: "Not found".to_string(),
            class_name: "Not found".to_string(),
            assignment_description: "Not found".to_string(),
            due_date: "Not found".to_string(),
            posted_date: "Not found".to_string(),
            posted_by: "Not found".to_string(),
        };
        build_task_record(&assignment, &[], "db", 2024)
    }

    #[test]
    fn filter_drops_recorded_items_and_keeps_new_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submitted.json");

        let x = record("Essay 1", "https://classroom.google.com/c/1/a/1");
        let y = record("Essay 2", "https://classroom.google.com/c/1/a/2");

        let mut cache = SubmittedCache::load(&path);
        cache.record(identity_key(&x)).unwrap();

        let new = cache.filter_new(vec![x, y]);
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].title(), "Essay 2");
    }

    #[test]
    fn recorded_keys_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submitted.json");

        let x = record("Essay 1", "https://classroom.google.com/c/1/a/1");
        let key = identity_key(&x);

        let mut cache = SubmittedCache::load(&path);
        assert!(cache.is_empty());
        cache.record(key.clone()).unwrap();

        let reloaded = SubmittedCache::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains(&key));
    }

    #[test]
    fn corrupt_cache_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submitted.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = SubmittedCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn same_content_yields_same_key_different_content_does_not() {
        let a = record("Essay 1", "https://classroom.google.com/c/1/a/1");
        let b = record("Essay 1", "https://classroom.google.com/c/1/a/1");
        let c = record("Essay 1", "https://classroom.google.com/c/1/a/2");

        assert_eq!(identity_key(&a), identity_key(&b));
        assert_ne!(identity_key(&a), identity_key(&c));
    }
}
