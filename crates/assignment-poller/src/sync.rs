//! Snapshot persistence and the full-refetch decision.
//!
//! A run starts with a cheap probe (a handful of the most recent message
//! ids). If the last persisted snapshot already contains every probe id,
//! nothing new has arrived and the snapshot is reused, skipping the
//! per-message detail fetches entirely.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::gmail_client::RawMessage;

/// Last full mailbox fetch, persisted between runs for change detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

impl Snapshot {
    /// Load the snapshot, treating a missing or corrupt file as empty.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(
                        "Snapshot {} is corrupt ({}); treating as empty",
                        path.display(),
                        e
                    );
                    Snapshot::default()
                }
            },
            Err(_) => Snapshot::default(),
        }
    }

    /// Persist, fully overwriting the previous snapshot.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn message_ids(&self) -> HashSet<&str> {
        self.messages.iter().map(|m| m.id.as_str()).collect()
    }
}

/// Decide whether the cached snapshot still reflects the mailbox. Any probe
/// id missing from the snapshot means new mail arrived; an empty or missing
/// snapshot always forces a full fetch.
pub fn needs_full_fetch(probe_ids: &[String], snapshot: &Snapshot) -> bool {
    if snapshot.is_empty() {
        return true;
    }

    let known = snapshot.message_ids();
    probe_ids.iter().any(|id| !known.contains(id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail_client::MessagePart;

    fn message(id: &str) -> RawMessage {
        RawMessage {
            id: id.to_string(),
            headers: Default::default(),
            payload: MessagePart::default(),
        }
    }

    fn snapshot(ids: &[&str]) -> Snapshot {
        Snapshot {
            fetched_at: Some(Utc::now()),
            messages: ids.iter().map(|id| message(id)).collect(),
        }
    }

    fn probe(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn known_probe_ids_reuse_snapshot() {
        let snapshot = snapshot(&["a", "b", "c"]);
        assert!(!needs_full_fetch(&probe(&["a", "b"]), &snapshot));
    }

    #[test]
    fn unknown_probe_id_forces_full_fetch() {
        let snapshot = snapshot(&["a", "b", "c"]);
        assert!(needs_full_fetch(&probe(&["a", "d"]), &snapshot));
    }

    #[test]
    fn empty_snapshot_forces_full_fetch() {
        assert!(needs_full_fetch(&probe(&["a"]), &Snapshot::default()));
        // Even an empty probe cannot validate a snapshot that has nothing
        assert!(needs_full_fetch(&probe(&[]), &Snapshot::default()));
    }

    #[test]
    fn empty_probe_keeps_nonempty_snapshot() {
        let snapshot = snapshot(&["a"]);
        assert!(!needs_full_fetch(&probe(&[]), &snapshot));
    }

    #[test]
    fn snapshot_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let original = snapshot(&["a", "b"]);
        original.save(&path).unwrap();

        let loaded = Snapshot::load(&path);
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[0].id, "a");
        assert!(loaded.fetched_at.is_some());
    }

    #[test]
    fn missing_or_corrupt_snapshot_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();

        let missing = Snapshot::load(&dir.path().join("nope.json"));
        assert!(missing.is_empty());

        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "[[[").unwrap();
        let corrupt = Snapshot::load(&path);
        assert!(corrupt.is_empty());
    }
}
