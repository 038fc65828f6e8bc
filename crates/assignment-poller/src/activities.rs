//! Activities and the posted-by → activity matcher.
//!
//! Activities are derived once by the bootstrap binary and read from a local
//! JSON artifact on every run; the service never writes it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A tracked record in the external database that an assignment can be
/// linked to, with its one-time assigned teacher name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub teacher: String,
}

/// Load the activities artifact. A missing file is not an error: the run
/// proceeds with nothing to match and every assignment stays unassigned.
pub fn load_activities(path: &Path) -> Result<Vec<Activity>> {
    if !path.exists() {
        tracing::warn!(
            "Activities file {} not found; run bootstrap-activities to create it",
            path.display()
        );
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let activities: Vec<Activity> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::debug!("Loaded {} activities from {}", activities.len(), path.display());
    Ok(activities)
}

/// Write the activities artifact (bootstrap only).
pub fn save_activities(path: &Path, activities: &[Activity]) -> Result<()> {
    let json = serde_json::to_string_pretty(activities)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Resolve a posted-by display name to an activity id.
///
/// Three tiers, first success wins: exact teacher match, substring
/// containment in either direction, then any shared whitespace token. All
/// comparisons are case-insensitive. Activities without a teacher name never
/// match; no match at all means the assignment stays unassigned.
pub fn match_to_activity(posted_by: &str, activities: &[Activity]) -> Option<String> {
    let posted_by = posted_by.to_lowercase();
    if posted_by.is_empty() {
        return None;
    }

    for activity in activities {
        let teacher = activity.teacher.to_lowercase();
        if teacher.is_empty() {
            continue;
        }
        if teacher == posted_by {
            return Some(activity.id.clone());
        }
    }

    for activity in activities {
        let teacher = activity.teacher.to_lowercase();
        if teacher.is_empty() {
            continue;
        }
        if teacher.contains(&posted_by) || posted_by.contains(&teacher) {
            return Some(activity.id.clone());
        }
    }

    let posted_words: Vec<&str> = posted_by.split_whitespace().collect();
    for activity in activities {
        let teacher = activity.teacher.to_lowercase();
        if teacher.is_empty() {
            continue;
        }
        let teacher_words: Vec<&str> = teacher.split_whitespace().collect();
        if posted_words.iter().any(|word| teacher_words.contains(word)) {
            return Some(activity.id.clone());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(id: &str, teacher: &str) -> Activity {
        Activity {
            id: id.to_string(),
            title: format!("Activity {}", id),
            teacher: teacher.to_string(),
        }
    }

    #[test]
    fn exact_match_beats_substring_match() {
        // The substring candidate comes first; the exact tier must still win.
        let activities = vec![
            activity("substring", "Jane Smith (Mathematics)"),
            activity("exact", "Jane Smith"),
        ];

        assert_eq!(
            match_to_activity("Jane Smith", &activities).as_deref(),
            Some("exact")
        );
    }

    #[test]
    fn substring_match_beats_word_overlap() {
        let activities = vec![
            activity("overlap", "Smith Robertson"),
            activity("substring", "Ms. Jane Smith"),
        ];

        // "jane smith" is contained in "ms. jane smith"; the word-overlap
        // candidate earlier in the list must not be chosen.
        assert_eq!(
            match_to_activity("Jane Smith", &activities).as_deref(),
            Some("substring")
        );
    }

    #[test]
    fn word_overlap_matches_any_shared_token() {
        let activities = vec![activity("history", "Doe Robertson")];

        assert_eq!(
            match_to_activity("Jane Doe", &activities).as_deref(),
            Some("history")
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let activities = vec![activity("math", "JANE SMITH")];

        assert_eq!(
            match_to_activity("jane smith", &activities).as_deref(),
            Some("math")
        );
    }

    #[test]
    fn no_match_returns_none() {
        let activities = vec![activity("math", "Jane Smith")];

        assert_eq!(match_to_activity("Alex Johnson", &activities), None);
    }

    #[test]
    fn empty_teacher_never_matches() {
        // An empty teacher string is a substring of every poster; it must be
        // skipped rather than matched.
        let activities = vec![activity("unassigned", "")];

        assert_eq!(match_to_activity("Jane Smith", &activities), None);
    }

    #[test]
    fn empty_posted_by_never_matches() {
        let activities = vec![activity("math", "Jane Smith")];

        assert_eq!(match_to_activity("", &activities), None);
    }

    #[test]
    fn store_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activities.json");

        assert!(load_activities(&path).unwrap().is_empty());

        let activities = vec![activity("math", "Jane Smith")];
        save_activities(&path, &activities).unwrap();

        let loaded = load_activities(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "math");
        assert_eq!(loaded[0].teacher, "Jane Smith");
    }
}
