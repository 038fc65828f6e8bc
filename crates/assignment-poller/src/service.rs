//! One sync cycle: decide whether to refetch, extract assignments from
//! matching messages, and submit the ones not seen before.

use anyhow::Result;
use chrono::Utc;
use std::time::Duration;

use crate::activities::{self, Activity};
use crate::config::Config;
use crate::dedup::{identity_key, SubmittedCache};
use crate::extractor::Extractor;
use crate::gmail_client::{GmailClient, RawMessage};
use crate::notion_client::{NotionClient, TaskRecord};
use crate::processor::build_task_record;
use crate::sync::{needs_full_fetch, Snapshot};

/// Counters reported at the end of every run.
#[derive(Debug, Default)]
pub struct RunStats {
    /// Messages available after the sync decision (fetched or reused)
    pub fetched: usize,
    /// Messages passing the sender/subject filter
    pub matched: usize,
    /// Candidate tasks not found in the submitted cache
    pub new: usize,
    pub submitted: usize,
    pub failed: usize,
}

pub async fn run_sync_cycle(
    config: &Config,
    gmail: &GmailClient,
    notion: &NotionClient,
) -> Result<RunStats> {
    let mut stats = RunStats::default();

    let messages = refresh_messages(config, gmail).await?;
    stats.fetched = messages.len();

    let matching: Vec<RawMessage> = messages
        .into_iter()
        .filter(|m| m.matches_filter(&config.filter))
        .collect();
    stats.matched = matching.len();

    let activities = activities::load_activities(&config.activities_path())?;

    let candidates = extract_candidates(
        &matching,
        &activities,
        &config.notion.tasks_database_id,
        config.assumed_due_year,
    )?;

    let mut cache = SubmittedCache::load(&config.submitted_path());
    let new_records = cache.filter_new(candidates);
    stats.new = new_records.len();

    for record in &new_records {
        let key = identity_key(record);
        if cache.contains(&key) {
            // Same assignment appeared twice in one batch
            continue;
        }

        match notion.create_page(record).await {
            Ok(page) => {
                tracing::info!("Created task '{}' (page {})", record.title(), page.id);
                // Commit per item, before touching the next one, so a later
                // failure cannot cause this one to be resubmitted
                cache.record(key)?;
                stats.submitted += 1;
            }
            Err(e) => {
                tracing::error!("Failed to create task '{}': {}", record.title(), e);
                stats.failed += 1;
            }
        }
    }

    tracing::info!(
        "Sync cycle done: {} fetched, {} matched filter, {} new, {} submitted, {} failed",
        stats.fetched,
        stats.matched,
        stats.new,
        stats.submitted,
        stats.failed
    );

    Ok(stats)
}

/// Reuse the previous snapshot when the probe shows nothing new; otherwise
/// run a full fetch and overwrite it.
async fn refresh_messages(config: &Config, gmail: &GmailClient) -> Result<Vec<RawMessage>> {
    let snapshot_path = config.snapshot_path();
    let snapshot = Snapshot::load(&snapshot_path);
    let retry_delay = Duration::from_secs(config.fetch_retry_delay_secs);

    let probe_ids = gmail
        .list_message_ids(config.probe_count, config.fetch_retries, retry_delay)
        .await?;

    if !needs_full_fetch(&probe_ids, &snapshot) {
        tracing::info!(
            "Probe ids all present in snapshot; reusing {} cached messages",
            snapshot.messages.len()
        );
        return Ok(snapshot.messages);
    }

    tracing::info!("Mailbox changed; running full fetch (cap {})", config.max_fetch);
    let ids = gmail
        .list_message_ids(config.max_fetch, config.fetch_retries, retry_delay)
        .await?;
    let mut messages = Vec::with_capacity(ids.len());
    for id in &ids {
        match gmail.get_message(id, config.fetch_retries, retry_delay).await {
            Ok(message) => messages.push(message),
            Err(e) => {
                // One lost message must not abort the batch; it will be
                // retried naturally on the next changed-mailbox fetch
                tracing::error!("Giving up on message {}: {}", id, e);
            }
        }
    }

    let snapshot = Snapshot {
        fetched_at: Some(Utc::now()),
        messages,
    };
    snapshot.save(&snapshot_path)?;

    Ok(snapshot.messages)
}

/// Extract an assignment from every message body and build its create-task
/// payload. Messages without an HTML part are skipped.
pub fn extract_candidates(
    messages: &[RawMessage],
    activities: &[Activity],
    database_id: &str,
    assumed_year: i32,
) -> Result<Vec<TaskRecord>> {
    let extractor = Extractor::new()?;
    let mut candidates = Vec::new();

    for message in messages {
        let Some(html) = message.html_body() else {
            tracing::debug!("Message {} has no HTML body part; skipping", message.id);
            continue;
        };
        let assignment = extractor.extract(&html);
        candidates.push(build_task_record(
            &assignment,
            activities,
            database_id,
            assumed_year,
        ));
    }

    Ok(candidates)
}
