//! One-time setup: derive activities from the external database and record
//! each activity's teacher name for later matching.
//!
//! The resulting file is read-only for the polling service; re-running the
//! bootstrap requires deleting it first.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use assignment_poller::activities::{save_activities, Activity};
use assignment_poller::config::Config;
use assignment_poller::notion_client::NotionClient;

#[derive(Parser)]
#[command(name = "bootstrap-activities")]
#[command(about = "Derives the activities file and assigns teacher names (run once)")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Status values that mark an activity as currently tracked
    #[arg(long, default_value = "In Progress")]
    status: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    std::fs::create_dir_all(&config.data_dir)?;

    let out_path = config.activities_path();
    if out_path.exists() {
        anyhow::bail!(
            "{} already exists; delete it first to re-run the bootstrap",
            out_path.display()
        );
    }

    let token = std::env::var("NOTION_TOKEN").context("NOTION_TOKEN must be set")?;
    let notion = NotionClient::new(token);

    let pages = notion
        .query_database(&config.notion.activities_database_id, &cli.status)
        .await?;

    let mut activities: Vec<Activity> = pages
        .iter()
        .filter_map(|page| {
            let title = page.title()?;
            Some(Activity {
                id: page.id.clone(),
                title,
                teacher: String::new(),
            })
        })
        .collect();

    if activities.is_empty() {
        anyhow::bail!(
            "No activities found in database {}",
            config.notion.activities_database_id
        );
    }

    println!("Assign teachers to activities:");
    let stdin = std::io::stdin();
    for activity in &mut activities {
        print!(
            "Enter teacher name for '{}' (or press Enter to skip): ",
            activity.title
        );
        std::io::stdout().flush()?;

        let mut line = String::new();
        stdin.read_line(&mut line)?;
        activity.teacher = line.trim().to_string();
    }

    save_activities(&out_path, &activities)?;
    println!("Activities with teachers saved to {}", out_path.display());

    Ok(())
}
