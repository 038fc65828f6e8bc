use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assignment_poller::config::Config;
use assignment_poller::gmail_client::GmailClient;
use assignment_poller::notion_client::NotionClient;
use assignment_poller::service;

#[derive(Parser)]
#[command(name = "assignment-poller")]
#[command(about = "Polls a mailbox for assignment notifications and files them as tasks")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Run a single sync cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assignment_poller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    std::fs::create_dir_all(&config.data_dir)?;

    let token = std::env::var("NOTION_TOKEN").context("NOTION_TOKEN must be set")?;
    let notion = NotionClient::new(token);

    if cli.once {
        let gmail = GmailClient::connect(&config.gmail).await?;
        service::run_sync_cycle(&config, &gmail, &notion).await?;
        return Ok(());
    }

    tracing::info!(
        "Starting assignment poller (interval: {}s)",
        config.poll_interval_secs
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));

    loop {
        ticker.tick().await;

        // Fresh mailbox handle per cycle; auth state lives in the token cache
        match GmailClient::connect(&config.gmail).await {
            Ok(gmail) => {
                if let Err(e) = service::run_sync_cycle(&config, &gmail, &notion).await {
                    tracing::error!("Sync cycle failed: {:?}", e);
                }
            }
            Err(e) => {
                tracing::error!("Mailbox connection failed: {:?}", e);
            }
        }
    }
}
