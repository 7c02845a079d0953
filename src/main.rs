use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use billwatch::{
    config, logging,
    processing::EnrichmentPipeline,
    qdrant::QdrantIndex,
    source::GovInfoClient,
    storage::BillStore,
    summarization::get_summarizer,
    sweeper,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "billwatch",
    about = "Ingest bulk legislative bill documents and keep the semantic index consistent"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one discovery and enrichment pass.
    Enrich,
    /// Delete semantic index entries whose bill no longer exists.
    SweepIndex,
    /// Delete version records whose bill no longer exists.
    SweepVersions,
}

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();
    if let Err(err) = run(Cli::parse()).await {
        tracing::error!(error = %format!("{err:#}"), "Run failed");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::get_config();
    let store = BillStore::open(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path))?;

    match cli.command {
        Command::Enrich => {
            let source = GovInfoClient::from_config().context("building bulk data client")?;
            let summarizer = get_summarizer().context("building summarizer")?;
            let index = QdrantIndex::connect()
                .await
                .context("connecting to the semantic index")?;
            let pipeline = EnrichmentPipeline::new(
                source,
                store,
                Arc::from(summarizer),
                Arc::new(index),
                config.pipeline_settings(),
            );

            let cancellation = pipeline.cancellation_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received; stopping after the current batch");
                    cancellation.cancel();
                }
            });

            let report = pipeline.discover_and_enrich().await?;
            tracing::info!(report = ?report, "Enrichment run complete");
        }
        Command::SweepIndex => {
            let index = QdrantIndex::connect()
                .await
                .context("connecting to the semantic index")?;
            let grace = Duration::from_secs(config.sweep_grace_secs);
            let report = sweeper::sweep_index(&index, &store, grace).await?;
            tracing::info!(report = ?report, "Index sweep complete");
        }
        Command::SweepVersions => {
            let report = sweeper::sweep_versions(&store)?;
            tracing::info!(report = ?report, "Version sweep complete");
        }
    }
    Ok(())
}
