use anyhow::{Context, Result};
use clap::Parser;
use docdigest::{
    config,
    dataset::Dataset,
    extract::SniffingExtractor,
    fetch::{HttpFetcher, RetryPolicy},
    logging::{self, ConsoleTarget},
    processing::{IngestionService, PipelineOptions, StageRunner, cancellation},
    store::{JsonFileRecordStore, RecordStore},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "docdigest",
    about = "Fetch, summarize, and tag every document in a dataset"
)]
struct Cli {
    /// JSON object mapping document names to source URLs.
    dataset: PathBuf,
    /// Directory receiving fetched document bytes.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// JSON file backing the record store.
    #[arg(long)]
    store: Option<PathBuf>,
    /// Maximum documents processed concurrently.
    #[arg(long)]
    workers: Option<usize>,
    /// Keywords extracted per document.
    #[arg(long)]
    keywords: Option<usize>,
    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing(if cli.json {
        ConsoleTarget::Stderr
    } else {
        ConsoleTarget::Stdout
    });

    if let Err(err) = run(cli).await {
        tracing::error!(error = %format!("{err:#}"), "Ingestion run failed");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::get_config().clone();
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(store_path) = cli.store {
        config.store_path = store_path;
    }
    if let Some(workers) = cli.workers {
        config.workers = Some(workers);
    }
    if let Some(keywords) = cli.keywords {
        config.keyword_count = keywords;
    }
    config.log_effective();

    let dataset = Dataset::load(&cli.dataset)
        .await
        .context("failed to load dataset")?;
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create output directory {}",
                config.output_dir.display()
            )
        })?;

    let store = Arc::new(
        JsonFileRecordStore::open(&config.store_path)
            .await
            .context("failed to open record store")?,
    );
    let fetcher = HttpFetcher::new(
        Duration::from_secs(config.fetch_timeout_secs),
        RetryPolicy {
            max_retries: config.fetch_retries,
            base_delay: Duration::from_millis(config.fetch_backoff_ms),
        },
    )
    .context("failed to build HTTP client")?;

    let runner = StageRunner::new(
        Arc::new(fetcher),
        Arc::new(SniffingExtractor),
        store.clone(),
        PipelineOptions::from(&config),
    );
    let service = IngestionService::new(runner, config.worker_count());

    let (cancel, signal) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight documents");
            cancel.cancel();
        }
    });

    let report = service
        .run_with_cancel(&dataset, &config.output_dir, signal)
        .await;
    store.close().await.context("failed to flush record store")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to encode report")?
        );
    } else {
        print!("{report}");
    }
    Ok(())
}
