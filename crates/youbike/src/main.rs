use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use youbike_bucket::{BucketStore, MemoryBucketStore};
use youbike_core::fetch::FileCsvSource;
use youbike_core::logging::{default_filter, json_subscriber};
use youbike_core::partition::{Layout, DEFAULT_CHUNK_SIZE};
use youbike_core::publish::Publisher;
use youbike_core::settings::{DEFAULT_KEY_PREFIX, DEFAULT_PUBLIC_BASE_URL};
use youbike_core::{Pipeline, PipelineOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Publishes YouBike stations as KML", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, convert and upload once, configured from the environment
    Run,
    /// Convert a local CSV file into the published documents on disk
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Station CSV to convert
    #[arg(short, long)]
    input: PathBuf,
    /// Directory the documents are written under, keyed like the bucket
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,
    #[arg(long, default_value_t = Layout::ByPart)]
    layout: Layout,
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
    #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
    key_prefix: String,
    /// Base URL written into the index documents
    #[arg(long, default_value = DEFAULT_PUBLIC_BASE_URL)]
    public_base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing::subscriber::set_global_default(json_subscriber(std::io::stdout, default_filter()))
        .context("failed to install the log subscriber")?;

    let cli = Cli::parse();

    match cli.command {
        Command::Run => {
            // Failures are already logged; the scheduler only sees a finished run.
            if let Some(report) = youbike_core::cron().await {
                info!(
                    run_id = %report.run_id,
                    stations = report.station_count,
                    chunks = report.published.len(),
                    "Run finished"
                );
            }
            Ok(())
        }
        Command::Render(args) => render(args).await,
    }
}

async fn render(args: RenderArgs) -> Result<()> {
    let store = Arc::new(MemoryBucketStore::new("local"));
    let publisher = Publisher::new(
        store.clone() as Arc<dyn BucketStore>,
        args.public_base_url.as_str(),
    );
    let options = PipelineOptions {
        layout: args.layout,
        chunk_size: args.chunk_size,
        key_prefix: args.key_prefix.trim_matches('/').to_string(),
        allow_partial_index: false,
    };
    let pipeline = Pipeline::new(
        Arc::new(FileCsvSource::new(&args.input)),
        Arc::new(publisher),
        options,
    );

    let report = pipeline
        .run()
        .await
        .with_context(|| format!("failed to render {}", args.input.display()))?;

    for key in store.keys() {
        let object = store
            .get(&key)
            .with_context(|| format!("{key} vanished from the local store"))?;
        let path = args.out_dir.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, object.decoded()?)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "Wrote document");
    }

    println!("{}", serde_json::to_string_pretty(&report.summary())?);
    Ok(())
}
