use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dishmark_client::{
    ApifyConfig, ApifyPhotoSource, DifyAnalyzer, DifyConfig, GooglePlacesClient, PlacesConfig,
};
use dishmark_core::config::{DEFAULT_BATCH_PREFIX, DEFAULT_BATCH_SIZE};
use dishmark_core::report;
use dishmark_core::source::discover_sources;
use dishmark_core::throttle::{ThrottleConfig, ThrottledAnalyzer};
use dishmark_core::{
    BatchProcessor, DishClassifier, HarvestConfig, HarvestService, NearbyQuery, PipelineConfig,
    TracingPipelineReporter,
};

#[derive(Parser)]
#[command(
    name = "dishmark",
    version,
    about = "Collect restaurant photos and mark the ones showing dishes"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find restaurants around a point and save their photo URLs
    Harvest(HarvestArgs),

    /// Classify harvested photos and build knowledge base batches
    Mark(MarkArgs),
}

#[derive(Args)]
struct HarvestArgs {
    /// Latitude of the search center
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    /// Longitude of the search center
    #[arg(long, allow_negative_numbers = true)]
    lng: f64,

    /// Search radius in meters
    #[arg(long, default_value_t = 1000.0)]
    radius: f64,

    /// Maximum number of restaurants returned by the search
    #[arg(long, default_value_t = 20)]
    max_results: u32,

    /// Directory for the listing file and its summary
    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Pause between restaurants, in milliseconds
    #[arg(long, default_value_t = 2000)]
    delay_ms: u64,

    #[arg(long, env = "GOOGLE_MAPS_API_KEY", hide_env_values = true)]
    google_api_key: String,

    #[arg(long, env = "APIFY_TOKEN", hide_env_values = true)]
    apify_token: String,
}

#[derive(Args)]
struct MarkArgs {
    /// Directory holding harvested listing files (*.json)
    #[arg(long, default_value = "outputs")]
    input_dir: PathBuf,

    /// Directory receiving knowledge base batch files
    #[arg(long, default_value = "knowledge_base")]
    kb_dir: PathBuf,

    /// Checkpoint file of processed place ids
    #[arg(long, default_value = "processed_places.json")]
    checkpoint: PathBuf,

    /// Directory for run summaries and detailed results
    #[arg(long, default_value = ".")]
    report_dir: PathBuf,

    /// Dishes per knowledge base batch file
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Minimum pause between two Dify calls, in milliseconds
    #[arg(long, default_value_t = 800)]
    delay_ms: u64,

    /// Random extra pause of up to this many milliseconds per call
    #[arg(long, default_value_t = 0)]
    jitter_ms: u64,

    /// Timeout of a single Dify call, in seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Leave restaurants with failed photos out of the checkpoint so the
    /// next run retries them. Their dishes are batched only once the retry
    /// succeeds
    #[arg(long, default_value_t = false)]
    retry_failed_parents: bool,

    /// Dify API base URL
    #[arg(long, env = "DIFY_BASE_URL", default_value = dishmark_client::dify::DEFAULT_BASE_URL)]
    dify_url: String,

    #[arg(long, env = "DIFY_TOKEN", hide_env_values = true)]
    dify_token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dishmark=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = cancel_on_ctrl_c();

    match cli.command {
        Commands::Harvest(args) => cmd_harvest(args, &cancel).await,
        Commands::Mark(args) => cmd_mark(args, &cancel).await,
    }
}

/// Token cancelled on the first Ctrl-C. Work stops at the next restaurant
/// boundary; a second Ctrl-C kills the process as usual.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing the current restaurant");
            trigger.cancel();
        }
    });
    token
}

async fn cmd_harvest(args: HarvestArgs, cancel: &CancellationToken) -> Result<()> {
    let search = GooglePlacesClient::new(PlacesConfig::new(args.google_api_key))
        .context("Failed to create Google Places client")?;
    let photos = ApifyPhotoSource::new(ApifyConfig::new(args.apify_token))
        .context("Failed to create Apify client")?;
    let config = HarvestConfig::default()
        .with_output_dir(&args.output_dir)
        .with_restaurant_delay(Duration::from_millis(args.delay_ms));

    let query = NearbyQuery {
        latitude: args.lat,
        longitude: args.lng,
        radius: args.radius,
        max_results: args.max_results,
    };

    let summary = HarvestService::new(search, photos, config)
        .run(&query, cancel)
        .await
        .context("Harvest failed")?;

    match &summary.output_file {
        Some(path) => {
            println!("Listing: {}", path.display());
            if let Some(summary_file) = &summary.summary_file {
                println!("Summary: {}", summary_file.display());
            }
            println!(
                "Restaurants: {} new, {} already saved, {} total ({} photos)",
                summary.newly_processed,
                summary.skipped,
                summary.total_restaurants,
                summary.total_photos
            );
        }
        None => println!("No restaurants found around ({}, {})", args.lat, args.lng),
    }

    Ok(())
}

async fn cmd_mark(args: MarkArgs, cancel: &CancellationToken) -> Result<()> {
    let sources = discover_sources(&args.input_dir)
        .with_context(|| format!("Failed to list {}", args.input_dir.display()))?;
    if sources.is_empty() {
        tracing::warn!(dir = %args.input_dir.display(), "No listing files found");
        return Ok(());
    }
    tracing::info!("Found {} listing files", sources.len());

    let dify = DifyAnalyzer::new(
        DifyConfig::new(args.dify_token)
            .with_base_url(args.dify_url)
            .with_timeout(Duration::from_secs(args.timeout_secs)),
    )
    .context("Failed to create Dify client")?;
    let analyzer = ThrottledAnalyzer::new(
        dify,
        ThrottleConfig::new(Duration::from_millis(args.delay_ms))
            .with_jitter(Duration::from_millis(args.jitter_ms)),
    );

    let config = PipelineConfig {
        knowledge_base_dir: args.kb_dir,
        report_dir: args.report_dir,
        checkpoint_path: args.checkpoint,
        batch_size: args.batch_size,
        batch_prefix: DEFAULT_BATCH_PREFIX.to_string(),
        checkpoint_partial_failures: !args.retry_failed_parents,
    };

    let processor = BatchProcessor::new(analyzer, DishClassifier::new(), config)
        .context("Invalid pipeline configuration")?;
    let summary = processor
        .run(&sources, cancel, &TracingPipelineReporter)
        .await
        .context("Run stopped")?;

    println!("{}", report::render_run_summary(&summary));
    Ok(())
}
