use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tally::analytics::{expected_bucket_count, AnalyticsEngine, AnalyticsRequest, Level};
use tally::config::Config;
use tally::storage;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tally-admin")]
#[command(about = "Tally analytics admin CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct WindowArgs {
    /// Window start (RFC 3339)
    #[arg(long)]
    start: String,
    /// Window end (RFC 3339), exclusive
    #[arg(long)]
    end: String,
    /// Offset from UTC in hours, used for day boundaries
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    utc_offset_hours: f64,
}

impl WindowArgs {
    fn request(&self) -> Result<AnalyticsRequest> {
        let start = parse_instant(&self.start).context("invalid --start")?;
        let end = parse_instant(&self.end).context("invalid --end")?;
        Ok(AnalyticsRequest::new(start, end)?.with_utc_offset_hours(self.utc_offset_hours)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the events schema
    Init,
    /// Show granularity and aligned window without querying the store
    Plan {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Run a bucketed query and print the JSON response
    Query {
        #[command(flatten)]
        window: WindowArgs,
        /// Comma-separated levels (default: all)
        #[arg(long)]
        levels: Option<String>,
    },
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tally=warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let config = Config::from_env()?;
            let store = storage::connect(&config).await?;
            store.init().await?;
            println!("✓ Schema initialized at {}", config.database.url);
        }
        Commands::Plan { window } => {
            let request = window.request()?;
            let aligned = AnalyticsEngine::plan(&request);
            let unaligned = expected_bucket_count(
                request.window.start,
                request.window.end,
                aligned.granularity,
            );

            println!("{:<18} {}", "Granularity", aligned.granularity);
            println!("{:<18} {}", "Aligned start", aligned.start.to_rfc3339());
            println!("{:<18} {}", "Aligned end", aligned.end.to_rfc3339());
            println!("{:<18} {}", "Buckets", aligned.bucket_count());
            println!("{:<18} {}", "Unaligned buckets", unaligned);
        }
        Commands::Query { window, levels } => {
            let levels = match levels.as_deref() {
                Some(raw) => Level::parse_list(raw)?,
                None => Vec::new(),
            };
            let request = window.request()?.with_levels(levels);

            let config = Config::from_env()?;
            let store = storage::connect(&config).await?;
            let engine = AnalyticsEngine::new(store, config.analytics.limits());

            let response = engine.query(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
