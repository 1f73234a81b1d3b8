//! qthena-select: run one Athena query and print the rows.
//!
//! Settings come from the environment (`ATHENA_*`, see `QthenaConfig::from_env`,
//! `.env` is loaded first) and can be overridden on the command line. Records
//! are printed as one JSON object per line.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use qthena::{HeaderRow, MockMode, QthenaConfig, QueryRunner, Selection};

// ── CLI ─────────────────────────────────────────────────────────────

/// Run a query against AWS Athena and print the results.
#[derive(Parser, Debug)]
#[command(name = "qthena-select", version, about)]
struct Cli {
    /// SQL to run.
    #[arg(default_value = "show databases")]
    query: String,

    #[arg(long)]
    region: Option<String>,

    /// Bucket Athena writes query results to.
    #[arg(long)]
    bucket: Option<String>,

    /// Key prefix under the bucket for query results.
    #[arg(long)]
    results_path: Option<String>,

    #[arg(long)]
    database: Option<String>,

    /// Seconds to sleep between status polls.
    #[arg(long)]
    sleep_seconds: Option<f64>,

    /// Give up after this many status polls.
    #[arg(long)]
    max_polls: Option<u32>,

    /// Named AWS credentials profile.
    #[arg(long)]
    aws_profile: Option<String>,

    /// Replay or record backend calls instead of plain live calls.
    #[arg(long, value_parser = ["playback", "record"])]
    mock_mode: Option<String>,

    #[arg(long)]
    mock_data_path: Option<PathBuf>,

    /// Print the raw result set as a table instead of JSON records.
    #[arg(long)]
    raw: bool,

    /// Drop a leading header row from the records.
    #[arg(long)]
    strip_header: bool,

    /// Follow every result page.
    #[arg(long)]
    all_pages: bool,

    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn apply(self, config: &mut QthenaConfig) -> anyhow::Result<()> {
        if let Some(v) = self.region {
            config.region = v;
        }
        if let Some(v) = self.bucket {
            config.bucket = v;
        }
        if let Some(v) = self.results_path {
            config.results_path = v;
        }
        if let Some(v) = self.database {
            config.database = v;
        }
        if let Some(secs) = self.sleep_seconds {
            config.poll.interval = std::time::Duration::try_from_secs_f64(secs)?;
        }
        if let Some(v) = self.max_polls {
            config.poll.max_polls = Some(v);
        }
        if let Some(v) = self.aws_profile {
            config.aws_profile = Some(v);
        }
        if let Some(v) = self.mock_mode {
            config.mock_mode = Some(v.parse::<MockMode>().map_err(anyhow::Error::msg)?);
        }
        if let Some(v) = self.mock_data_path {
            config.mock_data_path = Some(v);
        }
        if self.strip_header {
            config.header_row = HeaderRow::Strip;
        }
        config.follow_pages |= self.all_pages;
        config.debug |= self.debug;
        Ok(())
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let query = cli.query.clone();
    let raw = cli.raw;

    let mut config = QthenaConfig::from_env()?;
    cli.apply(&mut config)?;

    let runner = QueryRunner::new(config).await?;
    info!(query = %query, "running query");

    match runner.select(&query, !raw).await? {
        Selection::Raw(results) => println!("{}", results.result_set),
        Selection::Records(records) => {
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
            info!(rows = records.len(), "done");
        }
    }

    Ok(())
}
