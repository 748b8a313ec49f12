//! weblog-stats - usage statistics from web server access logs
//!
//! Reads a Common/Combined Log Format file and prints a JSON report with:
//! - Monthly and daily hits, files, pages, bytes, visits and sites
//! - Method and response code breakdowns
//! - Visits per country (MaxMind GeoLite2)
//! - Busiest addresses, user agents, URLs and referrers

mod config;
mod country_cache;
mod error;
mod geoip;
mod http;
mod ingest;
mod parser;
mod report;
mod stats;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::country_cache::CountryLookup;

#[derive(Parser, Debug)]
#[command(name = "weblog-stats", version, about = "Usage statistics from web server access logs")]
struct Cli {
    /// Access log to analyze
    input: PathBuf,

    /// Config file (default: weblog.toml if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// GeoLite2 country database
    #[arg(long, value_name = "FILE")]
    geoip_db: Option<String>,

    /// Parallel country lookups
    #[arg(short, long)]
    workers: Option<usize>,

    /// Skip the country breakdown
    #[arg(long)]
    no_geoip: bool,

    /// Rows in each top-N table
    #[arg(long)]
    top: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load configuration, command line wins
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(database) = cli.geoip_db {
        config.geoip.database = database;
    }
    if let Some(workers) = cli.workers {
        config.geoip.workers = workers;
    }
    if let Some(top) = cli.top {
        config.report.top = top;
    }
    if cli.no_geoip {
        config.geoip.enabled = false;
    }
    config.validate()?;

    // RUST_LOG overrides the configured level; stdout is reserved for the report
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting weblog-stats...");

    let session_timeout = config
        .session_timeout()
        .context("Session timeout out of range")?;
    let ingest::IngestResult {
        mut stats,
        lines,
        skipped,
    } = ingest::process_log(&cli.input, session_timeout)?;

    // Country breakdown
    if config.geoip.enabled {
        let db = geoip::GeoIp::open(&config.geoip.database, &config.geoip.locale)
            .context("GeoIP is enabled but the database could not be opened (use --no-geoip to skip)")?;
        let lookup = CountryLookup::new(Arc::new(db), config.geoip.workers);
        stats.lookup_countries(lookup).await;
    } else {
        info!("GeoIP disabled");
    }

    let report = report::Report::build(&stats, config.report.top).with_ingest(lines, skipped);
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", json);

    info!("Done");
    Ok(())
}
