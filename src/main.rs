//! Cafescout - find coffee shops in U.S. cities
//!
//! An interactive command-line session that scrapes a state and city
//! directory, looks up cafes through a business-search API, stores them in
//! SQLite and writes rating and price charts. Every lookup goes through a
//! persistent JSON cache so reruns work offline.

use clap::Parser;
use std::io;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cafescout::app::App;
use cafescout::cache::HttpTransport;
use cafescout::cli::Cli;
use cafescout::config::AppConfig;

/// Level for the crate's own events at a given -v count
///
/// Cache hits and fetches are `info` events, so they show by default.
fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Builds the log filter from RUST_LOG, or from the -v count
fn log_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,cafescout={}", log_level(verbose))))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so prompts stay readable
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = cli.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    let config = AppConfig::from_cli(&cli);
    info!(
        cache = %config.cache_file.display(),
        database = %config.database.display(),
        charts = %config.output_dir.display(),
        "Starting cafescout"
    );

    let mut transport = HttpTransport::new()?;
    match &config.api_key {
        Some(key) => transport = transport.with_bearer_token(key.clone()),
        None => warn!("No API key set (--api-key or YELP_API_KEY); uncached city lookups will fail"),
    }

    let stdin = io::stdin();
    let mut app = App::new(config, transport, stdin.lock(), io::stdout())?;
    app.run().await?;

    Ok(())
}
