mod audit;
mod cli;
mod config;
mod engine;
mod model;
mod providers;
mod report;
mod rules;
mod util;

use anyhow::Result;

/// Log filter variable; logs go to stderr so stdout carries only the report.
const LOG_ENV: &str = "TIDY_LOG";

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !cli::run(&args).await? {
        std::process::exit(1);
    }
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
