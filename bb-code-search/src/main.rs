use anyhow::Result;
use bb_code_search::cli::{parse_log_level, run, Cli};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for search results.
    let level = parse_log_level(&cli.log_level);
    tracing_subscriber::fmt()
        .with_max_level(level.unwrap_or(tracing::Level::INFO))
        .with_writer(std::io::stderr)
        .init();
    if level.is_none() {
        tracing::warn!(log_level = %cli.log_level, "Unknown log level, using INFO");
    }
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}
