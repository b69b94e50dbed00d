use anyhow::Result;
use clap::Parser;
use zenodo_sync::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment before parsing; tokens come from env vars or .env.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}
