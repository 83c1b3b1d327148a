// src/main.rs — dualqa entry point

use clap::Parser;

use dualqa::cli::{Cli, Commands};
use dualqa::infra::config::Config;
use dualqa::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    logger::init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load config (falls back to defaults if no config.toml)
    let mut config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };
    cli.apply_overrides(&mut config);
    tracing::debug!("Upstream: {}", config.upstream.base_url);

    match cli.command {
        Commands::Ask { question, feedback } => {
            dualqa::cli::ask::run_ask(&config, &question.join(" "), feedback).await
        }
        Commands::Chat => dualqa::cli::chat::run_chat(&config).await,
        Commands::Status { session_id } => {
            dualqa::cli::status::show_status(&config, &session_id).await
        }
        Commands::Serve { .. } => dualqa::cli::serve::run_serve(&config).await,
    }
}
