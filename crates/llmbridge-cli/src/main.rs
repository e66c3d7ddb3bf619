//! llmbridge CLI
//!
//! Completions and embeddings from whichever provider is configured.

use clap::Parser;
use llmbridge_core::error::exit_codes;
use llmbridge_core::{BridgeConfig, BridgeError};

mod app;
mod commands;

use app::{Cli, Commands};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = BridgeConfig::from_env();

    let result = match cli.command {
        Commands::Providers => commands::providers::run(&config, cli.format).await,
        Commands::Embed(args) => commands::embed::run(args, &config, cli.format, cli.verbose).await,
        Commands::Complete(args) => commands::complete::run(args, config, cli.format).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let code = e
            .downcast_ref::<BridgeError>()
            .map(BridgeError::exit_code)
            .unwrap_or(exit_codes::GENERAL_ERROR);
        std::process::exit(code);
    }
}
