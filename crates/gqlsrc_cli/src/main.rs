//! Main entry point for the gqlsrc CLI.

use clap::Parser;
use gqlsrc_cli::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "gqlsrc=debug" } else { "gqlsrc=info" };

    // Logs go to stderr; stdout carries nodes or compiled queries.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match gqlsrc_cli::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
