use std::io::Read;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use macs_cache::CacheReader;
use macs_models::artifact::RoundRequest;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "macs", about = "Multi-Agent Claim Consensus System")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config/macs.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one round over a RoundRequest JSON and print the artifact
    Round {
        /// Read RoundRequest JSON from a file instead of stdin
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Run rounds from the shared cache every `round_interval_seconds` until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = macs::load_config(&cli.config)?;
    let coordinator = macs::build_coordinator(&config);

    match cli.command {
        Command::Round { input, pretty } => {
            let request_json = if let Some(input_path) = &input {
                std::fs::read_to_string(input_path)
                    .with_context(|| format!("Failed to read input: {input_path}"))?
            } else {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read from stdin")?;
                buf
            };
            let request: RoundRequest =
                serde_json::from_str(&request_json).context("Failed to parse RoundRequest JSON")?;

            let artifact = macs::run_request(&coordinator, request).await;

            // Artifact as JSON to stdout
            let output = if pretty {
                serde_json::to_string_pretty(&artifact)?
            } else {
                serde_json::to_string(&artifact)?
            };
            println!("{output}");
        }
        Command::Run => {
            let cache = CacheReader::open(&config.cache)
                .with_context(|| format!("Failed to open cache DB: {}", config.cache.sqlite_path))?;

            let cancel = CancellationToken::new();
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Received shutdown signal");
                shutdown.cancel();
            });

            // One artifact per line on stdout
            macs::run_rounds(&coordinator, &cache, &config, cancel, |artifact| {
                println!("{}", serde_json::to_string(artifact)?);
                Ok(())
            })
            .await?;
        }
    }

    Ok(())
}
