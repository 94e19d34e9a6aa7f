//! MACS - Multi-Agent Claim Consensus System
//!
//! Role agents (fundamental, sentiment, technical) turn a round's evidence
//! into claims about crypto assets; the claims are verified, debated and
//! scored into a ranked consensus with BUY/HOLD/SELL decisions.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use macs::models::artifact::RoundRequest;
//! # async fn demo(request: RoundRequest) -> anyhow::Result<()> {
//! let config = macs::load_config("config/macs.toml")?;
//! let coordinator = macs::build_coordinator(&config);
//! let artifact = macs::run_request(&coordinator, request).await;
//! println!("{}", serde_json::to_string(&artifact)?);
//! # Ok(())
//! # }
//! ```

pub use macs_agents as agents;
pub use macs_cache as cache;
pub use macs_consensus as consensus;
pub use macs_models as models;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use macs_agents::{claude_agents, RoundCoordinator, RoundInput};
use macs_cache::CacheReader;
use macs_models::artifact::{PipelineArtifact, RoundRequest};
use macs_models::config::MacsConfig;
use tokio_util::sync::CancellationToken;

pub fn parse_config(toml_str: &str) -> Result<MacsConfig> {
    toml::from_str(toml_str).context("Failed to parse config")
}

pub fn load_config(path: &str) -> Result<MacsConfig> {
    let config_str =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {path}"))?;
    parse_config(&config_str)
}

/// Build a coordinator with one Claude CLI agent per enabled role.
pub fn build_coordinator(config: &MacsConfig) -> RoundCoordinator {
    RoundCoordinator::new(
        claude_agents(&config.agents),
        config.pipeline.clone(),
        Duration::from_secs(config.agents.role_timeout_seconds),
    )
}

/// Run one round over caller-supplied evidence and market stats.
pub async fn run_request(coordinator: &RoundCoordinator, request: RoundRequest) -> PipelineArtifact {
    let input = RoundInput::from_request(request);
    coordinator.run_round(&input).await
}

/// Run rounds over the shared cache until `cancel` fires.
///
/// The first round starts immediately, later ones every
/// `round_interval_seconds`. Each round's cutoff is the time it starts. A
/// cancelled round is dropped without reaching `on_artifact`.
pub async fn run_rounds<F>(
    coordinator: &RoundCoordinator,
    cache: &CacheReader,
    config: &MacsConfig,
    cancel: CancellationToken,
    mut on_artifact: F,
) -> Result<()>
where
    F: FnMut(&PipelineArtifact) -> Result<()>,
{
    let universe = config.pipeline.universe.clone();
    if universe.is_empty() {
        anyhow::bail!("pipeline.universe is empty; nothing to analyze");
    }
    let interval = Duration::from_secs(config.pipeline.round_interval_seconds);
    tracing::info!(
        universe = ?universe,
        interval_secs = interval.as_secs(),
        roles = ?coordinator.roles(),
        "MACS round loop starting"
    );

    loop {
        let input = RoundInput::from_cache(cache, universe.clone(), Utc::now())
            .await
            .context("Failed to load round input from cache")?;

        match coordinator.run_round_cancellable(&input, &cancel).await {
            Ok(artifact) => on_artifact(&artifact)?,
            Err(e) => tracing::warn!(round_id = %input.round_id, error = %e, "Round abandoned"),
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Round loop shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!("MACS round loop stopped");
    Ok(())
}
