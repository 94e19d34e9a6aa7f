use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("Role timed out after {0:?}")]
    Timeout(Duration),

    #[error("Round cancelled")]
    Cancelled,

    #[error("Cache error: {0}")]
    Cache(#[from] macs_cache::CacheError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
