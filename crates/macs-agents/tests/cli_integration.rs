//! Integration tests that invoke the real Claude CLI.
//!
//! These tests are `#[ignore]` by default. They need the `claude` CLI on PATH
//! and valid credentials.
//!
//! Run explicitly with:
//! ```bash
//! cargo test -p macs-agents --test cli_integration -- --ignored
//! ```

use std::time::Duration;

use chrono::{TimeZone, Utc};
use macs_agents::claude_cli::{check_cli_available, invoke_claude, ClaudeCliConfig};
use macs_agents::prompts::role_system_prompt;
use macs_agents::{recover, RoleRequest};
use macs_models::claim::Role;
use uuid::Uuid;

fn haiku(timeout_secs: u64) -> ClaudeCliConfig {
    ClaudeCliConfig {
        model: "claude-3-5-haiku-latest".to_string(),
        timeout: Duration::from_secs(timeout_secs),
    }
}

#[tokio::test]
#[ignore]
async fn cli_is_available() {
    assert!(check_cli_available().await, "claude CLI not found on PATH");
}

/// A real role reply must survive recovery with a structured claims block.
/// Catches CLI output format changes that would push every round onto the
/// text fallback.
#[tokio::test]
#[ignore]
async fn role_reply_recovers_to_claims_block() {
    if !check_cli_available().await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let request = RoleRequest {
        round_id: Uuid::new_v4(),
        role: Role::Technical,
        universe: vec!["BTC".to_string()],
        cutoff: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        evidence: serde_json::from_value(serde_json::json!([
            {"type": "tech", "id": "rsi-btc", "ticker": "BTC", "observed_at": "2024-05-01T11:00:00Z",
             "relevance": 0.9, "source": "taapi", "metric": "RSI(14,1h)", "value": 27.5}
        ]))
        .unwrap(),
    };

    let raw = invoke_claude(
        &role_system_prompt(Role::Technical),
        &serde_json::to_string(&request).unwrap(),
        &haiku(90),
    )
    .await
    .expect("Claude CLI invocation failed");

    let recovered = recover(&raw);
    assert!(
        recovered.is_structured_valid,
        "no claims block recovered: {:?}\nRaw output:\n---\n{raw}\n---",
        recovered.errors
    );
    assert!(recovered.block.unwrap()["claims"].is_array());
}

#[tokio::test]
#[ignore]
async fn cli_reports_errors_for_invalid_model() {
    if !check_cli_available().await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let config = ClaudeCliConfig {
        model: "nonexistent-model-12345".to_string(),
        timeout: Duration::from_secs(15),
    };
    let result = invoke_claude("You are a test.", "hello", &config).await;
    assert!(result.is_err(), "Expected error for invalid model, got: {result:?}");
}
