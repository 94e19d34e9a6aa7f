use std::time::Duration;

use macs_models::claim::Role;
use macs_models::config::AgentsConfig;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;

/// How one role invokes the `claude` CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaudeCliConfig {
    pub model: String,
    pub timeout: Duration,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self::from_agents(&AgentsConfig::default(), None)
    }
}

impl ClaudeCliConfig {
    fn from_agents(agents: &AgentsConfig, model: Option<&str>) -> Self {
        Self {
            model: model.unwrap_or(&agents.model).to_string(),
            timeout: Duration::from_secs(agents.role_timeout_seconds),
        }
    }

    /// CLI settings for `role`, or `None` when the role is disabled.
    ///
    /// Roles absent from the `roles` list run with the default model.
    pub fn for_role(agents: &AgentsConfig, role: Role) -> Option<Self> {
        match agents.roles.iter().find(|r| r.role == role) {
            Some(r) if !r.enabled => None,
            Some(r) => Some(Self::from_agents(agents, r.model.as_deref())),
            None => Some(Self::from_agents(agents, None)),
        }
    }
}

/// Invoke the `claude` CLI with a system prompt and user prompt.
/// Returns the raw stdout text.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<String, AgentError> {
    debug!(model = %config.model, prompt_len = user_prompt.len(), "Invoking claude CLI");

    let result = tokio::time::timeout(config.timeout, async {
        Command::new("claude")
            .args([
                "-p",
                user_prompt,
                "--system-prompt",
                system_prompt,
                "--model",
                &config.model,
                "--output-format",
                "text",
            ])
            .kill_on_drop(true)
            .output()
            .await
    })
    .await
    .map_err(|_| AgentError::Timeout(config.timeout))?
    .map_err(|e| AgentError::Cli(format!("Failed to spawn claude: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!(status = %result.status, stderr = %stderr, "Claude CLI failed");
        return Err(AgentError::Cli(format!(
            "claude exited {}: {}",
            result.status, stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&result.stdout).to_string();
    if stdout.trim().is_empty() {
        return Err(AgentError::Cli("Claude returned empty response".to_string()));
    }

    Ok(stdout)
}

/// Check if the `claude` CLI is available on the system.
pub async fn check_cli_available() -> bool {
    match Command::new("claude").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
