use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use macs_models::claim::Role;
use macs_models::config::AgentsConfig;
use macs_models::evidence::Evidence;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::claude_cli::{invoke_claude, ClaudeCliConfig};
use crate::error::AgentError;
use crate::prompts::role_system_prompt;

/// What one role sees in a round. Serialized as the user prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleRequest {
    pub round_id: Uuid,
    pub role: Role,
    pub universe: Vec<String>,
    pub cutoff: DateTime<Utc>,
    pub evidence: Vec<Evidence>,
}

/// An analysis role. Returns raw, possibly malformed text; recovery happens downstream.
#[async_trait]
pub trait RoleAgent: Send + Sync {
    fn role(&self) -> Role;

    async fn analyze(&self, request: &RoleRequest) -> Result<String, AgentError>;
}

/// A role backed by the Claude CLI.
pub struct ClaudeRoleAgent {
    pub role: Role,
    pub cli_config: ClaudeCliConfig,
}

impl ClaudeRoleAgent {
    pub fn new(role: Role, cli_config: ClaudeCliConfig) -> Self {
        Self { role, cli_config }
    }
}

#[async_trait]
impl RoleAgent for ClaudeRoleAgent {
    fn role(&self) -> Role {
        self.role
    }

    async fn analyze(&self, request: &RoleRequest) -> Result<String, AgentError> {
        let system_prompt = role_system_prompt(self.role);
        let user_prompt = serde_json::to_string(request)?;
        invoke_claude(&system_prompt, &user_prompt, &self.cli_config).await
    }
}

/// One CLI-backed agent per enabled role.
pub fn claude_agents(config: &AgentsConfig) -> Vec<Arc<dyn RoleAgent>> {
    Role::ALL
        .iter()
        .filter_map(|role| {
            ClaudeCliConfig::for_role(config, *role)
                .map(|cli| Arc::new(ClaudeRoleAgent::new(*role, cli)) as Arc<dyn RoleAgent>)
        })
        .collect()
}
