//! Scripted role agents for exercising the coordinator without the Claude CLI.
//!
//! Each `ScriptedRole` plays back one behaviour: a fixed reply (clean,
//! truncated or free text), a failure, a reply that arrives too late, or a
//! panic inside the role task.

use std::time::Duration;

use async_trait::async_trait;
use macs_models::claim::Role;

use crate::error::AgentError;
use crate::role::{RoleAgent, RoleRequest};

#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    Fail(String),
    /// Sleeps before replying; use with a shorter role timeout.
    Slow(Duration, String),
    Panic,
}

pub struct ScriptedRole {
    pub role: Role,
    pub script: Script,
}

impl ScriptedRole {
    pub fn new(role: Role, script: Script) -> Self {
        Self { role, script }
    }

    pub fn replying(role: Role, reply: impl Into<String>) -> Self {
        Self::new(role, Script::Reply(reply.into()))
    }

    pub fn failing(role: Role, message: &str) -> Self {
        Self::new(role, Script::Fail(message.to_string()))
    }

    pub fn slow(role: Role, delay: Duration) -> Self {
        Self::new(role, Script::Slow(delay, String::new()))
    }

    pub fn panicking(role: Role) -> Self {
        Self::new(role, Script::Panic)
    }
}

#[async_trait]
impl RoleAgent for ScriptedRole {
    fn role(&self) -> Role {
        self.role
    }

    async fn analyze(&self, _request: &RoleRequest) -> Result<String, AgentError> {
        match &self.script {
            Script::Reply(reply) => Ok(reply.clone()),
            Script::Fail(message) => Err(AgentError::Cli(message.clone())),
            Script::Slow(delay, reply) => {
                tokio::time::sleep(*delay).await;
                Ok(reply.clone())
            }
            Script::Panic => panic!("scripted {} role panicked", self.role),
        }
    }
}

/// One claim line for [`claims_reply`]: ticker, action, confidence, evidence ids.
pub type ClaimSpec<'a> = (&'a str, &'a str, f64, &'a [&'a str]);

/// A well-formed reply: short narrative, then a fenced claims block.
pub fn claims_reply(narrative: &str, claims: &[ClaimSpec<'_>]) -> String {
    let claims: Vec<serde_json::Value> = claims
        .iter()
        .map(|(ticker, action, confidence, evidence)| {
            serde_json::json!({
                "ticker": ticker,
                "action": action,
                "confidence": confidence,
                "evidence": evidence,
                "rationale": format!("{action} {ticker}"),
            })
        })
        .collect();
    let block = serde_json::to_string_pretty(&serde_json::json!({ "claims": claims }))
        .unwrap_or_default();
    format!("{narrative}\n```json\n{block}\n```")
}

/// A reply whose claims block was cut off mid-way, as a token limit would.
pub fn truncated_reply(narrative: &str, claims: &[ClaimSpec<'_>]) -> String {
    let full = claims_reply(narrative, claims);
    let block_end = full.rfind("\n```").unwrap_or(full.len());
    // drop the closing fence and the final `}`
    let body = full[..block_end].trim_end();
    body[..body.len().saturating_sub(1)].to_string()
}
