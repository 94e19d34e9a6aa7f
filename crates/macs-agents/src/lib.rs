pub mod claude_cli;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod prompts;
pub mod recovery;
pub mod repair;
pub mod role;

pub mod test_support;

pub use coordinator::{RoundCoordinator, RoundInput};
pub use error::AgentError;
pub use extract::{extract_claims, Extraction, ExtractionContext};
pub use recovery::{recover, RecoveredOutput};
pub use role::{claude_agents, ClaudeRoleAgent, RoleAgent, RoleRequest};
