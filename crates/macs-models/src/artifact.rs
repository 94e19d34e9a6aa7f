use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::claim::{Claim, Role};
use crate::consensus::{ConsensusRecord, Decision, TargetWeight};
use crate::debate::DebateLog;
use crate::evidence::Evidence;
use crate::market::MarketStats;
use crate::violation::{Violation, ViolationKind};

/// Inputs for one analysis round as supplied by the caller (JSON on the CLI).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundRequest {
    /// Working universe of tickers the roles analyse.
    pub universe: Vec<String>,
    /// Decision point; nothing dated after it may justify a claim.
    pub cutoff: DateTime<Utc>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub market_stats: Vec<MarketStats>,
}

/// Round-level error: something went wrong for a whole role or the round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundError {
    pub kind: ViolationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub message: String,
}

/// What each role contributed to the round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleReport {
    pub role: Role,
    pub succeeded: bool,
    /// Whether a structured claims block was decoded (possibly after repair).
    pub structured: bool,
    pub repaired: bool,
    pub used_fallback: bool,
    pub claims_extracted: usize,
    pub elapsed_ms: u64,
}

/// Everything one round produced, handed to risk/execution and persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineArtifact {
    pub round_id: Uuid,
    pub cutoff: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    /// Verified claims plus debate-adjusted claims, de-duplicated by id.
    pub claims: Vec<Claim>,
    pub rejected: Vec<Claim>,
    pub consensus: Vec<ConsensusRecord>,
    pub decisions: Vec<Decision>,
    pub target_weights: Vec<TargetWeight>,
    pub debate_log: DebateLog,
    pub violations: Vec<Violation>,
    pub errors: Vec<RoundError>,
    pub role_reports: Vec<RoleReport>,
    pub processing_time_ms: u64,
}

impl PipelineArtifact {
    /// An artifact with no claims, e.g. when every role failed.
    pub fn empty(round_id: Uuid, cutoff: DateTime<Utc>, started_at: DateTime<Utc>) -> Self {
        Self {
            round_id,
            cutoff,
            started_at,
            claims: Vec::new(),
            rejected: Vec::new(),
            consensus: Vec::new(),
            decisions: Vec::new(),
            target_weights: Vec::new(),
            debate_log: DebateLog::default(),
            violations: Vec::new(),
            errors: Vec::new(),
            role_reports: Vec::new(),
            processing_time_ms: 0,
        }
    }

    pub fn violations_of(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_request_defaults_empty_collections() {
        let json = r#"{"universe": ["BTC", "ETH"], "cutoff": "2024-05-01T12:00:00Z"}"#;
        let request: RoundRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.universe.len(), 2);
        assert!(request.evidence.is_empty());
        assert!(request.market_stats.is_empty());
    }

    #[test]
    fn empty_artifact_roundtrip() {
        let now = Utc::now();
        let artifact = PipelineArtifact::empty(Uuid::new_v4(), now, now);
        let json = serde_json::to_string(&artifact).unwrap();
        let back: PipelineArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(artifact, back);
        assert_eq!(artifact.violations_of(ViolationKind::RoleFailure).count(), 0);
    }
}
