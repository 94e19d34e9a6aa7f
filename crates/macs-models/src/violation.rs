use std::fmt;

use serde::{Deserialize, Serialize};

use crate::claim::Role;

/// Every recoverable failure the pipeline records. None of them abort a round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// No decodable structured block in a role's output.
    ExtractionFailure,
    /// Malformed claim (bad confidence range, missing required field).
    SchemaViolation,
    /// Claim (or the evidence it cites) dated after the cutoff.
    TemporalViolation,
    /// Evidence reference missing, empty, or bound to another asset.
    EvidenceUnresolved,
    /// Role invocation errored or timed out.
    RoleFailure,
    /// Debate rounds exhausted without convergence.
    ConflictUnresolved,
    /// Ticker has claims but no market stats.
    InsufficientMarketData,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::ExtractionFailure => "extraction_failure",
            ViolationKind::SchemaViolation => "schema_violation",
            ViolationKind::TemporalViolation => "temporal_violation",
            ViolationKind::EvidenceUnresolved => "evidence_unresolved",
            ViolationKind::RoleFailure => "role_failure",
            ViolationKind::ConflictUnresolved => "conflict_unresolved",
            ViolationKind::InsufficientMarketData => "insufficient_market_data",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Recorded for audit; the subject proceeds.
    Warning,
    /// The subject (claim or ticker) is excluded.
    Reject,
}

/// One entry of the audit log handed to risk reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Empty when the violation is not tied to an asset (e.g. a role failure).
    pub ticker: String,
    pub detail: String,
    pub severity: ViolationSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl Violation {
    pub fn new(
        kind: ViolationKind,
        ticker: impl Into<String>,
        severity: ViolationSeverity,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            ticker: ticker.into(),
            detail: detail.into(),
            severity,
            claim_id: None,
            role: None,
        }
    }

    pub fn for_claim(mut self, claim_id: impl Into<String>, role: Role) -> Self {
        self.claim_id = Some(claim_id.into());
        self.role = Some(role);
        self
    }

    pub fn for_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn is_reject(&self) -> bool {
        self.severity == ViolationSeverity::Reject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_shape() {
        let violation = Violation::new(
            ViolationKind::TemporalViolation,
            "BTC",
            ViolationSeverity::Reject,
            "generated after cutoff",
        )
        .for_claim("c-1", Role::Technical);

        let json = serde_json::to_value(&violation).unwrap();
        assert_eq!(json["kind"], "temporal_violation");
        assert_eq!(json["ticker"], "BTC");
        assert_eq!(json["severity"], "reject");
        assert_eq!(json["role"], "technical");
        assert!(violation.is_reject());
    }

    #[test]
    fn display_matches_serde_name() {
        for kind in [
            ViolationKind::ExtractionFailure,
            ViolationKind::EvidenceUnresolved,
            ViolationKind::InsufficientMarketData,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json.trim_matches('"'), kind.to_string());
        }
    }
}
