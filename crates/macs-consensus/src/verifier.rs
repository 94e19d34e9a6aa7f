//! Temporal, schema and evidence-binding checks over candidate claims.

use chrono::{DateTime, Utc};
use macs_models::claim::Claim;
use macs_models::evidence::{EvidenceIndex, Resolution};
use macs_models::violation::{Violation, ViolationKind, ViolationSeverity};
use tracing::debug;

/// Partition of candidate claims plus the full violation log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verification {
    pub verified: Vec<Claim>,
    pub rejected: Vec<Claim>,
    pub violations: Vec<Violation>,
}

/// Verify candidate claims against the evidence index and the decision cutoff.
///
/// A claim is rejected when any reject-level violation is raised for it.
/// Warning-level violations (weak evidence) are logged and the claim proceeds.
/// Pure: the same inputs always produce the same partition.
pub fn verify(candidates: &[Claim], index: &EvidenceIndex, cutoff: DateTime<Utc>) -> Verification {
    let mut out = Verification::default();

    for claim in candidates {
        let mut found = Vec::new();
        found.extend(check_temporal(claim, index, cutoff));
        found.extend(check_schema(claim));
        found.extend(check_evidence(claim, index));

        let rejected = found.iter().any(Violation::is_reject);
        out.violations.extend(found);
        if rejected {
            out.rejected.push(claim.clone());
        } else {
            out.verified.push(claim.clone());
        }
    }

    debug!(
        verified = out.verified.len(),
        rejected = out.rejected.len(),
        violations = out.violations.len(),
        "Verification complete"
    );
    out
}

fn violation(
    claim: &Claim,
    kind: ViolationKind,
    severity: ViolationSeverity,
    detail: String,
) -> Violation {
    Violation::new(kind, claim.ticker.clone(), severity, detail)
        .for_claim(claim.id.clone(), claim.role)
}

/// Anti-lookahead: neither the claim nor any evidence it cites may postdate the cutoff.
fn check_temporal(
    claim: &Claim,
    index: &EvidenceIndex,
    cutoff: DateTime<Utc>,
) -> Option<Violation> {
    let mut problems = Vec::new();

    if claim.generated_at > cutoff {
        problems.push(format!(
            "generated_at {} is after cutoff {}",
            claim.generated_at.to_rfc3339(),
            cutoff.to_rfc3339()
        ));
    }

    for id in &claim.evidence {
        if let Resolution::Bound(evidence) = index.resolve(id, &claim.ticker) {
            if evidence.observed_at() > cutoff {
                problems.push(format!(
                    "evidence {id} observed at {} is after cutoff",
                    evidence.observed_at().to_rfc3339()
                ));
            }
        }
    }

    if problems.is_empty() {
        None
    } else {
        Some(violation(
            claim,
            ViolationKind::TemporalViolation,
            ViolationSeverity::Reject,
            problems.join("; "),
        ))
    }
}

fn check_schema(claim: &Claim) -> Option<Violation> {
    let mut problems = Vec::new();

    if !(claim.confidence.is_finite() && (0.0..=1.0).contains(&claim.confidence)) {
        problems.push(format!("confidence {} outside [0, 1]", claim.confidence));
    }
    if claim.ticker.trim().is_empty() {
        problems.push("ticker is empty".to_string());
    }
    if claim.action.trim().is_empty() {
        problems.push("action is empty".to_string());
    }
    if let Some(magnitude) = claim.magnitude {
        if !(magnitude.is_finite() && (-1.0..=1.0).contains(&magnitude)) {
            problems.push(format!("magnitude {magnitude} outside [-1, 1]"));
        }
    }

    if problems.is_empty() {
        None
    } else {
        Some(violation(
            claim,
            ViolationKind::SchemaViolation,
            ViolationSeverity::Reject,
            problems.join("; "),
        ))
    }
}

/// Weak evidence is allowed; evidence bound to another asset is not.
fn check_evidence(claim: &Claim, index: &EvidenceIndex) -> Option<Violation> {
    if claim.evidence.is_empty() {
        return Some(violation(
            claim,
            ViolationKind::EvidenceUnresolved,
            ViolationSeverity::Warning,
            "no evidence references".to_string(),
        ));
    }

    let mut missing = Vec::new();
    let mut foreign = Vec::new();
    for id in &claim.evidence {
        match index.resolve(id, &claim.ticker) {
            Resolution::Bound(_) => {}
            Resolution::OtherTicker(evidence) => {
                foreign.push(format!("{id} (bound to {})", evidence.ticker()))
            }
            Resolution::Missing => missing.push(id.as_str()),
        }
    }

    if !foreign.is_empty() {
        return Some(violation(
            claim,
            ViolationKind::EvidenceUnresolved,
            ViolationSeverity::Reject,
            format!("evidence bound to another asset: {}", foreign.join(", ")),
        ));
    }
    if !missing.is_empty() {
        return Some(violation(
            claim,
            ViolationKind::EvidenceUnresolved,
            ViolationSeverity::Warning,
            format!(
                "{} of {} references unresolved: {}",
                missing.len(),
                claim.evidence.len(),
                missing.join(", ")
            ),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{tech_evidence, ts};
    use macs_models::claim::Role;

    fn index() -> EvidenceIndex {
        let (index, errors) = EvidenceIndex::from_evidence(vec![
            tech_evidence("t-btc", "BTC", ts(8)),
            tech_evidence("t-eth", "ETH", ts(8)),
            tech_evidence("t-late", "BTC", ts(14)),
        ]);
        assert!(errors.is_empty());
        index
    }

    fn claim(id: &str, confidence: f64, hour: u32) -> Claim {
        Claim::new(id, "BTC", Role::Technical, "BUY", confidence, ts(hour)).with_evidence(["t-btc"])
    }

    #[test]
    fn claims_after_cutoff_rejected_once_each() {
        let candidates = vec![claim("ok", 0.7, 10), claim("late-1", 0.7, 13), claim("late-2", 0.7, 15)];
        let result = verify(&candidates, &index(), ts(12));

        assert_eq!(result.verified.len(), 1);
        assert_eq!(result.verified[0].id, "ok");
        assert_eq!(result.rejected.len(), 2);
        for id in ["late-1", "late-2"] {
            let count = result
                .violations
                .iter()
                .filter(|v| v.kind == ViolationKind::TemporalViolation && v.claim_id.as_deref() == Some(id))
                .count();
            assert_eq!(count, 1, "claim {id}");
        }
    }

    #[test]
    fn claim_at_cutoff_is_allowed() {
        let result = verify(&[claim("edge", 0.5, 12)], &index(), ts(12));
        assert_eq!(result.verified.len(), 1);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn citing_future_evidence_is_lookahead() {
        let c = Claim::new("peek", "BTC", Role::Technical, "BUY", 0.9, ts(10)).with_evidence(["t-btc", "t-late"]);
        let result = verify(&[c], &index(), ts(12));

        assert!(result.verified.is_empty());
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].kind, ViolationKind::TemporalViolation);
        assert!(result.violations[0].detail.contains("t-late"));
    }

    #[test]
    fn confidence_bounds_are_inclusive() {
        let candidates = vec![
            claim("zero", 0.0, 10),
            claim("one", 1.0, 10),
            claim("negative", -0.01, 10),
            claim("above", 1.01, 10),
            claim("nan", f64::NAN, 10),
        ];
        let result = verify(&candidates, &index(), ts(12));

        let verified: Vec<&str> = result.verified.iter().map(|c| c.id.as_str()).collect();
        let rejected: Vec<&str> = result.rejected.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(verified, vec!["zero", "one"]);
        assert_eq!(rejected, vec!["negative", "above", "nan"]);
        assert!(result.violations.iter().all(|v| v.kind == ViolationKind::SchemaViolation));
    }

    #[test]
    fn missing_fields_reported_together() {
        let c = Claim::new("blank", " ", Role::Sentiment, "", 0.5, ts(10)).with_evidence(["t-btc"]);
        let result = verify(&[c], &index(), ts(12));

        let schema: Vec<&Violation> = result
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::SchemaViolation)
            .collect();
        assert_eq!(schema.len(), 1);
        assert!(schema[0].detail.contains("ticker is empty"));
        assert!(schema[0].detail.contains("action is empty"));
        assert_eq!(result.rejected.len(), 1);
    }

    #[test]
    fn no_evidence_is_flagged_but_kept() {
        let c = Claim::new("bare", "BTC", Role::Fundamental, "HOLD", 0.4, ts(10));
        let result = verify(&[c], &index(), ts(12));

        assert_eq!(result.verified.len(), 1);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].kind, ViolationKind::EvidenceUnresolved);
        assert_eq!(result.violations[0].severity, ViolationSeverity::Warning);
    }

    #[test]
    fn unknown_references_are_weak_not_fatal() {
        let c = Claim::new("weak", "BTC", Role::Fundamental, "BUY", 0.5, ts(10))
            .with_evidence(["t-btc", "synthetic:BTC"]);
        let result = verify(&[c], &index(), ts(12));

        assert_eq!(result.verified.len(), 1);
        assert!(result.violations[0].detail.contains("synthetic:BTC"));
    }

    #[test]
    fn evidence_of_another_asset_rejects() {
        let c = Claim::new("cross", "BTC", Role::Technical, "SELL", 0.6, ts(10)).with_evidence(["t-eth"]);
        let result = verify(&[c], &index(), ts(12));

        assert!(result.verified.is_empty());
        assert_eq!(result.violations[0].kind, ViolationKind::EvidenceUnresolved);
        assert_eq!(result.violations[0].severity, ViolationSeverity::Reject);
    }

    #[test]
    fn verification_is_deterministic() {
        let candidates = vec![claim("a", 0.7, 10), claim("b", 1.5, 10), claim("c", 0.2, 13)];
        let first = verify(&candidates, &index(), ts(12));
        let second = verify(&candidates, &index(), ts(12));
        assert_eq!(first, second);
    }
}
