use serde::{Deserialize, Serialize};

/// How dangerous a disagreement is, from the confidence gap between the
/// two most-confident opposing actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    /// One side clearly dominates.
    Low,
    Medium,
    /// Roles are about equally confident but disagree.
    High,
}

/// Disagreement among roles about one ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conflict {
    pub ticker: String,
    /// Distinct normalized actions, sorted.
    pub actions: Vec<String>,
    pub confidence_gap: f64,
    pub severity: ConflictSeverity,
    pub claim_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    Initial,
    Analyzing,
    Converged,
    RoundExhausted,
}

impl DebatePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DebatePhase::Converged | DebatePhase::RoundExhausted)
    }
}

/// Claims of one ticker replaced during a debate round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Revision {
    pub ticker: String,
    pub replaced: Vec<String>,
    pub revised: Vec<String>,
    pub action: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateRound {
    /// 1-based.
    pub round: u32,
    /// Conflicts that entered this round.
    pub conflicts: Vec<Conflict>,
    pub revisions: Vec<Revision>,
}

/// A conflict still open when rounds ran out; the ticker was forced to HOLD.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResidualConflict {
    pub conflict: Conflict,
    pub forced_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateLog {
    pub outcome: DebatePhase,
    pub rounds: Vec<DebateRound>,
    pub residual: Vec<ResidualConflict>,
}

impl Default for DebateLog {
    fn default() -> Self {
        Self {
            outcome: DebatePhase::Initial,
            rounds: Vec::new(),
            residual: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_by_danger() {
        assert!(ConflictSeverity::High > ConflictSeverity::Medium);
        assert!(ConflictSeverity::Medium > ConflictSeverity::Low);
    }

    #[test]
    fn only_final_phases_are_terminal() {
        assert!(!DebatePhase::Initial.is_terminal());
        assert!(!DebatePhase::Analyzing.is_terminal());
        assert!(DebatePhase::Converged.is_terminal());
        assert!(DebatePhase::RoundExhausted.is_terminal());
    }
}
