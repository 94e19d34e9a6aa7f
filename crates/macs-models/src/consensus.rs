use serde::{Deserialize, Serialize};

/// The aggregated, ranked score for one asset in one round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsensusRecord {
    pub ticker: String,
    /// Mean confidence of the contributing claims.
    pub avg_confidence: f64,
    /// Distinct contributing roles / total defined roles.
    pub coverage: f64,
    pub liquidity: f64,
    /// avg_confidence × coverage × liquidity. Unsigned so records stay comparable.
    pub final_score: f64,
    pub claim_ids: Vec<String>,
}

/// Role-weighted action masses for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoteOutcome {
    pub buy_score: f64,
    pub sell_score: f64,
    pub hold_score: f64,
    /// Winning action, or HOLD when no action leads by the configured margin.
    pub action: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBand {
    BuyLeaning,
    HoldLeaning,
    SellLeaning,
}

/// Downstream interpretation of a consensus record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub ticker: String,
    pub action: String,
    pub band: DecisionBand,
    /// final_score signed by the dominant direction of the vote.
    pub signed_score: f64,
    pub final_score: f64,
    pub vote: VoteOutcome,
}

/// Portfolio share handed to the risk/execution collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetWeight {
    pub ticker: String,
    pub weight: f64,
}
