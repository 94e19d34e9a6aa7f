use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ACTION_BUY: &str = "BUY";
pub const ACTION_HOLD: &str = "HOLD";
pub const ACTION_SELL: &str = "SELL";

/// Action labels recognised when reading free-form text.
pub const ACTION_KEYWORDS: [&str; 3] = [ACTION_BUY, ACTION_SELL, ACTION_HOLD];

/// The analysis roles that produce claims.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Fundamental,
    Sentiment,
    Technical,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Fundamental, Role::Sentiment, Role::Technical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Fundamental => "fundamental",
            Role::Sentiment => "sentiment",
            Role::Technical => "technical",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fundamental" => Some(Role::Fundamental),
            "sentiment" => Some(Role::Sentiment),
            "technical" => Some(Role::Technical),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

/// A single role's timestamped, confidence-scored recommendation for one asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claim {
    pub id: String,
    pub ticker: String,
    pub role: Role,
    /// Conventionally BUY, HOLD or SELL.
    pub action: String,
    /// 0.0 to 1.0.
    pub confidence: f64,
    /// Evidence ids, in the order the role cited them.
    pub evidence: Vec<String>,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risk_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub signals: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    /// -1.0 to 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Claim {
    /// Minimal claim; optional fields start empty.
    pub fn new(
        id: impl Into<String>,
        ticker: impl Into<String>,
        role: Role,
        action: impl Into<String>,
        confidence: f64,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            ticker: ticker.into(),
            role,
            action: action.into(),
            confidence,
            evidence: Vec::new(),
            generated_at,
            risk_flags: Vec::new(),
            signals: BTreeMap::new(),
            direction: None,
            magnitude: None,
            rationale: None,
        }
    }

    pub fn with_evidence<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.evidence = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Upper-cased, trimmed action label used for every comparison.
    pub fn normalized_action(&self) -> String {
        self.action.trim().to_ascii_uppercase()
    }

    /// A new claim derived from this one with a different action and confidence.
    pub fn revised(&self, id: String, action: &str, confidence: f64) -> Self {
        Self {
            id,
            action: action.to_string(),
            confidence,
            direction: Some(direction_for(action)),
            ..self.clone()
        }
    }
}

/// Direction implied by a conventional action label.
pub fn direction_for(action: &str) -> Direction {
    match action.trim().to_ascii_uppercase().as_str() {
        ACTION_BUY => Direction::Bullish,
        ACTION_SELL => Direction::Bearish,
        _ => Direction::Neutral,
    }
}
