use serde::{Deserialize, Serialize};

use crate::claim::Role;

/// Top-level configuration for MACS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MacsConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Configuration for the shared-cache snapshot reader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Path to the shared SQLite cache file (written by data collectors, read by MACS).
    pub sqlite_path: String,
    /// Maximum number of entries in the in-memory moka cache.
    pub memory_max_capacity: u64,
    /// How long a market-stats read stays in memory.
    pub memory_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/macs_cache.db".to_string(),
            memory_max_capacity: 10_000,
            memory_ttl_seconds: 60,
        }
    }
}

/// Configuration for the analysis roles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentsConfig {
    /// Per-role invocation timeout in seconds. Roles time out independently.
    pub role_timeout_seconds: u64,
    /// Default model for role agents.
    pub model: String,
    pub roles: Vec<RoleConfig>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            role_timeout_seconds: 45,
            model: "claude-3-5-haiku-latest".to_string(),
            roles: Role::ALL
                .iter()
                .map(|role| RoleConfig {
                    role: *role,
                    model: None,
                    enabled: true,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleConfig {
    pub role: Role,
    /// Override model for this role. Falls back to `AgentsConfig::model`.
    pub model: Option<String>,
    pub enabled: bool,
}

/// Weight of each role's opinion in the action vote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleWeights {
    pub fundamental: f64,
    pub sentiment: f64,
    pub technical: f64,
}

impl RoleWeights {
    pub fn weight(&self, role: Role) -> f64 {
        match role {
            Role::Fundamental => self.fundamental,
            Role::Sentiment => self.sentiment,
            Role::Technical => self.technical,
        }
    }
}

impl Default for RoleWeights {
    fn default() -> Self {
        Self {
            fundamental: 0.3,
            sentiment: 0.3,
            technical: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DebateStrategyKind {
    /// Revise every conflicting claim to HOLD at the mean confidence.
    #[default]
    CollapseToHold,
    /// Let the role-weighted vote pick a side when it has a clear margin.
    WeightedVote,
}

/// Liquidity model constants used by the scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub volume_weight: f64,
    pub spread_weight: f64,
    /// 24h volume at which the volume component saturates.
    pub volume_normalizer: f64,
    /// Spread at which the spread component reaches zero.
    pub spread_normalizer: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            volume_weight: 0.7,
            spread_weight: 0.3,
            volume_normalizer: 1_000_000.0,
            spread_normalizer: 100.0,
        }
    }
}

/// Tunable constants of the verification/debate/scoring pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub role_weights: RoleWeights,
    pub max_debate_rounds: u32,
    pub max_positions: usize,
    /// Lead the winning action needs over the runner-up, else HOLD.
    pub action_threshold: f64,
    /// Signed score above which a decision is BUY-leaning.
    pub buy_band: f64,
    /// Signed score below minus this value is SELL-leaning.
    pub sell_band: f64,
    /// Confidence cap for tickers forced to HOLD after a failed debate.
    pub neutral_confidence_ceiling: f64,
    /// Reserved. Not consulted by the scoring path.
    pub consensus_threshold: f64,
    pub debate_strategy: DebateStrategyKind,
    pub scoring: ScoringConfig,
    /// Tickers analysed by the looping runner.
    pub universe: Vec<String>,
    pub round_interval_seconds: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            role_weights: RoleWeights::default(),
            max_debate_rounds: 3,
            max_positions: 5,
            action_threshold: 0.3,
            buy_band: 0.3,
            sell_band: 0.3,
            neutral_confidence_ceiling: 0.5,
            consensus_threshold: 0.7,
            debate_strategy: DebateStrategyKind::default(),
            scoring: ScoringConfig::default(),
            universe: Vec::new(),
            round_interval_seconds: 900,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_macs_config() {
        let config = MacsConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: MacsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn default_config_enables_every_role() {
        let agents = AgentsConfig::default();
        assert_eq!(agents.roles.len(), 3);
        assert!(agents.roles.iter().all(|r| r.enabled));
    }

    #[test]
    fn default_weights_sum_to_one() {
        let weights = RoleWeights::default();
        let total: f64 = Role::ALL.iter().map(|r| weights.weight(*r)).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
[cache]
sqlite_path = "/tmp/test_cache.db"
memory_max_capacity = 5000
memory_ttl_seconds = 30

[agents]
role_timeout_seconds = 20
model = "claude-3-5-haiku-latest"

[[agents.roles]]
role = "technical"
enabled = true

[[agents.roles]]
role = "sentiment"
enabled = false

[pipeline]
max_debate_rounds = 2
max_positions = 3
debate_strategy = "weighted_vote"
universe = ["BTC", "ETH", "SOL"]

[pipeline.role_weights]
fundamental = 0.2
sentiment = 0.3
technical = 0.5
"#;

        let config: MacsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cache.sqlite_path, "/tmp/test_cache.db");
        assert_eq!(config.agents.roles.len(), 2);
        assert!(!config.agents.roles[1].enabled);
        assert_eq!(config.pipeline.max_debate_rounds, 2);
        assert_eq!(config.pipeline.debate_strategy, DebateStrategyKind::WeightedVote);
        assert_eq!(config.pipeline.role_weights.weight(Role::Technical), 0.5);
        // unspecified keys keep their defaults
        assert_eq!(config.pipeline.action_threshold, 0.3);
        assert_eq!(config.pipeline.scoring, ScoringConfig::default());
    }
}
