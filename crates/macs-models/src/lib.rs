pub mod artifact;
pub mod cache_schema;
pub mod claim;
pub mod config;
pub mod consensus;
pub mod debate;
pub mod error;
pub mod evidence;
pub mod market;
pub mod violation;

pub use artifact::{PipelineArtifact, RoleReport, RoundError, RoundRequest};
pub use cache_schema::{CacheCategory, CacheRow};
pub use claim::{Claim, Direction, Role, ACTION_BUY, ACTION_HOLD, ACTION_SELL};
pub use config::{
    AgentsConfig, CacheConfig, DebateStrategyKind, MacsConfig, PipelineConfig, RoleConfig,
    RoleWeights, ScoringConfig,
};
pub use consensus::{ConsensusRecord, Decision, DecisionBand, TargetWeight, VoteOutcome};
pub use debate::{
    Conflict, ConflictSeverity, DebateLog, DebatePhase, DebateRound, ResidualConflict, Revision,
};
pub use error::ModelError;
pub use evidence::{
    Evidence, EvidenceIndex, EvidenceMeta, IndexEvidence, MarketEvidence, MarketMetric,
    MetricEvidence, NewsEvidence, Resolution, GLOBAL_TICKER,
};
pub use market::{MarketStats, MarketStatsMap};
pub use violation::{Violation, ViolationKind, ViolationSeverity};
