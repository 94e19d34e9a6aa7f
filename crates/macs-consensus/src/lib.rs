//! Pure, synchronous stages of a round: verification, debate, scoring and decisions.

pub mod debate;
pub mod decision;
pub mod scoring;
pub mod verifier;
pub mod vote;

pub use debate::{
    detect_conflicts, CollapseToHold, DebateResolution, DebateResolver, DebateState,
    DebateStrategy, WeightedVoteStrategy,
};
pub use decision::{decide, target_weights};
pub use scoring::{build_consensus, tickers_without_market_data};
pub use verifier::{verify, Verification};
pub use vote::weighted_vote;
