//! Per-ticker aggregation of verified claims into ranked consensus records.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use macs_models::claim::{Claim, Role};
use macs_models::config::ScoringConfig;
use macs_models::consensus::ConsensusRecord;
use macs_models::market::{MarketStats, MarketStatsMap};
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

/// Group claims by ticker, keeping input order within each group.
pub fn group_by_ticker(claims: &[Claim]) -> BTreeMap<&str, Vec<&Claim>> {
    let mut groups: BTreeMap<&str, Vec<&Claim>> = BTreeMap::new();
    for claim in claims {
        groups.entry(claim.ticker.as_str()).or_default().push(claim);
    }
    groups
}

/// Liquidity in [0, 1] from 24h volume and spread.
///
/// `volume_weight × min(volume / volume_normalizer, 1)
///  + spread_weight × max(1 − spread / spread_normalizer, 0)`
pub fn liquidity_score(stats: &MarketStats, config: &ScoringConfig) -> f64 {
    let volume = stats.volume_24h.to_f64().unwrap_or(0.0).max(0.0);
    let spread = stats.spread.to_f64().unwrap_or(f64::INFINITY);

    let volume_part = if config.volume_normalizer > 0.0 {
        (volume / config.volume_normalizer).min(1.0)
    } else {
        0.0
    };
    let spread_part = if config.spread_normalizer > 0.0 {
        (1.0 - spread / config.spread_normalizer).max(0.0)
    } else {
        0.0
    };

    config.volume_weight * volume_part + config.spread_weight * spread_part
}

/// Distinct contributing roles over all defined roles.
pub fn coverage(claims: &[&Claim]) -> f64 {
    let roles: BTreeSet<Role> = claims.iter().map(|c| c.role).collect();
    roles.len() as f64 / Role::ALL.len() as f64
}

/// Build the ranked consensus for one round.
///
/// Tickers without market stats are skipped: no liquidity, no score.
/// Ranking is by final score, then coverage, then average confidence (all
/// descending), then ticker. At most `max_positions` records are kept.
pub fn build_consensus(
    claims: &[Claim],
    market_stats: &MarketStatsMap,
    max_positions: usize,
    config: &ScoringConfig,
) -> Vec<ConsensusRecord> {
    let mut records: Vec<ConsensusRecord> = group_by_ticker(claims)
        .into_iter()
        .filter_map(|(ticker, group)| {
            let stats = market_stats.get(ticker)?;
            let avg_confidence =
                group.iter().map(|c| c.confidence).sum::<f64>() / group.len() as f64;
            let coverage = coverage(&group);
            let liquidity = liquidity_score(stats, config);
            Some(ConsensusRecord {
                ticker: ticker.to_string(),
                avg_confidence,
                coverage,
                liquidity,
                final_score: avg_confidence * coverage * liquidity,
                claim_ids: group.iter().map(|c| c.id.clone()).collect(),
            })
        })
        .collect();

    records.sort_by(rank);
    records.truncate(max_positions);

    debug!(records = records.len(), max_positions, "Consensus built");
    records
}

/// Tickers that have claims but no market stats, in ticker order.
pub fn tickers_without_market_data(claims: &[Claim], market_stats: &MarketStatsMap) -> Vec<String> {
    group_by_ticker(claims)
        .into_keys()
        .filter(|ticker| !market_stats.contains_key(*ticker))
        .map(str::to_string)
        .collect()
}

fn rank(a: &ConsensusRecord, b: &ConsensusRecord) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| b.coverage.total_cmp(&a.coverage))
        .then_with(|| b.avg_confidence.total_cmp(&a.avg_confidence))
        .then_with(|| a.ticker.cmp(&b.ticker))
}
