//! Map ranked consensus records onto BUY/HOLD/SELL decisions and target weights.

use std::collections::BTreeSet;

use macs_models::claim::{Claim, ACTION_BUY, ACTION_HOLD, ACTION_SELL};
use macs_models::config::PipelineConfig;
use macs_models::consensus::{ConsensusRecord, Decision, DecisionBand, TargetWeight};
use tracing::debug;

use crate::vote::weighted_vote;

/// One decision per consensus record, in record order.
///
/// The unsigned final score is signed by which side of the role-weighted vote
/// carries more mass, then banded against `buy_band` / `sell_band`.
pub fn decide(records: &[ConsensusRecord], claims: &[Claim], config: &PipelineConfig) -> Vec<Decision> {
    records
        .iter()
        .map(|record| {
            let ids: BTreeSet<&str> = record.claim_ids.iter().map(String::as_str).collect();
            let vote = weighted_vote(
                claims.iter().filter(|c| ids.contains(c.id.as_str())),
                &config.role_weights,
                config.action_threshold,
            );

            let direction = if vote.buy_score > vote.sell_score {
                1.0
            } else if vote.sell_score > vote.buy_score {
                -1.0
            } else {
                0.0
            };
            let signed_score = record.final_score * direction;

            let band = if signed_score > config.buy_band {
                DecisionBand::BuyLeaning
            } else if signed_score < -config.sell_band {
                DecisionBand::SellLeaning
            } else {
                DecisionBand::HoldLeaning
            };
            let action = match band {
                DecisionBand::BuyLeaning => ACTION_BUY,
                DecisionBand::SellLeaning => ACTION_SELL,
                DecisionBand::HoldLeaning => ACTION_HOLD,
            };

            debug!(ticker = %record.ticker, signed_score, action, "Decision banded");
            Decision {
                ticker: record.ticker.clone(),
                action: action.to_string(),
                band,
                signed_score,
                final_score: record.final_score,
                vote,
            }
        })
        .collect()
}

/// BUY-leaning decisions share the book in proportion to their final score.
///
/// Every decided ticker appears once; non-BUY tickers get weight 0. When no
/// BUY carries a positive score, all weights are 0.
pub fn target_weights(decisions: &[Decision]) -> Vec<TargetWeight> {
    let is_buy = |d: &Decision| d.band == DecisionBand::BuyLeaning && d.final_score > 0.0;
    let total: f64 = decisions.iter().filter(|d| is_buy(d)).map(|d| d.final_score).sum();

    decisions
        .iter()
        .map(|d| TargetWeight {
            ticker: d.ticker.clone(),
            weight: if is_buy(d) && total > 0.0 {
                d.final_score / total
            } else {
                0.0
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::ts;
    use macs_models::claim::Role;

    fn record(ticker: &str, final_score: f64, claim_ids: &[&str]) -> ConsensusRecord {
        ConsensusRecord {
            ticker: ticker.to_string(),
            avg_confidence: final_score,
            coverage: 1.0,
            liquidity: 1.0,
            final_score,
            claim_ids: claim_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn claim(id: &str, ticker: &str, role: Role, action: &str, confidence: f64) -> Claim {
        Claim::new(id, ticker, role, action, confidence, ts(9))
    }

    fn decisions() -> Vec<Decision> {
        let claims = vec![
            claim("b1", "BTC", Role::Technical, "BUY", 0.9),
            claim("e1", "ETH", Role::Technical, "BUY", 0.6),
            claim("s1", "SOL", Role::Technical, "SELL", 0.8),
            claim("d1", "DOGE", Role::Technical, "BUY", 0.2),
        ];
        let records = vec![
            record("BTC", 0.9, &["b1"]),
            record("SOL", 0.8, &["s1"]),
            record("ETH", 0.6, &["e1"]),
            record("DOGE", 0.2, &["d1"]),
        ];
        decide(&records, &claims, &PipelineConfig::default())
    }

    #[test]
    fn bands_follow_signed_score() {
        let decisions = decisions();
        let by_ticker = |t: &str| decisions.iter().find(|d| d.ticker == t).unwrap();

        assert_eq!(by_ticker("BTC").band, DecisionBand::BuyLeaning);
        assert_eq!(by_ticker("BTC").action, "BUY");
        assert_eq!(by_ticker("SOL").band, DecisionBand::SellLeaning);
        assert!(by_ticker("SOL").signed_score < 0.0);
        assert_eq!(by_ticker("SOL").final_score, 0.8);
        // weak buy stays inside the neutral band
        assert_eq!(by_ticker("DOGE").band, DecisionBand::HoldLeaning);
        assert_eq!(by_ticker("DOGE").action, "HOLD");
    }

    #[test]
    fn balanced_vote_is_neutral() {
        let claims = vec![
            claim("a", "BTC", Role::Fundamental, "BUY", 0.8),
            claim("b", "BTC", Role::Sentiment, "SELL", 0.8),
        ];
        let decisions = decide(&[record("BTC", 0.9, &["a", "b"])], &claims, &PipelineConfig::default());
        assert_eq!(decisions[0].signed_score, 0.0);
        assert_eq!(decisions[0].band, DecisionBand::HoldLeaning);
    }

    #[test]
    fn weights_split_across_buys() {
        let weights = target_weights(&decisions());
        let weight = |t: &str| weights.iter().find(|w| w.ticker == t).unwrap().weight;

        assert_eq!(weights.len(), 4);
        assert!((weight("BTC") - 0.6).abs() < 1e-9);
        assert!((weight("ETH") - 0.4).abs() < 1e-9);
        assert_eq!(weight("SOL"), 0.0);
        assert_eq!(weight("DOGE"), 0.0);
        let total: f64 = weights.iter().map(|w| w.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_buys_means_zero_weights() {
        let claims = vec![claim("s", "SOL", Role::Technical, "SELL", 0.9)];
        let decisions = decide(&[record("SOL", 0.9, &["s"])], &claims, &PipelineConfig::default());
        let weights = target_weights(&decisions);
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].weight, 0.0);
    }

    #[test]
    fn empty_records_produce_nothing() {
        assert!(decide(&[], &[], &PipelineConfig::default()).is_empty());
        assert!(target_weights(&[]).is_empty());
    }
}
