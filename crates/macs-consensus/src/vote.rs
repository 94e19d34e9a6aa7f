//! Role-weighted action vote with a clear-margin rule.

use macs_models::claim::{Claim, ACTION_BUY, ACTION_HOLD, ACTION_SELL};
use macs_models::config::RoleWeights;
use macs_models::consensus::VoteOutcome;

/// Weigh each claim's confidence by its role and pick an action.
///
/// Masses are normalized by the total weight of the voting claims. The
/// leading action wins only if it beats the runner-up by at least
/// `action_threshold`; otherwise the outcome is HOLD. Labels other than
/// BUY/SELL count towards HOLD.
pub fn weighted_vote<'a, I>(claims: I, weights: &RoleWeights, action_threshold: f64) -> VoteOutcome
where
    I: IntoIterator<Item = &'a Claim>,
{
    let mut buy = 0.0;
    let mut sell = 0.0;
    let mut hold = 0.0;
    let mut total_weight = 0.0;

    for claim in claims {
        let weight = weights.weight(claim.role);
        let mass = weight * claim.confidence;
        total_weight += weight;
        match claim.normalized_action().as_str() {
            ACTION_BUY => buy += mass,
            ACTION_SELL => sell += mass,
            _ => hold += mass,
        }
    }

    if total_weight <= 0.0 {
        return VoteOutcome {
            buy_score: 0.0,
            sell_score: 0.0,
            hold_score: 0.0,
            action: ACTION_HOLD.to_string(),
        };
    }

    let buy_score = buy / total_weight;
    let sell_score = sell / total_weight;
    let hold_score = hold / total_weight;

    let mut ranked = [
        (ACTION_BUY, buy_score),
        (ACTION_SELL, sell_score),
        (ACTION_HOLD, hold_score),
    ];
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let (leader, lead_score) = ranked[0];
    let runner_up = ranked[1].1;

    let action = if leader != ACTION_HOLD && lead_score - runner_up >= action_threshold {
        leader
    } else {
        ACTION_HOLD
    };

    VoteOutcome {
        buy_score,
        sell_score,
        hold_score,
        action: action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::ts;
    use macs_models::claim::Role;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn claim(role: Role, action: &str, confidence: f64) -> Claim {
        Claim::new(format!("{role}-{action}"), "BTC", role, action, confidence, ts(9))
    }

    #[test]
    fn buy_mass_without_clear_margin_holds() {
        let claims = vec![
            claim(Role::Fundamental, "BUY", 0.8),
            claim(Role::Sentiment, "BUY", 0.6),
            claim(Role::Technical, "SELL", 0.7),
        ];
        let outcome = weighted_vote(&claims, &RoleWeights::default(), 0.3);

        assert!(close(outcome.buy_score, 0.42));
        assert!(close(outcome.sell_score, 0.28));
        assert!(close(outcome.hold_score, 0.0));
        assert_eq!(outcome.action, "HOLD");
    }

    #[test]
    fn clear_margin_wins() {
        let claims = vec![
            claim(Role::Fundamental, "BUY", 0.9),
            claim(Role::Sentiment, "BUY", 0.8),
            claim(Role::Technical, "buy", 0.7),
        ];
        let outcome = weighted_vote(&claims, &RoleWeights::default(), 0.3);
        assert_eq!(outcome.action, "BUY");
        assert!(close(outcome.buy_score, 0.27 + 0.24 + 0.28));
    }

    #[test]
    fn sell_side_can_win() {
        let claims = vec![
            claim(Role::Technical, "SELL", 0.9),
            claim(Role::Sentiment, "SELL", 0.6),
        ];
        let outcome = weighted_vote(&claims, &RoleWeights::default(), 0.3);
        assert_eq!(outcome.action, "SELL");
        assert!(close(outcome.sell_score, (0.36 + 0.18) / 0.7));
    }

    #[test]
    fn unknown_labels_count_as_hold() {
        let claims = vec![claim(Role::Technical, "ACCUMULATE", 0.9)];
        let outcome = weighted_vote(&claims, &RoleWeights::default(), 0.3);
        assert!(close(outcome.hold_score, 0.9));
        assert_eq!(outcome.action, "HOLD");
    }

    #[test]
    fn empty_vote_is_hold() {
        let outcome = weighted_vote(std::iter::empty(), &RoleWeights::default(), 0.3);
        assert_eq!(outcome.action, "HOLD");
        assert_eq!(outcome.buy_score, 0.0);
    }
}
