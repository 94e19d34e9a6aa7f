//! Conflict detection and bounded debate among disagreeing roles.
//!
//! The resolver threads an immutable [`DebateState`] through an explicit loop:
//! `Initial → Analyzing → (Converged | RoundExhausted)`. Each round asks the
//! configured [`DebateStrategy`] to revise the claims of every conflicted
//! ticker, then recomputes conflicts from the revised claim set. Work is
//! bounded by `max_rounds × conflicted tickers`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use macs_models::claim::{Claim, ACTION_HOLD};
use macs_models::config::{DebateStrategyKind, PipelineConfig, RoleWeights};
use macs_models::debate::{
    Conflict, ConflictSeverity, DebateLog, DebatePhase, DebateRound, ResidualConflict, Revision,
};
use macs_models::violation::{Violation, ViolationKind, ViolationSeverity};
use tracing::{debug, info, warn};

use crate::scoring::group_by_ticker;
use crate::vote::weighted_vote;

const HIGH_SEVERITY_GAP: f64 = 0.2;
const MEDIUM_SEVERITY_GAP: f64 = 0.4;

pub fn severity_for_gap(gap: f64) -> ConflictSeverity {
    if gap < HIGH_SEVERITY_GAP {
        ConflictSeverity::High
    } else if gap < MEDIUM_SEVERITY_GAP {
        ConflictSeverity::Medium
    } else {
        ConflictSeverity::Low
    }
}

/// Tickers whose claims carry more than one distinct action, sorted by ticker.
pub fn detect_conflicts(claims: &[Claim]) -> Vec<Conflict> {
    group_by_ticker(claims)
        .into_iter()
        .filter_map(|(ticker, group)| conflict_for(ticker, &group))
        .collect()
}

fn conflict_for(ticker: &str, group: &[&Claim]) -> Option<Conflict> {
    // strongest confidence behind each action
    let mut best: BTreeMap<String, f64> = BTreeMap::new();
    for claim in group {
        let entry = best.entry(claim.normalized_action()).or_insert(f64::MIN);
        *entry = entry.max(claim.confidence);
    }
    if best.len() < 2 {
        return None;
    }

    let mut strengths: Vec<f64> = best.values().copied().collect();
    strengths.sort_by(|a, b| b.total_cmp(a));
    let gap = strengths[0] - strengths[1];

    Some(Conflict {
        ticker: ticker.to_string(),
        actions: best.into_keys().collect(),
        confidence_gap: gap,
        severity: severity_for_gap(gap),
        claim_ids: group.iter().map(|c| c.id.clone()).collect(),
    })
}

/// Replacement claims a strategy proposes for one conflicted ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerRevision {
    pub claims: Vec<Claim>,
    pub action: String,
    pub note: String,
}

/// Negotiation policy applied to each conflicted ticker in a round.
pub trait DebateStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Propose replacement claims for one ticker, or `None` to leave it as is.
    fn revise(&self, round: u32, conflict: &Conflict, claims: &[&Claim]) -> Option<TickerRevision>;
}

/// Id of a claim revised in `round`, derived from the original claim id.
pub fn revision_id(id: &str, round: u32) -> String {
    let base = id.split('~').next().unwrap_or(id);
    format!("{base}~r{round}")
}

fn mean_confidence(claims: &[&Claim]) -> f64 {
    if claims.is_empty() {
        return 0.0;
    }
    claims.iter().map(|c| c.confidence).sum::<f64>() / claims.len() as f64
}

fn collapse(round: u32, claims: &[&Claim], note: String) -> TickerRevision {
    let confidence = mean_confidence(claims);
    TickerRevision {
        claims: claims
            .iter()
            .map(|c| c.revised(revision_id(&c.id, round), ACTION_HOLD, confidence))
            .collect(),
        action: ACTION_HOLD.to_string(),
        note,
    }
}

/// Default strategy: every disagreeing claim becomes HOLD at the mean confidence.
#[derive(Debug, Clone, Default)]
pub struct CollapseToHold;

impl DebateStrategy for CollapseToHold {
    fn name(&self) -> &str {
        "collapse_to_hold"
    }

    fn revise(&self, round: u32, conflict: &Conflict, claims: &[&Claim]) -> Option<TickerRevision> {
        Some(collapse(
            round,
            claims,
            format!("collapsed {} to HOLD", conflict.actions.join("/")),
        ))
    }
}

/// Let the role-weighted vote settle the dispute when it has a clear margin.
#[derive(Debug, Clone)]
pub struct WeightedVoteStrategy {
    pub weights: RoleWeights,
    pub action_threshold: f64,
}

impl DebateStrategy for WeightedVoteStrategy {
    fn name(&self) -> &str {
        "weighted_vote"
    }

    fn revise(&self, round: u32, _conflict: &Conflict, claims: &[&Claim]) -> Option<TickerRevision> {
        let vote = weighted_vote(claims.iter().copied(), &self.weights, self.action_threshold);
        let note = format!(
            "buy {:.3} / sell {:.3} / hold {:.3} -> {}",
            vote.buy_score, vote.sell_score, vote.hold_score, vote.action
        );
        if vote.action == ACTION_HOLD {
            return Some(collapse(round, claims, note));
        }
        Some(TickerRevision {
            claims: claims
                .iter()
                .map(|c| c.revised(revision_id(&c.id, round), &vote.action, c.confidence))
                .collect(),
            action: vote.action,
            note,
        })
    }
}

/// Build the strategy selected in configuration.
pub fn strategy_from_config(config: &PipelineConfig) -> Arc<dyn DebateStrategy> {
    match config.debate_strategy {
        DebateStrategyKind::CollapseToHold => Arc::new(CollapseToHold),
        DebateStrategyKind::WeightedVote => Arc::new(WeightedVoteStrategy {
            weights: config.role_weights.clone(),
            action_threshold: config.action_threshold,
        }),
    }
}

/// Snapshot of the negotiation between rounds.
#[derive(Debug, Clone, PartialEq)]
pub struct DebateState {
    pub phase: DebatePhase,
    /// Rounds completed so far.
    pub round: u32,
    pub claims: Vec<Claim>,
    pub conflicts: Vec<Conflict>,
}

impl DebateState {
    pub fn initial(claims: &[Claim]) -> Self {
        Self {
            phase: DebatePhase::Initial,
            round: 0,
            claims: claims.to_vec(),
            conflicts: detect_conflicts(claims),
        }
    }

    fn with_phase(self, phase: DebatePhase) -> Self {
        Self { phase, ..self }
    }
}

/// Output of a debate: final claims, audit log, and violations for residual conflicts.
#[derive(Debug, Clone, PartialEq)]
pub struct DebateResolution {
    pub claims: Vec<Claim>,
    pub log: DebateLog,
    pub violations: Vec<Violation>,
}

pub struct DebateResolver {
    strategy: Arc<dyn DebateStrategy>,
    max_rounds: u32,
    neutral_confidence_ceiling: f64,
}

impl DebateResolver {
    pub fn new(
        strategy: Arc<dyn DebateStrategy>,
        max_rounds: u32,
        neutral_confidence_ceiling: f64,
    ) -> Self {
        Self {
            strategy,
            max_rounds,
            neutral_confidence_ceiling,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            strategy_from_config(config),
            config.max_debate_rounds,
            config.neutral_confidence_ceiling,
        )
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Run the bounded negotiation over a verified claim set.
    pub fn resolve(&self, claims: &[Claim]) -> DebateResolution {
        let mut state = DebateState::initial(claims).with_phase(DebatePhase::Analyzing);
        let mut rounds = Vec::new();

        while !state.phase.is_terminal() {
            state = if state.conflicts.is_empty() {
                state.with_phase(DebatePhase::Converged)
            } else if state.round >= self.max_rounds {
                state.with_phase(DebatePhase::RoundExhausted)
            } else {
                let (next, log) = self.step(state);
                rounds.push(log);
                next
            };
        }

        let mut residual = Vec::new();
        let mut violations = Vec::new();
        let mut final_claims = state.claims;

        if state.phase == DebatePhase::RoundExhausted {
            for conflict in &state.conflicts {
                warn!(
                    ticker = %conflict.ticker,
                    actions = ?conflict.actions,
                    rounds = state.round,
                    "Debate exhausted, forcing HOLD"
                );
                final_claims = self.force_hold(final_claims, &conflict.ticker);
                residual.push(ResidualConflict {
                    conflict: conflict.clone(),
                    forced_confidence: self.neutral_confidence_ceiling,
                });
                violations.push(Violation::new(
                    ViolationKind::ConflictUnresolved,
                    conflict.ticker.clone(),
                    ViolationSeverity::Warning,
                    format!(
                        "{} still disputed after {} round(s); forced HOLD (confidence ≤ {})",
                        conflict.actions.join("/"),
                        state.round,
                        self.neutral_confidence_ceiling
                    ),
                ));
            }
        }

        info!(
            outcome = ?state.phase,
            rounds = rounds.len(),
            residual = residual.len(),
            strategy = self.strategy.name(),
            "Debate finished"
        );

        DebateResolution {
            claims: final_claims,
            log: DebateLog {
                outcome: state.phase,
                rounds,
                residual,
            },
            violations,
        }
    }

    /// One debate round: revise every conflicted ticker, then recompute conflicts.
    fn step(&self, state: DebateState) -> (DebateState, DebateRound) {
        let round = state.round + 1;
        let groups = group_by_ticker(&state.claims);

        let mut replacements: BTreeMap<String, Vec<Claim>> = BTreeMap::new();
        let mut revisions = Vec::new();
        for conflict in &state.conflicts {
            let Some(group) = groups.get(conflict.ticker.as_str()) else {
                continue;
            };
            if let Some(revision) = self.strategy.revise(round, conflict, group) {
                debug!(ticker = %conflict.ticker, round, action = %revision.action, "Claims revised");
                revisions.push(Revision {
                    ticker: conflict.ticker.clone(),
                    replaced: group.iter().map(|c| c.id.clone()).collect(),
                    revised: revision.claims.iter().map(|c| c.id.clone()).collect(),
                    action: revision.action,
                    note: revision.note,
                });
                replacements.insert(conflict.ticker.clone(), revision.claims);
            }
        }

        let claims = splice(&state.claims, replacements);
        let conflicts = detect_conflicts(&claims);
        let log = DebateRound {
            round,
            conflicts: state.conflicts,
            revisions,
        };
        (
            DebateState {
                phase: DebatePhase::Analyzing,
                round,
                claims,
                conflicts,
            },
            log,
        )
    }

    fn force_hold(&self, claims: Vec<Claim>, ticker: &str) -> Vec<Claim> {
        claims
            .into_iter()
            .map(|c| {
                if c.ticker == ticker {
                    let base = c.id.split('~').next().unwrap_or(&c.id).to_string();
                    let confidence = c.confidence.min(self.neutral_confidence_ceiling);
                    c.revised(format!("{base}~hold"), ACTION_HOLD, confidence)
                } else {
                    c
                }
            })
            .collect()
    }
}

/// Replace each ticker's claims in place, keeping the position of its first claim.
fn splice(claims: &[Claim], mut replacements: BTreeMap<String, Vec<Claim>>) -> Vec<Claim> {
    let revised: BTreeSet<String> = replacements.keys().cloned().collect();
    let mut out = Vec::with_capacity(claims.len());
    for claim in claims {
        if !revised.contains(&claim.ticker) {
            out.push(claim.clone());
        } else if let Some(replacement) = replacements.remove(&claim.ticker) {
            out.extend(replacement);
        }
    }
    out
}
