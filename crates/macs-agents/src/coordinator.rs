use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use macs_cache::{CacheReader, RoundSnapshot};
use macs_consensus::{
    build_consensus, decide, target_weights, tickers_without_market_data, verify, DebateResolver,
};
use macs_models::artifact::{PipelineArtifact, RoleReport, RoundError, RoundRequest};
use macs_models::claim::{Claim, Role};
use macs_models::config::PipelineConfig;
use macs_models::evidence::EvidenceIndex;
use macs_models::market::{stats_by_symbol, MarketStatsMap};
use macs_models::violation::{Violation, ViolationKind, ViolationSeverity};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AgentError;
use crate::extract::{extract_claims, ExtractionContext};
use crate::recovery::recover;
use crate::role::{RoleAgent, RoleRequest};

/// Everything one round runs on. Read-only once built.
#[derive(Debug, Clone)]
pub struct RoundInput {
    pub round_id: Uuid,
    pub universe: Vec<String>,
    pub cutoff: DateTime<Utc>,
    pub evidence: EvidenceIndex,
    pub market_stats: MarketStatsMap,
    /// Problems found while assembling the input (invalid evidence, skipped rows).
    pub input_errors: Vec<RoundError>,
}

impl RoundInput {
    pub fn new(
        universe: Vec<String>,
        cutoff: DateTime<Utc>,
        evidence: EvidenceIndex,
        market_stats: MarketStatsMap,
    ) -> Self {
        Self {
            round_id: Uuid::new_v4(),
            universe,
            cutoff,
            evidence,
            market_stats,
            input_errors: Vec::new(),
        }
    }

    /// Build from a caller-supplied request. Invalid evidence is dropped and reported.
    pub fn from_request(request: RoundRequest) -> Self {
        let (evidence, problems) = EvidenceIndex::from_evidence(request.evidence);
        let mut input = Self::new(
            request.universe,
            request.cutoff,
            evidence,
            stats_by_symbol(request.market_stats),
        );
        input.input_errors = problems
            .into_iter()
            .map(|e| RoundError {
                kind: ViolationKind::SchemaViolation,
                role: None,
                message: e.to_string(),
            })
            .collect();
        input
    }

    pub fn from_snapshot(universe: Vec<String>, cutoff: DateTime<Utc>, snapshot: RoundSnapshot) -> Self {
        let mut input = Self::new(universe, cutoff, snapshot.evidence, snapshot.market_stats);
        if snapshot.skipped > 0 {
            input.input_errors.push(RoundError {
                kind: ViolationKind::SchemaViolation,
                role: None,
                message: format!("{} cache row(s) skipped as undecodable or invalid", snapshot.skipped),
            });
        }
        input
    }

    /// Load the universe's evidence and market stats from the shared cache.
    pub async fn from_cache(
        cache: &CacheReader,
        universe: Vec<String>,
        cutoff: DateTime<Utc>,
    ) -> Result<Self, AgentError> {
        let snapshot = cache.load_snapshot(&universe).await?;
        Ok(Self::from_snapshot(universe, cutoff, snapshot))
    }

    fn role_request(&self, role: Role) -> RoleRequest {
        RoleRequest {
            round_id: self.round_id,
            role,
            universe: self.universe.clone(),
            cutoff: self.cutoff,
            evidence: self
                .evidence
                .for_universe(&self.universe, self.cutoff)
                .into_iter()
                .cloned()
                .collect(),
        }
    }
}

/// Raw result of one role's task.
struct RoleOutcome {
    role: Role,
    result: Result<String, AgentError>,
    elapsed: Duration,
}

type RoleTask = (Role, JoinHandle<RoleOutcome>);

/// Runs one round: concurrent role fan-out, then the sequential claim pipeline.
pub struct RoundCoordinator {
    agents: Vec<Arc<dyn RoleAgent>>,
    pipeline: PipelineConfig,
    role_timeout: Duration,
    resolver: DebateResolver,
}

impl RoundCoordinator {
    pub fn new(agents: Vec<Arc<dyn RoleAgent>>, pipeline: PipelineConfig, role_timeout: Duration) -> Self {
        let resolver = DebateResolver::from_config(&pipeline);
        Self {
            agents,
            pipeline,
            role_timeout,
            resolver,
        }
    }

    pub fn roles(&self) -> Vec<Role> {
        self.agents.iter().map(|a| a.role()).collect()
    }

    /// Run a full round. Role failures degrade the round, they never abort it.
    pub async fn run_round(&self, input: &RoundInput) -> PipelineArtifact {
        let started_at = Utc::now();
        let start = Instant::now();
        info!(round_id = %input.round_id, universe = ?input.universe, cutoff = %input.cutoff, "Starting round");

        let outcomes = collect(self.spawn_roles(input)).await;
        self.assemble(input, started_at, start, outcomes)
    }

    /// Like [`run_round`](Self::run_round), but abandons the round if `cancel`
    /// fires before the claim pipeline starts. In-flight role tasks are aborted.
    pub async fn run_round_cancellable(
        &self,
        input: &RoundInput,
        cancel: &CancellationToken,
    ) -> Result<PipelineArtifact, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let started_at = Utc::now();
        let start = Instant::now();
        info!(round_id = %input.round_id, universe = ?input.universe, cutoff = %input.cutoff, "Starting round");

        let tasks = self.spawn_roles(input);
        let aborts: Vec<_> = tasks.iter().map(|(_, h)| h.abort_handle()).collect();

        let outcomes = tokio::select! {
            _ = cancel.cancelled() => {
                for handle in &aborts {
                    handle.abort();
                }
                warn!(round_id = %input.round_id, "Round cancelled during role fan-out");
                return Err(AgentError::Cancelled);
            }
            outcomes = collect(tasks) => outcomes,
        };

        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        Ok(self.assemble(input, started_at, start, outcomes))
    }

    fn spawn_roles(&self, input: &RoundInput) -> Vec<RoleTask> {
        self.agents
            .iter()
            .map(|agent| {
                let agent = Arc::clone(agent);
                let role = agent.role();
                let request = input.role_request(role);
                let timeout = self.role_timeout;

                let handle = tokio::spawn(async move {
                    let role_start = Instant::now();
                    let result = match tokio::time::timeout(timeout, agent.analyze(&request)).await {
                        Ok(result) => result,
                        Err(_) => Err(AgentError::Timeout(timeout)),
                    };
                    RoleOutcome {
                        role,
                        result,
                        elapsed: role_start.elapsed(),
                    }
                });
                (role, handle)
            })
            .collect()
    }

    fn assemble(
        &self,
        input: &RoundInput,
        started_at: DateTime<Utc>,
        start: Instant,
        outcomes: Vec<RoleOutcome>,
    ) -> PipelineArtifact {
        let mut artifact = PipelineArtifact::empty(input.round_id, input.cutoff, started_at);
        artifact.errors.extend(input.input_errors.iter().cloned());

        // 1. Recover and extract candidate claims per role
        let mut candidates: Vec<Claim> = Vec::new();
        for outcome in outcomes {
            let elapsed_ms = outcome.elapsed.as_millis() as u64;
            let raw = match outcome.result {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(role = %outcome.role, error = %e, elapsed_ms, "Role failed");
                    artifact.errors.push(RoundError {
                        kind: ViolationKind::RoleFailure,
                        role: Some(outcome.role),
                        message: e.to_string(),
                    });
                    artifact.role_reports.push(RoleReport {
                        role: outcome.role,
                        succeeded: false,
                        structured: false,
                        repaired: false,
                        used_fallback: false,
                        claims_extracted: 0,
                        elapsed_ms,
                    });
                    continue;
                }
            };

            let recovered = recover(&raw);
            let ctx = ExtractionContext {
                role: outcome.role,
                universe: &input.universe,
                index: &input.evidence,
                generated_at: input.cutoff,
            };
            let extraction = extract_claims(&recovered, &ctx);

            if !recovered.is_structured_valid {
                artifact.errors.push(RoundError {
                    kind: ViolationKind::ExtractionFailure,
                    role: Some(outcome.role),
                    message: format!(
                        "no structured block ({}); text fallback found {} claim(s)",
                        recovered.errors.join("; "),
                        extraction.claims.len()
                    ),
                });
            }
            for message in &extraction.errors {
                artifact.errors.push(RoundError {
                    kind: ViolationKind::ExtractionFailure,
                    role: Some(outcome.role),
                    message: message.clone(),
                });
            }

            info!(
                role = %outcome.role,
                claims = extraction.claims.len(),
                repaired = recovered.repaired,
                fallback = extraction.used_fallback,
                elapsed_ms,
                "Role succeeded"
            );
            artifact.role_reports.push(RoleReport {
                role: outcome.role,
                succeeded: true,
                structured: recovered.is_structured_valid,
                repaired: recovered.repaired,
                used_fallback: extraction.used_fallback,
                claims_extracted: extraction.claims.len(),
                elapsed_ms,
            });
            candidates.extend(extraction.claims);
        }

        // 2. Verify
        let verification = verify(&candidates, &input.evidence, input.cutoff);
        info!(
            verified = verification.verified.len(),
            rejected = verification.rejected.len(),
            "Verification complete"
        );

        // 3. Debate
        let resolution = self.resolver.resolve(&verification.verified);

        // 4. Score and decide
        let missing = tickers_without_market_data(&resolution.claims, &input.market_stats);
        let consensus = build_consensus(
            &resolution.claims,
            &input.market_stats,
            self.pipeline.max_positions,
            &self.pipeline.scoring,
        );
        let decisions = decide(&consensus, &resolution.claims, &self.pipeline);
        let weights = target_weights(&decisions);

        artifact.violations = verification.violations;
        artifact.violations.extend(resolution.violations);
        artifact.violations.extend(missing.into_iter().map(|ticker| {
            Violation::new(
                ViolationKind::InsufficientMarketData,
                ticker,
                ViolationSeverity::Warning,
                "no market stats; ticker not scored",
            )
        }));

        artifact.claims = merge_by_id(verification.verified, resolution.claims);
        artifact.rejected = verification.rejected;
        artifact.consensus = consensus;
        artifact.decisions = decisions;
        artifact.target_weights = weights;
        artifact.debate_log = resolution.log;
        artifact.processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            round_id = %input.round_id,
            consensus = artifact.consensus.len(),
            violations = artifact.violations.len(),
            errors = artifact.errors.len(),
            elapsed_ms = artifact.processing_time_ms,
            "Round complete"
        );
        artifact
    }
}

/// Await every role task. All handles are joined; one failure cancels nothing.
async fn collect(tasks: Vec<RoleTask>) -> Vec<RoleOutcome> {
    let mut outcomes = Vec::with_capacity(tasks.len());
    for (role, handle) in tasks {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!(role = %role, error = %e, "Role task panicked");
                outcomes.push(RoleOutcome {
                    role,
                    result: Err(AgentError::Cli(format!("role task failed: {e}"))),
                    elapsed: Duration::ZERO,
                });
            }
        }
    }
    outcomes
}

/// Verified claims followed by debate revisions, first occurrence of each id kept.
fn merge_by_id(verified: Vec<Claim>, adjusted: Vec<Claim>) -> Vec<Claim> {
    let mut seen = BTreeSet::new();
    verified
        .into_iter()
        .chain(adjusted)
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::tests::MockRoleAgent;
    use chrono::TimeZone;

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn input() -> RoundInput {
        RoundInput::new(
            vec!["BTC".to_string()],
            cutoff(),
            EvidenceIndex::new(),
            MarketStatsMap::new(),
        )
    }

    #[test]
    fn merge_keeps_first_of_each_id() {
        let c = |id: &str| Claim::new(id, "BTC", Role::Technical, "BUY", 0.5, cutoff());
        let merged = merge_by_id(vec![c("a"), c("b")], vec![c("b"), c("a~r1")]);
        let ids: Vec<&str> = merged.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "a~r1"]);
    }

    #[tokio::test]
    async fn failed_role_is_reported_not_fatal() {
        let coordinator = RoundCoordinator::new(
            vec![
                Arc::new(MockRoleAgent::new(Role::Technical, "BTC: BUY")) as Arc<dyn RoleAgent>,
                Arc::new(MockRoleAgent::failing(Role::Sentiment)) as Arc<dyn RoleAgent>,
            ],
            PipelineConfig::default(),
            Duration::from_secs(5),
        );
        let artifact = coordinator.run_round(&input()).await;

        assert_eq!(artifact.role_reports.len(), 2);
        assert!(artifact.role_reports[0].succeeded);
        assert!(artifact.role_reports[0].used_fallback);
        assert!(!artifact.role_reports[1].succeeded);
        assert!(artifact
            .errors
            .iter()
            .any(|e| e.kind == ViolationKind::RoleFailure && e.role == Some(Role::Sentiment)));
        assert_eq!(artifact.claims.len(), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_round_commits_nothing() {
        let coordinator = RoundCoordinator::new(
            vec![Arc::new(MockRoleAgent::new(Role::Technical, "BTC: BUY")) as Arc<dyn RoleAgent>],
            PipelineConfig::default(),
            Duration::from_secs(5),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = coordinator.run_round_cancellable(&input(), &cancel).await;
        assert!(matches!(result, Err(AgentError::Cancelled)));
    }

    #[test]
    fn request_evidence_is_invalid_free() {
        let request: RoundRequest = serde_json::from_value(serde_json::json!({
            "universe": ["BTC"],
            "cutoff": "2024-05-01T12:00:00Z",
            "evidence": [
                {"type": "tech", "id": "ok", "ticker": "BTC", "observed_at": "2024-05-01T08:00:00Z",
                 "relevance": 0.5, "source": "taapi", "metric": "RSI(14,1h)", "value": 40.0},
                {"type": "tech", "id": "bad", "ticker": "BTC", "observed_at": "2024-05-01T08:00:00Z",
                 "relevance": 2.0, "source": "taapi", "metric": "RSI(14,1h)", "value": 40.0}
            ]
        }))
        .unwrap();

        let input = RoundInput::from_request(request);
        assert_eq!(input.evidence.len(), 1);
        assert_eq!(input.input_errors.len(), 1);
        assert_eq!(input.input_errors[0].kind, ViolationKind::SchemaViolation);
    }

    #[test]
    fn role_request_hides_evidence_after_cutoff() {
        let request: RoundRequest = serde_json::from_value(serde_json::json!({
            "universe": ["BTC"],
            "cutoff": "2024-05-01T12:00:00Z",
            "evidence": [
                {"type": "tech", "id": "early", "ticker": "BTC", "observed_at": "2024-05-01T08:00:00Z",
                 "relevance": 0.5, "source": "taapi", "metric": "RSI(14,1h)", "value": 40.0},
                {"type": "tech", "id": "late", "ticker": "BTC", "observed_at": "2024-05-01T13:00:00Z",
                 "relevance": 0.5, "source": "taapi", "metric": "RSI(14,1h)", "value": 55.0},
                {"type": "tech", "id": "other", "ticker": "ETH", "observed_at": "2024-05-01T08:00:00Z",
                 "relevance": 0.5, "source": "taapi", "metric": "RSI(14,1h)", "value": 50.0}
            ]
        }))
        .unwrap();

        let input = RoundInput::from_request(request);
        let ids: Vec<String> = input
            .role_request(Role::Technical)
            .evidence
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ids, vec!["early"]);
    }
}
