//! The decision orchestrator: one action and one incident per transaction,
//! under any combination of collaborator failures.

use crate::context::{DecisionContext, DecisionOutcome, DecisionSource};
use crate::explain::Explanation;
use crate::incident::{risk_score_0_100, IncidentLog};
use crate::ports::{AuditReceipt, AuditSink, MlScores, PolicyProvider, ScoreProvider};
use ms_01_reputation::ReputationCache;
use ms_02_rules::RuleEngine;
use ms_03_sandbox::SimulationSandbox;
use ms_04_mitigation::{MitigationStateMachine, MitigationStatus};
use ms_05_watchdog::HealthWatchdog;
use ms_06_monitoring::{
    CycleSample, DriftAlert, DriftDetector, HealingAction, MetricsWindow, PolicyFreeze, SelfHealer,
};
use primitive_types::U256;
use shared_types::{Clock, FeatureMap, MitigationAction, StateVector, TxData};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// ERC-20 `approve` selector, flagged as a rule-visible feature.
const SELECTOR_APPROVE: &str = "0x095ea7b3";

/// Orchestrator configuration.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Whether the learned policy path participates at all.
    pub policy_enabled: bool,
    /// Upper bound on one score-provider call.
    pub score_timeout: Duration,
    /// Upper bound on one policy-provider call.
    pub policy_timeout: Duration,
    /// Coarse false-positive prior recorded per cycle; no labeled feedback
    /// is available online.
    pub false_positive_prior: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            policy_enabled: true,
            score_timeout: Duration::from_secs(2),
            policy_timeout: Duration::from_secs(2),
            false_positive_prior: 0.05,
        }
    }
}

/// Read-only status snapshot for external reporting layers.
#[derive(Clone, Debug)]
pub struct SentinelStatus {
    pub mitigation: MitigationStatus,
    pub policy_frozen: bool,
    pub recent_drift_alerts: Vec<DriftAlert>,
    pub healing_history: Vec<HealingAction>,
    pub decisions_made: u64,
    pub rules_fired: u64,
    pub simulations_run: u64,
    pub incidents_logged: usize,
}

/// The control loop composing all subsystems into one decision per
/// transaction.
///
/// Owns nothing mutable itself beyond counters; all shared state lives in
/// the composed service objects, each safe for concurrent cycles. A started
/// decision always runs to finalization: exactly one applied action and
/// exactly one incident, even under full collaborator failure.
pub struct DecisionOrchestrator {
    reputation: Arc<ReputationCache>,
    rules: Arc<RuleEngine>,
    sandbox: Arc<SimulationSandbox>,
    mitigation: Arc<MitigationStateMachine>,
    watchdog: Arc<HealthWatchdog>,
    metrics: Arc<MetricsWindow>,
    drift: Arc<DriftDetector>,
    healer: Arc<SelfHealer>,
    freeze: Arc<PolicyFreeze>,
    incidents: Arc<IncidentLog>,
    score_provider: Arc<dyn ScoreProvider>,
    policy_provider: Arc<dyn PolicyProvider>,
    audit_sink: Arc<dyn AuditSink>,
    config: OrchestratorConfig,
    clock: Arc<dyn Clock>,
    decisions_made: AtomicU64,
    rules_fired: AtomicU64,
    simulations_run: AtomicU64,
}

#[allow(clippy::too_many_arguments)]
impl DecisionOrchestrator {
    pub fn new(
        reputation: Arc<ReputationCache>,
        rules: Arc<RuleEngine>,
        sandbox: Arc<SimulationSandbox>,
        mitigation: Arc<MitigationStateMachine>,
        watchdog: Arc<HealthWatchdog>,
        metrics: Arc<MetricsWindow>,
        drift: Arc<DriftDetector>,
        healer: Arc<SelfHealer>,
        freeze: Arc<PolicyFreeze>,
        incidents: Arc<IncidentLog>,
        score_provider: Arc<dyn ScoreProvider>,
        policy_provider: Arc<dyn PolicyProvider>,
        audit_sink: Arc<dyn AuditSink>,
        config: OrchestratorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reputation,
            rules,
            sandbox,
            mitigation,
            watchdog,
            metrics,
            drift,
            healer,
            freeze,
            incidents,
            score_provider,
            policy_provider,
            audit_sink,
            config,
            clock,
            decisions_made: AtomicU64::new(0),
            rules_fired: AtomicU64::new(0),
            simulations_run: AtomicU64::new(0),
        }
    }

    /// Decides one transaction.
    ///
    /// `supplied_features` carries upstream per-cycle observations
    /// (tx_count, avg_fee_rate, spam_ratio); absent fields fall back to
    /// neutral defaults. Never fails: collaborator errors degrade to their
    /// documented defaults.
    pub async fn decide(&self, tx: &TxData, supplied_features: FeatureMap) -> DecisionOutcome {
        self.decisions_made.fetch_add(1, Ordering::Relaxed);

        let mut ctx = DecisionContext {
            tx_hash: tx.hash.clone(),
            features: supplied_features,
            ..Default::default()
        };

        // Degraded system: short-circuit to the fallback directive before
        // touching any collaborator.
        let snapshot = self.watchdog.snapshot();
        if snapshot.directive.active {
            warn!(
                tx = %ctx.tx_hash,
                degraded = ?snapshot.degraded_services,
                action = %snapshot.directive.fallback_action,
                "system degraded; applying fallback action"
            );
            // FAIL_CLOSED carries a forced fee floor; raise up to it through
            // the state machine, the sole mutator.
            if let Some(floor) = snapshot.directive.forced_min_fee {
                let current = self.mitigation.status().min_fee;
                if current < floor {
                    self.mitigation.adjust_min_fee((floor - current) as i64);
                }
            }
            ctx.state_vector = self.build_state_vector(&ctx);
            return self.finalize(
                ctx,
                snapshot.directive.fallback_action,
                DecisionSource::Fallback,
            );
        }

        // Reputation enriches the rule/model context.
        let record = self.reputation.lookup(&tx.sender);
        ctx.features.merge(self.reputation.get_features(&tx.sender));
        ctx.reputation = Some(record);

        // Transaction-shape features visible to rules.
        ctx.features.set("value", u256_to_f64(tx.value));
        ctx.features.set("payload_size", tx.payload_len() as f64);
        ctx.features.set(
            "has_approval",
            tx.payload.to_ascii_lowercase().starts_with(SELECTOR_APPROVE),
        );

        // External scores, degraded to defaults on timeout or error.
        ctx.ml_scores = self.fetch_scores(tx).await;
        ctx.features.set("spam_score", ctx.ml_scores.spam_score);
        ctx.features
            .set("congestion_score", ctx.ml_scores.congestion_score);
        ctx.features
            .set("mev_risk_score", ctx.ml_scores.mev_risk_score);

        // Rule fast path: a terminal verdict ends the decision here.
        if let Some(matched) = self.rules.evaluate(&ctx.features) {
            self.rules_fired.fetch_add(1, Ordering::Relaxed);
            debug!(tx = %ctx.tx_hash, rule = %matched.rule_id, verdict = %matched.action, "rule matched");
            if matched.action.is_terminal() {
                let action = matched.action.mitigation();
                ctx.explanation = Some(Explanation::from_rule(&matched));
                ctx.rule_match = Some(matched);
                ctx.state_vector = self.build_state_vector(&ctx);
                return self.finalize(ctx, action, DecisionSource::Rule);
            }
            ctx.rule_match = Some(matched);
        }

        // Conditional sandbox analysis; its risk folds into the features.
        if self
            .sandbox
            .should_simulate(tx, ctx.ml_scores.spam_score)
        {
            let result = self.sandbox.simulate(tx, true);
            self.simulations_run.fetch_add(1, Ordering::Relaxed);
            ctx.features.set("simulation_risk", result.risk_score());
            ctx.simulation = Some(result);
        }

        ctx.state_vector = self.build_state_vector(&ctx);

        // Learned policy, unless disabled or frozen by the self-healer.
        if self.config.policy_enabled && !self.freeze.is_frozen() {
            match self.fetch_policy_action(&ctx.state_vector).await {
                Some(action) => {
                    ctx.explanation = Some(Explanation::from_scores(
                        &ctx.features,
                        ctx.ml_scores.spam_score,
                    ));
                    return self.finalize(ctx, action, DecisionSource::Policy);
                }
                None => {
                    // Documented provider-failure contract: action 0.
                    return self.finalize(ctx, MitigationAction::Monitor, DecisionSource::Default);
                }
            }
        }

        // Policy path unavailable: fall back to an advisory rule match,
        // else the safe default.
        match ctx.rule_match.take() {
            Some(matched) => {
                let action = matched.action.mitigation();
                ctx.explanation = Some(Explanation::from_rule(&matched));
                ctx.rule_match = Some(matched);
                self.finalize(ctx, action, DecisionSource::Rule)
            }
            None => self.finalize(ctx, MitigationAction::Monitor, DecisionSource::Default),
        }
    }

    /// Applies the action, records the incident, notifies the audit sink,
    /// and runs the self-monitoring epilogue. Infallible.
    fn finalize(
        &self,
        ctx: DecisionContext,
        action: MitigationAction,
        source: DecisionSource,
    ) -> DecisionOutcome {
        self.mitigation.apply(action);
        let mode = self.mitigation.mode();

        let confidence = ctx.explanation.as_ref().map_or(0.5, |e| e.confidence);
        let incident = self.incidents.record(
            &ctx.state_vector,
            action,
            mode.as_str(),
            confidence,
            self.clock.now_secs(),
        );

        let risk = risk_score_0_100(
            ctx.state_vector.avg_spam_score,
            ctx.state_vector.congestion_score,
        );
        // Fire-and-forget: the sink must not block finalization.
        self.audit_sink.submit(AuditReceipt {
            incident_hash: incident.hash.clone(),
            action_taken: action.code(),
            risk_score: risk,
            explanation_hash: ctx.explanation.as_ref().map(|e| e.hash.clone()),
        });

        info!(
            tx = %ctx.tx_hash,
            action = %action,
            source = %source,
            mode = %mode,
            incident = %&incident.hash[..12],
            risk,
            "decision finalized"
        );

        self.observe_cycle(&ctx, action, risk, confidence);

        DecisionOutcome {
            action,
            source,
            incident,
            rule_id: ctx.rule_match.map(|m| m.rule_id),
            explanation: ctx.explanation,
        }
    }

    /// Self-monitoring epilogue: metrics, drift detection, healing.
    fn observe_cycle(&self, ctx: &DecisionContext, action: MitigationAction, risk: u8, confidence: f64) {
        let state = &ctx.state_vector;
        let reward = -state.tx_count * 0.01 - state.spam_tx_ratio * 10.0;

        self.metrics.update(CycleSample {
            tx_count: state.tx_count,
            fee_rate: state.avg_fee_rate,
            congestion_score: state.congestion_score,
            spam_ratio: state.spam_tx_ratio,
            spam_score: state.avg_spam_score,
            false_positive: self.config.false_positive_prior,
            reward,
            action,
            risk_score: risk as f64,
            confidence,
        });

        let summary = self.metrics.summary();
        let alerts = self.drift.detect(&summary);
        if !alerts.is_empty() {
            let healed = self.healer.heal(&alerts);
            info!(
                alerts = alerts.len(),
                healed = healed.len(),
                "drift alerts handled"
            );
        }
    }

    async fn fetch_scores(&self, tx: &TxData) -> MlScores {
        match tokio::time::timeout(self.config.score_timeout, self.score_provider.scores(tx)).await
        {
            Ok(Ok(scores)) => scores,
            Ok(Err(e)) => {
                warn!(tx = %tx.hash, error = %e, "score provider failed; using defaults");
                MlScores::default()
            }
            Err(_) => {
                warn!(tx = %tx.hash, "score provider timed out; using defaults");
                MlScores::default()
            }
        }
    }

    /// Returns the policy's action, or `None` on failure, timeout, or an
    /// out-of-range action code.
    async fn fetch_policy_action(&self, state: &StateVector) -> Option<MitigationAction> {
        let outcome =
            tokio::time::timeout(self.config.policy_timeout, self.policy_provider.decide(state))
                .await;
        match outcome {
            Ok(Ok(code)) => match MitigationAction::from_code(code) {
                Some(action) => Some(action),
                None => {
                    warn!(code, "policy returned out-of-range action");
                    None
                }
            },
            Ok(Err(e)) => {
                warn!(error = %e, "policy provider failed");
                None
            }
            Err(_) => {
                warn!("policy provider timed out");
                None
            }
        }
    }

    fn build_state_vector(&self, ctx: &DecisionContext) -> StateVector {
        let get_or = |key: &str, default: f64| ctx.features.get(key).as_number().unwrap_or(default);
        StateVector {
            tx_count: get_or("tx_count", 5.0),
            avg_fee_rate: get_or("avg_fee_rate", 0.001),
            congestion_score: ctx.ml_scores.congestion_score,
            avg_spam_score: ctx.ml_scores.spam_score,
            spam_tx_ratio: get_or("spam_ratio", 0.1),
        }
    }

    /// Read-only observability snapshot; defines no wire format.
    pub fn status(&self) -> SentinelStatus {
        SentinelStatus {
            mitigation: self.mitigation.status(),
            policy_frozen: self.freeze.is_frozen(),
            recent_drift_alerts: self.drift.recent_alerts(10),
            healing_history: self.healer.history(),
            decisions_made: self.decisions_made.load(Ordering::Relaxed),
            rules_fired: self.rules_fired.load(Ordering::Relaxed),
            simulations_run: self.simulations_run.load(Ordering::Relaxed),
            incidents_logged: self.incidents.len(),
        }
    }
}

/// Saturating conversion for rule-context arithmetic; wei values above
/// u128::MAX collapse to the largest representable magnitude.
fn u256_to_f64(value: U256) -> f64 {
    if value > U256::from(u128::MAX) {
        u128::MAX as f64
    } else {
        value.as_u128() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_to_f64() {
        assert_eq!(u256_to_f64(U256::zero()), 0.0);
        assert_eq!(u256_to_f64(U256::from(1_500u64)), 1_500.0);
        let huge = U256::MAX;
        assert_eq!(u256_to_f64(huge), u128::MAX as f64);
    }
}
