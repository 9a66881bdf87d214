//! Full decision-loop flows against mock collaborators.

use async_trait::async_trait;
use ms_01_reputation::{ReputationCache, ReputationConfig};
use ms_02_rules::RuleEngine;
use ms_03_sandbox::{SandboxConfig, SimulationSandbox};
use ms_04_mitigation::{MitigationMode, MitigationStateMachine};
use ms_05_watchdog::{
    FallbackPolicy, HealthProbe, HealthWatchdog, ProbeError, WatchdogConfig,
};
use ms_06_monitoring::{
    DriftDetector, DriftThresholds, MetricsWindow, PolicyFreeze, SelfHealer,
};
use ms_07_decision::{
    AuditReceipt, AuditSink, DecisionOrchestrator, DecisionSource, IncidentLog, MlScores,
    OrchestratorConfig, PolicyProvider, ProviderError, ScoreProvider,
};
use parking_lot::Mutex;
use primitive_types::U256;
use shared_types::{
    Address, FeatureMap, ManualClock, MitigationAction, StateVector, TxData,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct StaticScores(MlScores);

#[async_trait]
impl ScoreProvider for StaticScores {
    async fn scores(&self, _tx: &TxData) -> Result<MlScores, ProviderError> {
        Ok(self.0)
    }
}

struct FailingScores;

#[async_trait]
impl ScoreProvider for FailingScores {
    async fn scores(&self, _tx: &TxData) -> Result<MlScores, ProviderError> {
        Err(ProviderError::new("model service unreachable"))
    }
}

struct StaticPolicy {
    action: u8,
    calls: AtomicU64,
}

impl StaticPolicy {
    fn new(action: u8) -> Self {
        Self {
            action,
            calls: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl PolicyProvider for StaticPolicy {
    async fn decide(&self, _state: &StateVector) -> Result<u8, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.action)
    }
}

struct FailingPolicy;

#[async_trait]
impl PolicyProvider for FailingPolicy {
    async fn decide(&self, _state: &StateVector) -> Result<u8, ProviderError> {
        Err(ProviderError::new("policy service unreachable"))
    }
}

#[derive(Default)]
struct RecordingSink {
    receipts: Mutex<Vec<AuditReceipt>>,
}

impl AuditSink for RecordingSink {
    fn submit(&self, receipt: AuditReceipt) {
        self.receipts.lock().push(receipt);
    }
}

struct FailingProbe;

#[async_trait]
impl HealthProbe for FailingProbe {
    async fn check(&self) -> Result<bool, ProbeError> {
        Err(ProbeError::new("connection refused"))
    }
}

struct Harness {
    orchestrator: DecisionOrchestrator,
    clock: Arc<ManualClock>,
    reputation: Arc<ReputationCache>,
    mitigation: Arc<MitigationStateMachine>,
    watchdog: Arc<HealthWatchdog>,
    freeze: Arc<PolicyFreeze>,
    incidents: Arc<IncidentLog>,
    policy: Arc<StaticPolicy>,
    sink: Arc<RecordingSink>,
}

fn build_harness(
    scores: Arc<dyn ScoreProvider>,
    policy_provider: Arc<dyn PolicyProvider>,
    policy: Arc<StaticPolicy>,
    fallback_policy: FallbackPolicy,
) -> Harness {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let clock_dyn: Arc<dyn shared_types::Clock> = clock.clone();

    let reputation = Arc::new(ReputationCache::new(
        ReputationConfig::default(),
        clock_dyn.clone(),
    ));
    let rules = Arc::new(RuleEngine::with_default_rules(clock_dyn.clone()));
    let sandbox = Arc::new(SimulationSandbox::new(
        SandboxConfig::default(),
        clock_dyn.clone(),
    ));
    let mitigation = Arc::new(MitigationStateMachine::new(clock_dyn.clone()));
    let watchdog = Arc::new(HealthWatchdog::new(
        WatchdogConfig {
            check_interval: Duration::from_secs(30),
            failure_threshold: 3,
            probe_timeout: Duration::from_millis(50),
            fallback_policy,
        },
        clock_dyn.clone(),
    ));
    let metrics = Arc::new(MetricsWindow::with_defaults());
    let drift = Arc::new(DriftDetector::new(
        DriftThresholds::default(),
        clock_dyn.clone(),
    ));
    let freeze = Arc::new(PolicyFreeze::new());
    let healer = Arc::new(SelfHealer::new(
        mitigation.clone(),
        freeze.clone(),
        clock_dyn.clone(),
    ));
    let incidents = Arc::new(IncidentLog::new());
    let sink = Arc::new(RecordingSink::default());

    let orchestrator = DecisionOrchestrator::new(
        reputation.clone(),
        rules,
        sandbox,
        mitigation.clone(),
        watchdog.clone(),
        metrics,
        drift,
        healer,
        freeze.clone(),
        incidents.clone(),
        scores,
        policy_provider,
        sink.clone(),
        OrchestratorConfig::default(),
        clock_dyn,
    );

    Harness {
        orchestrator,
        clock,
        reputation,
        mitigation,
        watchdog,
        freeze,
        incidents,
        policy,
        sink,
    }
}

fn harness_with(
    scores: Arc<dyn ScoreProvider>,
    policy: Arc<StaticPolicy>,
    fallback_policy: FallbackPolicy,
) -> Harness {
    build_harness(scores, policy.clone(), policy, fallback_policy)
}

fn harness() -> Harness {
    harness_with(
        Arc::new(StaticScores(MlScores {
            spam_score: 0.2,
            congestion_score: 1_000.0,
            mev_risk_score: 0.0,
        })),
        Arc::new(StaticPolicy::new(2)),
        FallbackPolicy::FailOpen,
    )
}

fn tx(sender: &str, value_wei: u128) -> TxData {
    TxData {
        hash: format!("0x{}", sender.trim_start_matches("0x")),
        sender: Address::new(sender),
        recipient: Address::new("0xrecipient"),
        value: U256::from(value_wei),
        payload: String::new(),
        gas: 21_000,
        fee: 3,
    }
}

#[tokio::test]
async fn test_blacklisted_sender_is_blocked_by_rule() {
    let h = harness();
    h.reputation
        .add_to_blacklist(Address::new("0xbad"), "drainer");

    let outcome = h.orchestrator.decide(&tx("0xbad", 1_000), FeatureMap::new()).await;

    assert_eq!(outcome.action, MitigationAction::Defensive);
    assert_eq!(outcome.source, DecisionSource::Rule);
    assert_eq!(outcome.rule_id.as_deref(), Some("block_blacklisted"));
    assert_eq!(h.mitigation.status().mode, MitigationMode::Defensive);
    // Hard short-circuit: the policy was never consulted.
    assert_eq!(h.policy.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_whitelisted_sender_passes_without_policy() {
    let h = harness();
    h.reputation.add_to_whitelist(Address::new("0xgood"));

    let outcome = h
        .orchestrator
        .decide(&tx("0xgood", 1_000), FeatureMap::new())
        .await;

    assert_eq!(outcome.action, MitigationAction::Monitor);
    assert_eq!(outcome.source, DecisionSource::Rule);
    assert_eq!(outcome.rule_id.as_deref(), Some("whitelisted_pass"));
    assert_eq!(h.policy.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_clean_transaction_takes_policy_action() {
    let h = harness();

    let outcome = h
        .orchestrator
        .decide(&tx("0xneutral", 1_000), FeatureMap::new())
        .await;

    assert_eq!(outcome.action, MitigationAction::DeprioritizeSpam);
    assert_eq!(outcome.source, DecisionSource::Policy);
    assert_eq!(
        h.mitigation.status().mode,
        MitigationMode::SpamDeprioritization
    );
    assert_eq!(h.policy.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_frozen_policy_yields_safe_default() {
    let h = harness_with(
        Arc::new(StaticScores(MlScores {
            spam_score: 0.2,
            congestion_score: 0.0,
            mev_risk_score: 0.0,
        })),
        Arc::new(StaticPolicy::new(3)),
        FallbackPolicy::FailOpen,
    );
    h.freeze.freeze();

    let outcome = h
        .orchestrator
        .decide(&tx("0xneutral", 1_000), FeatureMap::new())
        .await;

    // Frozen: action 0 regardless of what the policy would say.
    assert_eq!(outcome.action, MitigationAction::Monitor);
    assert_eq!(outcome.source, DecisionSource::Default);
    assert_eq!(h.policy.calls.load(Ordering::SeqCst), 0);

    // Explicit unfreeze restores the policy path.
    h.freeze.unfreeze();
    let outcome = h
        .orchestrator
        .decide(&tx("0xneutral", 1_000), FeatureMap::new())
        .await;
    assert_eq!(outcome.action, MitigationAction::Defensive);
    assert_eq!(outcome.source, DecisionSource::Policy);
    assert_eq!(h.policy.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_degrading_rewards_freeze_policy_end_to_end() {
    let h = harness();

    // A hostile window: enough volume to push the reward below -50.
    let mut supplied = FeatureMap::new();
    supplied.set("tx_count", 10_000.0);
    supplied.set("spam_ratio", 0.2);

    h.orchestrator
        .decide(&tx("0xneutral", 1_000), supplied)
        .await;

    // The drift detector saw avg reward -102 and the healer froze the
    // policy path.
    assert!(h.freeze.is_frozen());
    let status = h.orchestrator.status();
    assert!(!status.healing_history.is_empty());

    // Subsequent cycles no longer consult the policy.
    let calls_before = h.policy.calls.load(Ordering::SeqCst);
    let outcome = h
        .orchestrator
        .decide(&tx("0xneutral", 1_000), FeatureMap::new())
        .await;
    assert_eq!(outcome.action, MitigationAction::Monitor);
    assert_eq!(h.policy.calls.load(Ordering::SeqCst), calls_before);
}

#[tokio::test]
async fn test_full_collaborator_failure_still_finalizes() {
    let h = build_harness(
        Arc::new(FailingScores),
        Arc::new(FailingPolicy),
        Arc::new(StaticPolicy::new(0)),
        FallbackPolicy::FailOpen,
    );

    let outcome = h
        .orchestrator
        .decide(&tx("0xneutral", 1_000), FeatureMap::new())
        .await;

    // Full collaborator failure still finalizes: action 0, one incident,
    // one audit receipt.
    assert_eq!(outcome.action, MitigationAction::Monitor);
    assert_eq!(outcome.source, DecisionSource::Default);
    assert_eq!(h.incidents.len(), 1);
    assert_eq!(
        h.incidents.get(&outcome.incident.hash),
        Some(outcome.incident.clone())
    );
    assert_eq!(h.sink.receipts.lock().len(), 1);
}

#[tokio::test]
async fn test_degraded_fail_closed_forces_defensive_for_everyone() {
    let h = harness_with(
        Arc::new(StaticScores(MlScores::default())),
        Arc::new(StaticPolicy::new(0)),
        FallbackPolicy::FailClosed,
    );
    // Even a whitelisted sender is not exempt from the fallback path.
    h.reputation.add_to_whitelist(Address::new("0xgood"));

    h.watchdog
        .register_service("ml_service", Arc::new(FailingProbe));
    h.watchdog.check_all().await;

    for sender in ["0xgood", "0xneutral", "0xother"] {
        let outcome = h
            .orchestrator
            .decide(&tx(sender, 1_000), FeatureMap::new())
            .await;
        assert_eq!(outcome.action, MitigationAction::Defensive);
        assert_eq!(outcome.source, DecisionSource::Fallback);
    }
    let status = h.mitigation.status();
    assert_eq!(status.mode, MitigationMode::Defensive);
    // FAIL_CLOSED raised the floor to its forced minimum before the
    // defensive applications stacked on top.
    assert!(status.min_fee >= 50);
    assert_eq!(h.policy.calls.load(Ordering::SeqCst), 0);
    // Each fallback decision still produced an audit receipt.
    assert_eq!(h.sink.receipts.lock().len(), 3);
}

#[tokio::test]
async fn test_high_value_transaction_is_simulated() {
    let h = harness();

    // 50 ETH plain transfer: passes rules, triggers the sandbox gate.
    let outcome = h
        .orchestrator
        .decide(
            &tx("0xwhale", 50_000_000_000_000_000_000),
            FeatureMap::new(),
        )
        .await;

    assert_eq!(outcome.source, DecisionSource::Policy);
    assert_eq!(h.orchestrator.status().simulations_run, 1);
}

#[tokio::test]
async fn test_every_decision_yields_exactly_one_incident() {
    let h = harness();

    for i in 0..5 {
        h.clock.advance(1_000);
        let outcome = h
            .orchestrator
            .decide(&tx(&format!("0xuser{}", i), 1_000), FeatureMap::new())
            .await;
        assert!(!outcome.incident.hash.is_empty());
    }

    assert_eq!(h.incidents.len(), 5);
    assert_eq!(h.sink.receipts.lock().len(), 5);
    let status = h.orchestrator.status();
    assert_eq!(status.decisions_made, 5);
    assert_eq!(status.incidents_logged, 5);
}

#[tokio::test]
async fn test_status_surface_reflects_state() {
    let h = harness();
    h.reputation
        .add_to_blacklist(Address::new("0xbad"), "drainer");

    h.orchestrator
        .decide(&tx("0xbad", 1_000), FeatureMap::new())
        .await;

    let status = h.orchestrator.status();
    assert_eq!(status.decisions_made, 1);
    assert_eq!(status.rules_fired, 1);
    assert_eq!(status.mitigation.mode, MitigationMode::Defensive);
    assert!(!status.policy_frozen);
    assert_eq!(status.incidents_logged, 1);
}
