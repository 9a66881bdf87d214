//! # Mempool-Sentinel Runtime
//!
//! Composition root for the admission-control middleware.
//!
//! Every subsystem is an explicitly constructed, process-scoped service
//! object owned here and shared by reference; there is no module-level
//! mutable state anywhere in the workspace.
//!
//! ## Startup Sequence
//!
//! 1. Build configuration (defaults, then overrides)
//! 2. Construct subsystems leaves-first (clock → caches/engines → state
//!    machine → monitoring → orchestrator)
//! 3. Seed address lists and the default rule set
//! 4. Spawn the watchdog background loop
//! 5. Serve admission decisions
//!
//! ## The Admission Entrypoint
//!
//! `Sentinel::admit` runs one full decision cycle for a transaction and
//! then gates it against the resulting enforcement state, returning both
//! the decision (action, source, incident) and the admission verdict
//! (admit, delay, or reject).

pub mod adapters;
pub mod config;

pub use adapters::{FnProbe, LogAuditSink, StaticScoreProvider, ThresholdPolicy};
pub use config::{MonitoringConfig, SentinelConfig};

use ms_01_reputation::ReputationCache;
use ms_02_rules::RuleEngine;
use ms_03_sandbox::SimulationSandbox;
use ms_04_mitigation::{AdmissionDecision, MitigationStateMachine};
use ms_05_watchdog::{HealthProbe, HealthWatchdog};
use ms_06_monitoring::{DriftDetector, MetricsWindow, PolicyFreeze, SelfHealer};
use ms_07_decision::{
    AuditSink, DecisionOrchestrator, DecisionOutcome, IncidentLog, PolicyProvider, ScoreProvider,
    SentinelStatus,
};
use shared_types::{Address, Clock, FeatureMap, SystemClock, TxData};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// One admitted-or-rejected transaction: the full decision plus the gate
/// verdict derived from the post-decision enforcement state.
#[derive(Clone, Debug)]
pub struct Admission {
    pub decision: DecisionOutcome,
    pub verdict: AdmissionDecision,
}

/// Builder for the sentinel composition root.
pub struct SentinelBuilder {
    config: SentinelConfig,
    clock: Arc<dyn Clock>,
    score_provider: Arc<dyn ScoreProvider>,
    policy_provider: Arc<dyn PolicyProvider>,
    audit_sink: Arc<dyn AuditSink>,
    probes: Vec<(String, Arc<dyn HealthProbe>)>,
}

impl SentinelBuilder {
    pub fn new() -> Self {
        Self {
            config: SentinelConfig::standard(),
            clock: Arc::new(SystemClock),
            score_provider: Arc::new(StaticScoreProvider::default()),
            policy_provider: Arc::new(ThresholdPolicy),
            audit_sink: Arc::new(LogAuditSink),
            probes: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: SentinelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_score_provider(mut self, provider: Arc<dyn ScoreProvider>) -> Self {
        self.score_provider = provider;
        self
    }

    pub fn with_policy_provider(mut self, provider: Arc<dyn PolicyProvider>) -> Self {
        self.policy_provider = provider;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = sink;
        self
    }

    /// Registers a health probe for a named dependent service.
    pub fn with_probe(mut self, name: impl Into<String>, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push((name.into(), probe));
        self
    }

    /// Wires the full subsystem graph.
    pub fn build(self) -> Sentinel {
        let clock = self.clock;

        let reputation = Arc::new(ReputationCache::new(self.config.reputation, clock.clone()));
        for address in &self.config.blacklist {
            reputation.add_to_blacklist(Address::new(address.as_str()), "configured");
        }
        for address in &self.config.whitelist {
            reputation.add_to_whitelist(Address::new(address.as_str()));
        }

        let rules = if self.config.seed_default_rules {
            Arc::new(RuleEngine::with_default_rules(clock.clone()))
        } else {
            Arc::new(RuleEngine::new(clock.clone()))
        };

        let sandbox = Arc::new(SimulationSandbox::new(self.config.sandbox, clock.clone()));
        let mitigation = Arc::new(MitigationStateMachine::new(clock.clone()));

        let watchdog = Arc::new(HealthWatchdog::new(self.config.watchdog, clock.clone()));
        for (name, probe) in self.probes {
            watchdog.register_service(name, probe);
        }

        let metrics = Arc::new(MetricsWindow::new(self.config.monitoring.window_capacity));
        let drift = Arc::new(DriftDetector::new(self.config.drift, clock.clone()));
        let freeze = Arc::new(PolicyFreeze::new());
        let healer = Arc::new(SelfHealer::new(
            mitigation.clone(),
            freeze.clone(),
            clock.clone(),
        ));
        let incidents = Arc::new(IncidentLog::new());

        let orchestrator = Arc::new(DecisionOrchestrator::new(
            reputation.clone(),
            rules.clone(),
            sandbox,
            mitigation.clone(),
            watchdog.clone(),
            metrics,
            drift,
            healer,
            freeze.clone(),
            incidents,
            self.score_provider,
            self.policy_provider,
            self.audit_sink,
            self.config.orchestrator,
            clock,
        ));

        let (shutdown_tx, _) = watch::channel(false);

        Sentinel {
            reputation,
            rules,
            mitigation,
            watchdog,
            freeze,
            orchestrator,
            shutdown_tx,
            watchdog_task: None,
        }
    }
}

impl Default for SentinelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The running sentinel: all subsystems wired, watchdog loop optional.
pub struct Sentinel {
    reputation: Arc<ReputationCache>,
    rules: Arc<RuleEngine>,
    mitigation: Arc<MitigationStateMachine>,
    watchdog: Arc<HealthWatchdog>,
    freeze: Arc<PolicyFreeze>,
    orchestrator: Arc<DecisionOrchestrator>,
    shutdown_tx: watch::Sender<bool>,
    watchdog_task: Option<tokio::task::JoinHandle<()>>,
}

impl Sentinel {
    pub fn builder() -> SentinelBuilder {
        SentinelBuilder::new()
    }

    /// Spawns the watchdog background loop. Idempotent.
    pub fn start(&mut self) {
        if self.watchdog_task.is_none() {
            let handle = self
                .watchdog
                .clone()
                .spawn(self.shutdown_tx.subscribe());
            self.watchdog_task = Some(handle);
            info!("sentinel started");
        }
    }

    /// Runs one decision cycle and gates the transaction against the
    /// resulting enforcement state.
    pub async fn admit(&self, tx: &TxData, features: FeatureMap) -> Admission {
        let decision = self.orchestrator.decide(tx, features).await;
        let verdict = self
            .mitigation
            .should_admit_tx(tx.fee, decision.incident.avg_spam_score);
        Admission { decision, verdict }
    }

    /// Decision without the admission gate (decision-only callers).
    pub async fn decide(&self, tx: &TxData, features: FeatureMap) -> DecisionOutcome {
        self.orchestrator.decide(tx, features).await
    }

    /// Read-only status snapshot for reporting layers.
    pub fn status(&self) -> SentinelStatus {
        self.orchestrator.status()
    }

    pub fn reputation(&self) -> &Arc<ReputationCache> {
        &self.reputation
    }

    pub fn rules(&self) -> &Arc<RuleEngine> {
        &self.rules
    }

    pub fn mitigation(&self) -> &Arc<MitigationStateMachine> {
        &self.mitigation
    }

    pub fn watchdog(&self) -> &Arc<HealthWatchdog> {
        &self.watchdog
    }

    pub fn freeze(&self) -> &Arc<PolicyFreeze> {
        &self.freeze
    }

    /// Stops the watchdog loop and waits for it to exit.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.watchdog_task.take() {
            let _ = handle.await;
        }
        info!("sentinel stopped");
    }
}
