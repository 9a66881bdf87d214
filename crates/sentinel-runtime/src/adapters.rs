//! Default collaborator adapters for standalone operation.
//!
//! Production deployments replace these with adapters to the real model
//! service, trained policy, and audit pipeline; the defaults keep the
//! sentinel functional (and honest about it in the logs) without them.

use async_trait::async_trait;
use ms_05_watchdog::{HealthProbe, ProbeError};
use ms_07_decision::{AuditReceipt, AuditSink, MlScores, PolicyProvider, ProviderError, ScoreProvider};
use shared_types::{StateVector, TxData};
use tracing::info;

/// Serves one fixed score set for every transaction.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticScoreProvider {
    pub scores: MlScores,
}

impl StaticScoreProvider {
    pub fn new(scores: MlScores) -> Self {
        Self { scores }
    }
}

#[async_trait]
impl ScoreProvider for StaticScoreProvider {
    async fn scores(&self, _tx: &TxData) -> Result<MlScores, ProviderError> {
        Ok(self.scores)
    }
}

/// Deterministic threshold policy, a stand-in for the trained policy
/// service. Conservative by construction: it only escalates on clear
/// signals and never blocks on ambiguity.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThresholdPolicy;

#[async_trait]
impl PolicyProvider for ThresholdPolicy {
    async fn decide(&self, state: &StateVector) -> Result<u8, ProviderError> {
        let action = if state.spam_tx_ratio > 0.6 {
            3
        } else if state.avg_spam_score > 0.7 {
            2
        } else if state.congestion_score > 10_000.0 {
            1
        } else {
            0
        };
        Ok(action)
    }
}

/// Audit sink that logs receipts through tracing.
///
/// Fire-and-forget by construction; an external submitter tails these
/// records and handles ledger delivery and retries.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn submit(&self, receipt: AuditReceipt) {
        info!(
            incident = %receipt.incident_hash,
            action = receipt.action_taken,
            risk = receipt.risk_score,
            explanation = receipt.explanation_hash.as_deref().unwrap_or("-"),
            "incident receipt"
        );
    }
}

/// Health probe wrapping a plain closure.
pub struct FnProbe<F>(pub F);

#[async_trait]
impl<F> HealthProbe for FnProbe<F>
where
    F: Fn() -> Result<bool, ProbeError> + Send + Sync,
{
    async fn check(&self) -> Result<bool, ProbeError> {
        (self.0)()
    }
}
