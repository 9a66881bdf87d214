//! Outbound ports to external collaborators.
//!
//! These are the only suspension points in a decision cycle; the
//! orchestrator wraps each call in a bounded timeout and substitutes the
//! documented default on failure.

use async_trait::async_trait;
use shared_types::{StateVector, TxData};

/// Error raised by an external provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Per-transaction ML scores from the external model service.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MlScores {
    /// Spam probability in [0,1].
    pub spam_score: f64,
    /// Congestion score, >= 0, unbounded.
    pub congestion_score: f64,
    /// MEV risk in [0,1].
    pub mev_risk_score: f64,
}

impl Default for MlScores {
    /// Documented defaults when the provider is unavailable.
    fn default() -> Self {
        Self {
            spam_score: 0.5,
            congestion_score: 0.0,
            mev_risk_score: 0.0,
        }
    }
}

/// External feature/score provider.
#[async_trait]
pub trait ScoreProvider: Send + Sync {
    async fn scores(&self, tx: &TxData) -> Result<MlScores, ProviderError>;
}

/// External learned policy.
///
/// Given the 5-element state vector, returns one action code in 0..=3.
/// On failure the orchestrator uses action 0.
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    async fn decide(&self, state: &StateVector) -> Result<u8, ProviderError>;
}

/// What the audit collaborator receives per finalized decision.
#[derive(Clone, Debug, PartialEq)]
pub struct AuditReceipt {
    /// Content-addressed incident hash (sha256 hex).
    pub incident_hash: String,
    pub action_taken: u8,
    /// Risk on the 0-100 audit scale.
    pub risk_score: u8,
    /// Hash of the explanation artifact, when one was produced.
    pub explanation_hash: Option<String>,
}

/// Audit sink port.
///
/// Fire-and-forget: finalization never blocks on sink acknowledgement, and
/// re-submitting the same hash must be idempotent on the sink side.
pub trait AuditSink: Send + Sync {
    fn submit(&self, receipt: AuditReceipt);
}
