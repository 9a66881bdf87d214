//! Threshold-based drift detection over window summaries.

use crate::window::MetricsSummary;
use parking_lot::RwLock;
use shared_types::{Clock, Timestamp};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;

/// Bound on the retained alert history.
const ALERT_HISTORY_CAP: usize = 512;

/// Kind of detected drift.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DriftKind {
    /// Spam ratio too high; the environment is hostile.
    HighSpamEnv,
    /// False-positive rate too high; the model over-blocks.
    ModelTooAggressive,
    /// Rewards declining; the learned policy is decaying.
    RlPolicyDegrading,
    /// Average risk at critical levels.
    CriticalRisk,
    /// Model confidence too low to trust.
    LowModelConfidence,
}

impl DriftKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftKind::HighSpamEnv => "HIGH_SPAM_ENV",
            DriftKind::ModelTooAggressive => "MODEL_TOO_AGGRESSIVE",
            DriftKind::RlPolicyDegrading => "RL_POLICY_DEGRADING",
            DriftKind::CriticalRisk => "CRITICAL_RISK",
            DriftKind::LowModelConfidence => "LOW_MODEL_CONFIDENCE",
        }
    }
}

impl std::fmt::Display for DriftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DriftSeverity {
    Medium,
    High,
    Critical,
}

impl DriftSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftSeverity::Medium => "MEDIUM",
            DriftSeverity::High => "HIGH",
            DriftSeverity::Critical => "CRITICAL",
        }
    }
}

/// One drift alert, derived per cycle from the window summary.
#[derive(Clone, Debug)]
pub struct DriftAlert {
    pub kind: DriftKind,
    pub severity: DriftSeverity,
    pub message: String,
    pub suggested_action: &'static str,
    pub timestamp: Timestamp,
}

/// Fixed detection thresholds.
#[derive(Clone, Copy, Debug)]
pub struct DriftThresholds {
    pub spam_ratio_high: f64,
    pub fp_rate_high: f64,
    pub reward_low: f64,
    pub risk_score_critical: f64,
    pub confidence_low: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            spam_ratio_high: 0.6,
            fp_rate_high: 0.25,
            reward_low: -50.0,
            risk_score_critical: 90.0,
            confidence_low: 0.7,
        }
    }
}

/// Threshold detector over metrics summaries.
///
/// Conditions are independent: one summary can raise several alerts.
pub struct DriftDetector {
    thresholds: DriftThresholds,
    history: RwLock<VecDeque<DriftAlert>>,
    clock: Arc<dyn Clock>,
}

impl DriftDetector {
    pub fn new(thresholds: DriftThresholds, clock: Arc<dyn Clock>) -> Self {
        Self {
            thresholds,
            history: RwLock::new(VecDeque::new()),
            clock,
        }
    }

    /// Evaluates the thresholds against one summary.
    ///
    /// Returns zero or more alerts and appends them to the alert history.
    /// An empty window raises nothing: there is no evidence to drift on.
    pub fn detect(&self, summary: &MetricsSummary) -> Vec<DriftAlert> {
        if summary.samples_collected == 0 {
            return Vec::new();
        }

        let now = self.clock.now_ms();
        let mut alerts = Vec::new();

        if summary.avg_spam_ratio > self.thresholds.spam_ratio_high {
            alerts.push(DriftAlert {
                kind: DriftKind::HighSpamEnv,
                severity: DriftSeverity::High,
                message: format!(
                    "spam ratio {:.2} exceeds threshold {:.2}",
                    summary.avg_spam_ratio, self.thresholds.spam_ratio_high
                ),
                suggested_action: "force defensive mode",
                timestamp: now,
            });
        }

        if summary.fp_rate > self.thresholds.fp_rate_high {
            alerts.push(DriftAlert {
                kind: DriftKind::ModelTooAggressive,
                severity: DriftSeverity::Medium,
                message: format!(
                    "false positive rate {:.2} exceeds threshold {:.2}",
                    summary.fp_rate, self.thresholds.fp_rate_high
                ),
                suggested_action: "lower the fee floor",
                timestamp: now,
            });
        }

        if summary.avg_reward < self.thresholds.reward_low {
            alerts.push(DriftAlert {
                kind: DriftKind::RlPolicyDegrading,
                severity: DriftSeverity::High,
                message: format!(
                    "average reward {:.2} below threshold {:.2}",
                    summary.avg_reward, self.thresholds.reward_low
                ),
                suggested_action: "freeze the policy path",
                timestamp: now,
            });
        }

        if summary.avg_risk_score > self.thresholds.risk_score_critical {
            alerts.push(DriftAlert {
                kind: DriftKind::CriticalRisk,
                severity: DriftSeverity::Critical,
                message: format!("average risk score {:.0} is critical", summary.avg_risk_score),
                suggested_action: "maximum defensive posture",
                timestamp: now,
            });
        }

        if summary.avg_confidence < self.thresholds.confidence_low {
            alerts.push(DriftAlert {
                kind: DriftKind::LowModelConfidence,
                severity: DriftSeverity::Medium,
                message: format!(
                    "model confidence {:.2} below threshold {:.2}",
                    summary.avg_confidence, self.thresholds.confidence_low
                ),
                suggested_action: "flag model for review",
                timestamp: now,
            });
        }

        if !alerts.is_empty() {
            for alert in &alerts {
                warn!(
                    kind = %alert.kind,
                    severity = alert.severity.as_str(),
                    message = %alert.message,
                    "drift detected"
                );
            }
            let mut history = self.history.write();
            for alert in &alerts {
                if history.len() == ALERT_HISTORY_CAP {
                    history.pop_front();
                }
                history.push_back(alert.clone());
            }
        }

        alerts
    }

    /// The `n` most recent alerts, oldest first.
    pub fn recent_alerts(&self, n: usize) -> Vec<DriftAlert> {
        let history = self.history.read();
        history.iter().rev().take(n).rev().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}
