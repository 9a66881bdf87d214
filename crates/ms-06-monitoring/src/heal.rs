//! Safe, reversible healing responses to drift alerts.

use crate::drift::{DriftAlert, DriftKind};
use ms_04_mitigation::MitigationStateMachine;
use parking_lot::RwLock;
use shared_types::{Clock, MitigationAction, Timestamp};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Bound on the retained healing history.
const HEALING_HISTORY_CAP: usize = 256;

/// Healing response taken for one alert kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealingKind {
    /// Forced the state machine into DEFENSIVE mode.
    ForceDefensive,
    /// Lowered the fee floor to cut false positives.
    LowerThreshold,
    /// Froze the learned policy path.
    FreezePolicy,
    /// Defensive mode plus an extra fee floor raise.
    MaxDefense,
    /// Flagged the model for manual review; no state mutated.
    FlagForReview,
}

impl HealingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealingKind::ForceDefensive => "FORCE_DEFENSIVE",
            HealingKind::LowerThreshold => "LOWER_THRESHOLD",
            HealingKind::FreezePolicy => "FREEZE_POLICY",
            HealingKind::MaxDefense => "MAX_DEFENSE",
            HealingKind::FlagForReview => "FLAG_FOR_REVIEW",
        }
    }
}

/// One recorded healing action.
#[derive(Clone, Debug)]
pub struct HealingAction {
    pub kind: HealingKind,
    /// The alert kind that triggered this action.
    pub reason: DriftKind,
    pub timestamp: Timestamp,
}

/// Shared freeze flag for the learned policy path.
///
/// Frozen means subsequent decision cycles ignore the policy provider and
/// use the safe default until explicitly unfrozen. This is cross-cycle
/// mutable state; the atomic keeps reads wait-free on the decision path.
#[derive(Debug, Default)]
pub struct PolicyFreeze {
    frozen: AtomicBool,
}

impl PolicyFreeze {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::SeqCst);
    }

    pub fn unfreeze(&self) {
        self.frozen.store(false, Ordering::SeqCst);
        info!("policy path unfrozen");
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }
}

/// Maps drift alerts to bounded corrective actions.
///
/// Never retrains, never destroys state; every response is reversible via
/// `MitigationStateMachine::reset()` and `PolicyFreeze::unfreeze()`.
pub struct SelfHealer {
    mitigation: Arc<MitigationStateMachine>,
    freeze: Arc<PolicyFreeze>,
    history: RwLock<VecDeque<HealingAction>>,
    clock: Arc<dyn Clock>,
}

impl SelfHealer {
    pub fn new(
        mitigation: Arc<MitigationStateMachine>,
        freeze: Arc<PolicyFreeze>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mitigation,
            freeze,
            history: RwLock::new(VecDeque::new()),
            clock,
        }
    }

    /// Applies one deterministic response per alert kind.
    ///
    /// Duplicate kinds within a single call heal once (idempotent per
    /// cycle). Returns the actions taken, in alert order.
    pub fn heal(&self, alerts: &[DriftAlert]) -> Vec<HealingAction> {
        let now = self.clock.now_ms();
        let mut handled: HashSet<DriftKind> = HashSet::new();
        let mut actions = Vec::new();

        for alert in alerts {
            if !handled.insert(alert.kind) {
                continue;
            }
            let kind = match alert.kind {
                DriftKind::HighSpamEnv => {
                    self.mitigation.apply(MitigationAction::Defensive);
                    info!("healing: forced DEFENSIVE mode for hostile spam environment");
                    HealingKind::ForceDefensive
                }
                DriftKind::ModelTooAggressive => {
                    let floor = self.mitigation.adjust_min_fee(-10);
                    info!(min_fee = floor, "healing: lowered fee floor");
                    HealingKind::LowerThreshold
                }
                DriftKind::RlPolicyDegrading => {
                    self.freeze.freeze();
                    warn!("healing: policy path frozen, safe fallback in effect");
                    HealingKind::FreezePolicy
                }
                DriftKind::CriticalRisk => {
                    self.mitigation.apply(MitigationAction::Defensive);
                    let floor = self.mitigation.adjust_min_fee(50);
                    warn!(min_fee = floor, "healing: maximum defensive posture");
                    HealingKind::MaxDefense
                }
                DriftKind::LowModelConfidence => {
                    warn!("healing: model flagged for manual review");
                    HealingKind::FlagForReview
                }
            };
            actions.push(HealingAction {
                kind,
                reason: alert.kind,
                timestamp: now,
            });
        }

        if !actions.is_empty() {
            let mut history = self.history.write();
            for action in &actions {
                if history.len() == HEALING_HISTORY_CAP {
                    history.pop_front();
                }
                history.push_back(action.clone());
            }
        }

        actions
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze.is_frozen()
    }

    /// Clones the healing history.
    pub fn history(&self) -> Vec<HealingAction> {
        self.history.read().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::DriftSeverity;
    use ms_04_mitigation::MitigationMode;
    use shared_types::ManualClock;

    fn alert(kind: DriftKind) -> DriftAlert {
        DriftAlert {
            kind,
            severity: DriftSeverity::High,
            message: "test".into(),
            suggested_action: "test",
            timestamp: 0,
        }
    }

    fn healer() -> (SelfHealer, Arc<MitigationStateMachine>, Arc<PolicyFreeze>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let mitigation = Arc::new(MitigationStateMachine::new(clock.clone()));
        let freeze = Arc::new(PolicyFreeze::new());
        (
            SelfHealer::new(mitigation.clone(), freeze.clone(), clock),
            mitigation,
            freeze,
        )
    }

    #[test]
    fn test_high_spam_forces_defensive() {
        let (healer, mitigation, _) = healer();
        let actions = healer.heal(&[alert(DriftKind::HighSpamEnv)]);

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, HealingKind::ForceDefensive);
        assert_eq!(actions[0].reason, DriftKind::HighSpamEnv);
        assert_eq!(mitigation.status().mode, MitigationMode::Defensive);
    }

    #[test]
    fn test_aggressive_model_lowers_floor_to_zero_at_most() {
        let (healer, mitigation, _) = healer();
        mitigation.apply(MitigationAction::RaiseFeeThreshold); // floor 10

        healer.heal(&[alert(DriftKind::ModelTooAggressive)]);
        assert_eq!(mitigation.status().min_fee, 0);

        // Floored: a second pass cannot go negative.
        healer.heal(&[alert(DriftKind::ModelTooAggressive)]);
        assert_eq!(mitigation.status().min_fee, 0);
    }

    #[test]
    fn test_policy_degradation_freezes() {
        let (healer, _, freeze) = healer();
        assert!(!freeze.is_frozen());

        let actions = healer.heal(&[alert(DriftKind::RlPolicyDegrading)]);
        assert_eq!(actions[0].kind, HealingKind::FreezePolicy);
        assert!(freeze.is_frozen());
        assert!(healer.is_frozen());

        freeze.unfreeze();
        assert!(!healer.is_frozen());
    }

    #[test]
    fn test_critical_risk_max_defense() {
        let (healer, mitigation, _) = healer();
        let actions = healer.heal(&[alert(DriftKind::CriticalRisk)]);

        assert_eq!(actions[0].kind, HealingKind::MaxDefense);
        let status = mitigation.status();
        assert_eq!(status.mode, MitigationMode::Defensive);
        // Defensive raise (25) plus the critical-risk raise (50).
        assert_eq!(status.min_fee, 75);
    }

    #[test]
    fn test_low_confidence_mutates_nothing() {
        let (healer, mitigation, freeze) = healer();
        let actions = healer.heal(&[alert(DriftKind::LowModelConfidence)]);

        assert_eq!(actions[0].kind, HealingKind::FlagForReview);
        assert_eq!(mitigation.status().mode, MitigationMode::Normal);
        assert_eq!(mitigation.status().min_fee, 0);
        assert!(!freeze.is_frozen());
    }

    #[test]
    fn test_duplicate_alert_kinds_heal_once_per_cycle() {
        let (healer, mitigation, _) = healer();
        let actions = healer.heal(&[
            alert(DriftKind::HighSpamEnv),
            alert(DriftKind::HighSpamEnv),
            alert(DriftKind::HighSpamEnv),
        ]);

        assert_eq!(actions.len(), 1);
        // Only one defensive application: floor raised by 25, not 75.
        assert_eq!(mitigation.status().min_fee, 25);
    }

    #[test]
    fn test_healing_composes_with_reset() {
        let (healer, mitigation, freeze) = healer();
        healer.heal(&[alert(DriftKind::CriticalRisk), alert(DriftKind::RlPolicyDegrading)]);

        mitigation.reset();
        freeze.unfreeze();

        let status = mitigation.status();
        assert_eq!(status.mode, MitigationMode::Normal);
        assert_eq!(status.min_fee, 0);
        assert!(!freeze.is_frozen());
    }

    #[test]
    fn test_history_records_reason() {
        let (healer, _, _) = healer();
        healer.heal(&[alert(DriftKind::HighSpamEnv)]);
        healer.heal(&[alert(DriftKind::LowModelConfidence)]);

        let history = healer.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].reason, DriftKind::HighSpamEnv);
        assert_eq!(history[1].reason, DriftKind::LowModelConfidence);
    }
}
