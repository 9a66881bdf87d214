//! The enforcement mode state machine and admission gate.

use parking_lot::RwLock;
use shared_types::{Clock, MitigationAction, Timestamp};
use std::sync::Arc;
use tracing::{info, warn};

/// Enforcement posture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MitigationMode {
    /// Admit everything, observe only.
    #[default]
    Normal,
    /// Reject transactions below the fee floor.
    FeeFilter,
    /// Delay broadcast of spam-scored transactions.
    SpamDeprioritization,
    /// Fee floor plus maximum delay.
    Defensive,
}

impl MitigationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MitigationMode::Normal => "NORMAL",
            MitigationMode::FeeFilter => "FEE_FILTER",
            MitigationMode::SpamDeprioritization => "SPAM_DEPRIORITIZATION",
            MitigationMode::Defensive => "DEFENSIVE",
        }
    }
}

impl std::fmt::Display for MitigationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Timestamped snapshot recorded for every applied action.
#[derive(Clone, Debug)]
pub struct AppliedAction {
    pub timestamp: Timestamp,
    /// Raw action code as received (out-of-range codes are recorded too).
    pub action_code: u8,
    pub mode: MitigationMode,
    pub min_fee: u64,
    pub spam_delay_ms: u64,
}

/// Verdict of the admission gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Admit, after the given broadcast delay.
    Admit { delay_ms: u64 },
    /// Reject outright (fee below the floor).
    Reject,
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admit { .. })
    }
}

/// Read-only status snapshot.
#[derive(Clone, Debug)]
pub struct MitigationStatus {
    pub mode: MitigationMode,
    pub min_fee: u64,
    pub spam_delay_ms: u64,
    pub history_len: usize,
}

#[derive(Default)]
struct MachineState {
    mode: MitigationMode,
    min_fee: u64,
    spam_delay_ms: u64,
    history: Vec<AppliedAction>,
}

/// The sole mutator of enforcement state.
///
/// Exactly one instance exists per process; concurrent decision cycles
/// share it behind an `Arc` and the interior lock serializes writers.
/// Mode and thresholds persist across cycles until explicitly changed.
pub struct MitigationStateMachine {
    state: RwLock<MachineState>,
    clock: Arc<dyn Clock>,
}

impl MitigationStateMachine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(MachineState::default()),
            clock,
        }
    }

    /// Applies a mitigation action and records it in the history.
    pub fn apply(&self, action: MitigationAction) {
        let now = self.clock.now_ms();
        let mut state = self.state.write();

        match action {
            MitigationAction::Monitor => {
                // Monitor-only: the fee floor is deliberately kept.
                state.mode = MitigationMode::Normal;
                state.spam_delay_ms = 0;
            }
            MitigationAction::RaiseFeeThreshold => {
                state.min_fee += 10;
                state.mode = MitigationMode::FeeFilter;
            }
            MitigationAction::DeprioritizeSpam => {
                state.mode = MitigationMode::SpamDeprioritization;
                state.spam_delay_ms = 500;
            }
            MitigationAction::Defensive => {
                state.min_fee += 25;
                state.spam_delay_ms = 1_000;
                state.mode = MitigationMode::Defensive;
            }
        }

        Self::record(&mut state, now, action.code());
        info!(
            action = %action,
            mode = %state.mode,
            min_fee = state.min_fee,
            spam_delay_ms = state.spam_delay_ms,
            "mitigation applied"
        );
    }

    /// Applies a raw action code.
    ///
    /// Codes outside 0..=3 are a defined no-op: the mode locks to NORMAL,
    /// nothing else changes, and the code is still recorded in the history
    /// rather than silently dropped.
    pub fn apply_code(&self, code: u8) {
        match MitigationAction::from_code(code) {
            Some(action) => self.apply(action),
            None => {
                let now = self.clock.now_ms();
                let mut state = self.state.write();
                state.mode = MitigationMode::Normal;
                Self::record(&mut state, now, code);
                warn!(code, "unknown mitigation action code; mode locked to NORMAL");
            }
        }
    }

    /// Returns to NORMAL unconditionally, clearing fee floor and delay.
    pub fn reset(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state.write();
        state.mode = MitigationMode::Normal;
        state.min_fee = 0;
        state.spam_delay_ms = 0;
        Self::record(&mut state, now, MitigationAction::Monitor.code());
        info!("mitigation reset to NORMAL");
    }

    /// Adjusts the fee floor by a signed delta, flooring at zero.
    ///
    /// Healing hook: the self-healer lowers an over-aggressive floor or
    /// raises it under critical risk without changing the mode.
    pub fn adjust_min_fee(&self, delta: i64) -> u64 {
        let mut state = self.state.write();
        state.min_fee = if delta >= 0 {
            state.min_fee.saturating_add(delta as u64)
        } else {
            state.min_fee.saturating_sub(delta.unsigned_abs())
        };
        info!(min_fee = state.min_fee, "fee floor adjusted");
        state.min_fee
    }

    /// Gates one transaction against the current enforcement state.
    ///
    /// NORMAL admits unconditionally; otherwise the fee floor rejects, and
    /// spam-scored transactions pick up the configured broadcast delay.
    pub fn should_admit_tx(&self, fee: u64, spam_score: f64) -> AdmissionDecision {
        let state = self.state.read();

        if state.mode == MitigationMode::Normal {
            return AdmissionDecision::Admit { delay_ms: 0 };
        }
        if fee < state.min_fee {
            return AdmissionDecision::Reject;
        }
        if spam_score > 0.5 && state.spam_delay_ms > 0 {
            return AdmissionDecision::Admit {
                delay_ms: state.spam_delay_ms,
            };
        }
        AdmissionDecision::Admit { delay_ms: 0 }
    }

    /// Current enforcement mode.
    pub fn mode(&self) -> MitigationMode {
        self.state.read().mode
    }

    pub fn status(&self) -> MitigationStatus {
        let state = self.state.read();
        MitigationStatus {
            mode: state.mode,
            min_fee: state.min_fee,
            spam_delay_ms: state.spam_delay_ms,
            history_len: state.history.len(),
        }
    }

    /// Clones the applied-action history (append-only audit trail).
    pub fn history(&self) -> Vec<AppliedAction> {
        self.state.read().history.clone()
    }

    fn record(state: &mut MachineState, now: Timestamp, action_code: u8) {
        state.history.push(AppliedAction {
            timestamp: now,
            action_code,
            mode: state.mode,
            min_fee: state.min_fee,
            spam_delay_ms: state.spam_delay_ms,
        });
    }
}
