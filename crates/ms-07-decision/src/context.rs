//! Per-decision aggregate state.

use crate::explain::Explanation;
use crate::incident::Incident;
use crate::ports::MlScores;
use ms_01_reputation::ReputationRecord;
use ms_02_rules::RuleMatch;
use ms_03_sandbox::SimulationResult;
use shared_types::{FeatureMap, MitigationAction, StateVector};

/// Where the final action came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionSource {
    /// A terminal rule match, or the rule fallback when the policy path is
    /// frozen or disabled.
    Rule,
    /// The external learned policy.
    Policy,
    /// The watchdog's degraded-mode directive.
    Fallback,
    /// Nothing else applied; the safe default action.
    Default,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::Rule => "rule",
            DecisionSource::Policy => "policy",
            DecisionSource::Fallback => "fallback",
            DecisionSource::Default => "default",
        }
    }
}

impl std::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything accumulated while deciding one transaction.
///
/// Created at the start of a decision and discarded after finalization;
/// only the derived incident persists.
#[derive(Debug, Default)]
pub struct DecisionContext {
    pub tx_hash: String,
    pub features: FeatureMap,
    pub reputation: Option<ReputationRecord>,
    pub rule_match: Option<RuleMatch>,
    pub ml_scores: MlScores,
    pub simulation: Option<SimulationResult>,
    pub state_vector: StateVector,
    pub explanation: Option<Explanation>,
}

/// The finalized result handed back to the caller.
#[derive(Clone, Debug)]
pub struct DecisionOutcome {
    pub action: MitigationAction,
    pub source: DecisionSource,
    pub incident: Incident,
    /// Id of the matched rule, when one fired.
    pub rule_id: Option<String>,
    pub explanation: Option<Explanation>,
}
