//! Canonical mitigation action mapping.
//!
//! Action codes, action names, and rule verdicts are mapped here and only
//! here. The rule engine, the mitigation state machine, and the decision
//! orchestrator all share this table.

use serde::{Deserialize, Serialize};

/// A mitigation action chosen by one decision cycle.
///
/// | Code | Action | Enforcement effect |
/// |------|--------|--------------------|
/// | 0 | `Monitor` | mode NORMAL, no delay |
/// | 1 | `RaiseFeeThreshold` | mode FEE_FILTER, min fee +10 |
/// | 2 | `DeprioritizeSpam` | mode SPAM_DEPRIORITIZATION, 500ms delay |
/// | 3 | `Defensive` | mode DEFENSIVE, min fee +25, 1000ms delay |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MitigationAction {
    /// Monitor only, no active mitigation.
    #[default]
    Monitor,
    /// Reject or deprioritize transactions below the fee floor.
    RaiseFeeThreshold,
    /// Delay broadcast of spam-scored transactions.
    DeprioritizeSpam,
    /// Strict filtering and throttling.
    Defensive,
}

impl MitigationAction {
    /// All actions in code order.
    pub const ALL: [MitigationAction; 4] = [
        MitigationAction::Monitor,
        MitigationAction::RaiseFeeThreshold,
        MitigationAction::DeprioritizeSpam,
        MitigationAction::Defensive,
    ];

    /// Returns the numeric action code (0..=3).
    pub fn code(&self) -> u8 {
        match self {
            MitigationAction::Monitor => 0,
            MitigationAction::RaiseFeeThreshold => 1,
            MitigationAction::DeprioritizeSpam => 2,
            MitigationAction::Defensive => 3,
        }
    }

    /// Decodes a numeric action code.
    ///
    /// Returns `None` for codes outside 0..=3; callers decide whether that
    /// is a default or a recorded no-op.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MitigationAction::Monitor),
            1 => Some(MitigationAction::RaiseFeeThreshold),
            2 => Some(MitigationAction::DeprioritizeSpam),
            3 => Some(MitigationAction::Defensive),
            _ => None,
        }
    }

    /// Returns the canonical action name.
    pub fn name(&self) -> &'static str {
        match self {
            MitigationAction::Monitor => "DO_NOTHING",
            MitigationAction::RaiseFeeThreshold => "RAISE_FEE_THRESHOLD",
            MitigationAction::DeprioritizeSpam => "DEPRIORITIZE_SPAM",
            MitigationAction::Defensive => "DEFENSIVE_MODE",
        }
    }

    /// Resolves a free-form action label to an action.
    ///
    /// Accepts both rule verdict names (ALLOW, FLAG, ...) and action names
    /// (DO_NOTHING, DEFENSIVE_MODE, ...), case-insensitively. This is the
    /// single string-to-action table in the system.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "ALLOW" | "DO_NOTHING" => Some(MitigationAction::Monitor),
            "FLAG" | "RAISE_FEE_THRESHOLD" => Some(MitigationAction::RaiseFeeThreshold),
            "DEPRIORITIZE" | "DEPRIORITIZE_SPAM" => Some(MitigationAction::DeprioritizeSpam),
            "BLOCK" | "DEFENSIVE" | "DEFENSIVE_MODE" => Some(MitigationAction::Defensive),
            _ => None,
        }
    }
}

impl std::fmt::Display for MitigationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Verdict attached to a detection rule.
///
/// ALLOW and BLOCK are terminal: a matching rule with one of these verdicts
/// short-circuits the rest of the decision pipeline. FLAG and DEPRIORITIZE
/// are advisory and only apply when the policy path yields nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleAction {
    Allow,
    Flag,
    Deprioritize,
    Block,
}

impl RuleAction {
    /// Returns true if this verdict ends the decision immediately.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RuleAction::Allow | RuleAction::Block)
    }

    /// Maps the verdict onto the canonical mitigation action.
    pub fn mitigation(&self) -> MitigationAction {
        match self {
            RuleAction::Allow => MitigationAction::Monitor,
            RuleAction::Flag => MitigationAction::RaiseFeeThreshold,
            RuleAction::Deprioritize => MitigationAction::DeprioritizeSpam,
            RuleAction::Block => MitigationAction::Defensive,
        }
    }

    /// Returns the canonical verdict name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Allow => "ALLOW",
            RuleAction::Flag => "FLAG",
            RuleAction::Deprioritize => "DEPRIORITIZE",
            RuleAction::Block => "BLOCK",
        }
    }
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RuleAction {
    type Err = UnknownRuleAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALLOW" => Ok(RuleAction::Allow),
            "FLAG" => Ok(RuleAction::Flag),
            "DEPRIORITIZE" => Ok(RuleAction::Deprioritize),
            "BLOCK" => Ok(RuleAction::Block),
            _ => Err(UnknownRuleAction(s.to_string())),
        }
    }
}

/// Error for an unrecognized rule verdict name.
#[derive(Debug, thiserror::Error)]
#[error("unknown rule action: {0}")]
pub struct UnknownRuleAction(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for action in MitigationAction::ALL {
            assert_eq!(MitigationAction::from_code(action.code()), Some(action));
        }
        assert_eq!(MitigationAction::from_code(4), None);
        assert_eq!(MitigationAction::from_code(255), None);
    }

    #[test]
    fn test_label_table_covers_rule_verdicts_and_action_names() {
        assert_eq!(
            MitigationAction::from_label("ALLOW"),
            Some(MitigationAction::Monitor)
        );
        assert_eq!(
            MitigationAction::from_label("defensive_mode"),
            Some(MitigationAction::Defensive)
        );
        assert_eq!(
            MitigationAction::from_label("DEPRIORITIZE"),
            Some(MitigationAction::DeprioritizeSpam)
        );
        assert_eq!(MitigationAction::from_label("RETRAIN"), None);
    }

    #[test]
    fn test_terminal_verdicts() {
        assert!(RuleAction::Allow.is_terminal());
        assert!(RuleAction::Block.is_terminal());
        assert!(!RuleAction::Flag.is_terminal());
        assert!(!RuleAction::Deprioritize.is_terminal());
    }

    #[test]
    fn test_verdict_mitigation_mapping() {
        assert_eq!(RuleAction::Allow.mitigation().code(), 0);
        assert_eq!(RuleAction::Flag.mitigation().code(), 1);
        assert_eq!(RuleAction::Deprioritize.mitigation().code(), 2);
        assert_eq!(RuleAction::Block.mitigation().code(), 3);
    }
}
