//! Rule storage, ordering, evaluation, and mutation audit.

use crate::dsl::Condition;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{Clock, FeatureMap, RuleAction, Timestamp};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Free-form rule annotations surfaced in match results.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleMeta {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub category: String,
}

/// Serializable rule definition, used for construction and import/export.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
    pub condition: String,
    #[serde(default = "default_action")]
    pub action: RuleAction,
    #[serde(default = "default_risk_score")]
    pub risk_score: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub meta: RuleMeta,
}

fn default_priority() -> i64 {
    50
}

fn default_action() -> RuleAction {
    RuleAction::Flag
}

fn default_risk_score() -> f64 {
    0.5
}

fn default_enabled() -> bool {
    true
}

/// A stored detection rule with its pre-parsed condition.
#[derive(Clone, Debug)]
pub struct Rule {
    pub id: String,
    /// Higher priority evaluates first.
    pub priority: i64,
    pub condition_src: String,
    pub condition: Condition,
    pub action: RuleAction,
    pub risk_score: f64,
    pub enabled: bool,
    pub meta: RuleMeta,
    pub created_at: Timestamp,
}

impl Rule {
    fn from_spec(spec: RuleSpec, created_at: Timestamp) -> Self {
        let condition = Condition::parse(&spec.condition);
        if condition.is_unsupported() {
            warn!(
                rule_id = %spec.id,
                condition = %spec.condition,
                "rule mixes AND and OR; condition will never match"
            );
        }
        Self {
            id: spec.id,
            priority: spec.priority,
            condition_src: spec.condition,
            condition,
            action: spec.action,
            risk_score: spec.risk_score,
            enabled: spec.enabled,
            meta: spec.meta,
            created_at,
        }
    }

    fn to_spec(&self) -> RuleSpec {
        RuleSpec {
            id: self.id.clone(),
            priority: self.priority,
            condition: self.condition_src.clone(),
            action: self.action,
            risk_score: self.risk_score,
            enabled: self.enabled,
            meta: self.meta.clone(),
        }
    }

    /// Content hash over the canonical (key-sorted) JSON form, truncated to
    /// 16 hex characters. Recorded in the mutation audit log.
    pub fn content_hash(&self) -> String {
        let mut canonical: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
        canonical.insert("action", self.action.as_str().into());
        canonical.insert("condition", self.condition_src.clone().into());
        canonical.insert("created_at", self.created_at.into());
        canonical.insert("enabled", self.enabled.into());
        canonical.insert("id", self.id.clone().into());
        canonical.insert(
            "meta",
            serde_json::json!({
                "category": self.meta.category,
                "reason": self.meta.reason,
            }),
        );
        canonical.insert("priority", self.priority.into());
        canonical.insert("risk_score", self.risk_score.into());

        let encoded = serde_json::to_string(&canonical).unwrap_or_default();
        let digest = Sha256::digest(encoded.as_bytes());
        hex::encode(digest)[..16].to_string()
    }
}

/// Result of a rule match; derived per evaluation, never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleMatch {
    pub rule_id: String,
    pub action: RuleAction,
    pub risk_score: f64,
    pub reason: String,
    pub category: String,
    pub priority: i64,
}

/// Kind of rule set mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleChange {
    Added,
    Removed,
}

/// One audit log entry for a rule set mutation.
#[derive(Clone, Debug)]
pub struct RuleAuditEntry {
    pub change: RuleChange,
    pub rule_id: String,
    pub author: String,
    pub timestamp: Timestamp,
    /// Content hash of the rule; absent for removals.
    pub rule_hash: Option<String>,
}

/// Rules subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Rule JSON could not be parsed.
    #[error("rule import failed: {0}")]
    ImportFailed(#[from] serde_json::Error),
}

struct EngineState {
    rules: Vec<Rule>,
    audit_log: Vec<RuleAuditEntry>,
}

/// Priority-ordered rule engine.
///
/// First match wins: `evaluate` walks rules in descending priority
/// (insertion order for ties) and stops at the first enabled rule whose
/// condition holds.
pub struct RuleEngine {
    state: RwLock<EngineState>,
    clock: Arc<dyn Clock>,
}

impl RuleEngine {
    /// Creates an empty engine.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(EngineState {
                rules: Vec::new(),
                audit_log: Vec::new(),
            }),
            clock,
        }
    }

    /// Creates an engine seeded with the default security rules.
    pub fn with_default_rules(clock: Arc<dyn Clock>) -> Self {
        let engine = Self::new(clock);
        for spec in Self::default_rules() {
            engine.add_rule(spec, "system");
        }
        engine
    }

    /// The default rule set applied when nothing else is configured.
    pub fn default_rules() -> Vec<RuleSpec> {
        vec![
            RuleSpec {
                id: "whitelisted_pass".into(),
                priority: 200,
                condition: "is_whitelisted == true".into(),
                action: RuleAction::Allow,
                risk_score: 0.0,
                enabled: true,
                meta: RuleMeta {
                    reason: "Address is whitelisted".into(),
                    category: "whitelist".into(),
                },
            },
            RuleSpec {
                id: "block_blacklisted".into(),
                priority: 100,
                condition: "is_blacklisted == true".into(),
                action: RuleAction::Block,
                risk_score: 1.0,
                enabled: true,
                meta: RuleMeta {
                    reason: "Address is blacklisted".into(),
                    category: "blacklist".into(),
                },
            },
            RuleSpec {
                id: "high_spam_score".into(),
                priority: 90,
                condition: "spam_score >= 0.9".into(),
                action: RuleAction::Deprioritize,
                risk_score: 0.9,
                enabled: true,
                meta: RuleMeta {
                    reason: "Very high spam score".into(),
                    category: "spam".into(),
                },
            },
            RuleSpec {
                id: "suspicious_approval".into(),
                priority: 85,
                condition: "has_approval == true AND value > 0".into(),
                action: RuleAction::Flag,
                risk_score: 0.7,
                enabled: true,
                meta: RuleMeta {
                    reason: "Suspicious approval with value transfer".into(),
                    category: "exploit".into(),
                },
            },
            RuleSpec {
                id: "large_value_unknown".into(),
                priority: 80,
                condition: "value > 100000000000000000000 AND reputation_score < 0.3".into(),
                action: RuleAction::Flag,
                risk_score: 0.6,
                enabled: true,
                meta: RuleMeta {
                    reason: "Large value from low reputation address".into(),
                    category: "risk".into(),
                },
            },
        ]
    }

    /// Adds a rule, re-sorts, and appends an audit entry.
    pub fn add_rule(&self, spec: RuleSpec, author: &str) -> String {
        let now = self.clock.now_ms();
        let rule = Rule::from_spec(spec, now);
        let hash = rule.content_hash();
        let rule_id = rule.id.clone();

        let mut state = self.state.write();
        state.rules.push(rule);
        // Stable sort keeps insertion order for equal priorities.
        state.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        state.audit_log.push(RuleAuditEntry {
            change: RuleChange::Added,
            rule_id: rule_id.clone(),
            author: author.to_string(),
            timestamp: now,
            rule_hash: Some(hash.clone()),
        });
        debug!(rule_id = %rule_id, author, hash = %hash, "rule added");
        hash
    }

    /// Removes a rule by id; returns false if no rule had that id.
    pub fn remove_rule(&self, rule_id: &str, author: &str) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.state.write();
        let before = state.rules.len();
        state.rules.retain(|r| r.id != rule_id);
        if state.rules.len() == before {
            return false;
        }
        state.audit_log.push(RuleAuditEntry {
            change: RuleChange::Removed,
            rule_id: rule_id.to_string(),
            author: author.to_string(),
            timestamp: now,
            rule_hash: None,
        });
        debug!(rule_id, author, "rule removed");
        true
    }

    /// Evaluates the rule set against a context.
    ///
    /// Returns the first enabled match in priority order, or `None`. No
    /// rule after the match is inspected.
    pub fn evaluate(&self, ctx: &FeatureMap) -> Option<RuleMatch> {
        let state = self.state.read();
        state
            .rules
            .iter()
            .filter(|r| r.enabled)
            .find(|r| r.condition.eval(ctx))
            .map(Self::to_match)
    }

    /// Evaluates every enabled rule and returns all matches in priority order.
    pub fn evaluate_all(&self, ctx: &FeatureMap) -> Vec<RuleMatch> {
        let state = self.state.read();
        state
            .rules
            .iter()
            .filter(|r| r.enabled && r.condition.eval(ctx))
            .map(Self::to_match)
            .collect()
    }

    fn to_match(rule: &Rule) -> RuleMatch {
        RuleMatch {
            rule_id: rule.id.clone(),
            action: rule.action,
            risk_score: rule.risk_score,
            reason: rule.meta.reason.clone(),
            category: rule.meta.category.clone(),
            priority: rule.priority,
        }
    }

    /// Exports the rule set as JSON, in evaluation order.
    pub fn export_rules(&self) -> String {
        let state = self.state.read();
        let specs: Vec<RuleSpec> = state.rules.iter().map(Rule::to_spec).collect();
        serde_json::to_string_pretty(&specs).unwrap_or_else(|_| "[]".to_string())
    }

    /// Imports rules from a JSON array, auditing each one.
    pub fn import_rules(&self, rules_json: &str, author: &str) -> Result<usize, RuleError> {
        let specs: Vec<RuleSpec> = serde_json::from_str(rules_json)?;
        let count = specs.len();
        for spec in specs {
            self.add_rule(spec, author);
        }
        Ok(count)
    }

    pub fn rule_count(&self) -> usize {
        self.state.read().rules.len()
    }

    /// Clones the mutation audit log.
    pub fn audit_log(&self) -> Vec<RuleAuditEntry> {
        self.state.read().audit_log.clone()
    }
}
