//! Human-readable explanation artifacts for finalized decisions.
//!
//! Heuristic-only: contributions are read straight off the numeric
//! features, with no model introspection. The content hash travels with
//! the audit receipt so an explanation can be disputed later.

use ms_02_rules::RuleMatch;
use sha2::{Digest, Sha256};
use shared_types::FeatureMap;
use std::collections::BTreeMap;

/// Explanation of one decision.
#[derive(Clone, Debug, PartialEq)]
pub struct Explanation {
    pub summary: String,
    /// Confidence in [0,1].
    pub confidence: f64,
    /// Strongest numeric features, by absolute value.
    pub top_factors: Vec<(String, f64)>,
    /// Content hash (sha256 hex, truncated to 16 chars).
    pub hash: String,
}

impl Explanation {
    /// Explains a score-driven decision.
    ///
    /// Confidence reflects prediction certainty: scores near 0.5 explain
    /// nothing, scores near 0 or 1 are decisive.
    pub fn from_scores(features: &FeatureMap, spam_score: f64) -> Self {
        let confidence = ((0.5 - spam_score).abs() * 2.0).clamp(0.0, 1.0);

        let mut numeric: Vec<(String, f64)> = features
            .iter()
            .filter_map(|(k, v)| v.as_number().map(|n| (k.clone(), n)))
            .collect();
        numeric.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        numeric.truncate(3);

        let verdict = if spam_score > 0.8 {
            "transaction classified as likely spam"
        } else if spam_score > 0.5 {
            "transaction shows elevated spam probability"
        } else {
            "transaction appears benign"
        };
        let factors = numeric
            .iter()
            .map(|(k, v)| format!("{}: {:.2}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        let summary = if factors.is_empty() {
            verdict.to_string()
        } else {
            format!("{} (key factors: {})", verdict, factors)
        };

        Self::finish(summary, confidence, numeric)
    }

    /// Explains a rule-driven decision.
    pub fn from_rule(rule: &RuleMatch) -> Self {
        let summary = format!(
            "rule {} matched: {} [{}]",
            rule.rule_id, rule.reason, rule.category
        );
        // Rule matches are deterministic; confidence tracks the rule's own
        // risk weighting.
        let confidence = 0.5 + rule.risk_score / 2.0;
        let factors = vec![("rule_risk_score".to_string(), rule.risk_score)];
        Self::finish(summary, confidence, factors)
    }

    fn finish(summary: String, confidence: f64, top_factors: Vec<(String, f64)>) -> Self {
        let mut canonical: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
        canonical.insert("confidence", confidence.into());
        canonical.insert("summary", summary.clone().into());
        canonical.insert(
            "top_factors",
            serde_json::Value::Array(
                top_factors
                    .iter()
                    .map(|(k, v)| serde_json::json!([k, v]))
                    .collect(),
            ),
        );
        let encoded = serde_json::to_string(&canonical).unwrap_or_default();
        let hash = hex::encode(Sha256::digest(encoded.as_bytes()))[..16].to_string();

        Self {
            summary,
            confidence,
            top_factors,
            hash,
        }
    }
}
