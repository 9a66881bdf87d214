//! Deterministic, content-addressed incident records.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use shared_types::{MitigationAction, StateVector};
use std::collections::{BTreeMap, HashMap};

/// One audit incident. Append-only; the hash is the primary key.
///
/// The hash is sha256 over a canonical key-sorted JSON encoding of the
/// rounded fields, so identical inputs always produce identical hashes.
#[derive(Clone, Debug, PartialEq)]
pub struct Incident {
    pub hash: String,
    /// Average spam score, rounded to 4 dp before hashing.
    pub avg_spam_score: f64,
    /// Congestion score, rounded to 2 dp before hashing.
    pub congestion_score: f64,
    pub action_taken: u8,
    pub mitigation_mode: String,
    /// Model confidence, rounded to 4 dp before hashing.
    pub confidence: f64,
    /// Unix timestamp in whole seconds.
    pub timestamp: u64,
}

impl Incident {
    /// Builds the incident for one finalized decision.
    pub fn generate(
        state: &StateVector,
        action: MitigationAction,
        mode: &str,
        confidence: f64,
        timestamp: u64,
    ) -> Self {
        let avg_spam_score = round_dp(state.avg_spam_score, 4);
        let congestion_score = round_dp(state.congestion_score, 2);
        let confidence = round_dp(confidence, 4);

        let mut incident = Self {
            hash: String::new(),
            avg_spam_score,
            congestion_score,
            action_taken: action.code(),
            mitigation_mode: mode.to_string(),
            confidence,
            timestamp,
        };
        incident.hash = incident.compute_hash();
        incident
    }

    fn compute_hash(&self) -> String {
        // BTreeMap iterates keys in sorted order, giving the canonical
        // encoding the hash depends on.
        let mut canonical: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
        canonical.insert("action_taken", self.action_taken.into());
        canonical.insert("avg_spam_score", self.avg_spam_score.into());
        canonical.insert("confidence", self.confidence.into());
        canonical.insert("congestion_score", self.congestion_score.into());
        canonical.insert("mitigation_mode", self.mitigation_mode.clone().into());
        canonical.insert("timestamp", self.timestamp.into());

        let encoded = serde_json::to_string(&canonical).unwrap_or_default();
        hex::encode(Sha256::digest(encoded.as_bytes()))
    }
}

fn round_dp(value: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (value * factor).round() / factor
}

/// Risk on the 0-100 audit scale: half from spam, half from congestion
/// (congestion normalized against 1e8).
pub fn risk_score_0_100(avg_spam_score: f64, congestion_score: f64) -> u8 {
    let score = avg_spam_score * 50.0 + (congestion_score / 1e8) * 50.0;
    score.clamp(0.0, 100.0) as u8
}

struct LogState {
    incidents: Vec<Incident>,
    by_hash: HashMap<String, usize>,
}

/// Append-only incident log keyed by hash.
///
/// Recording an incident whose hash is already present is a no-op; records
/// are never mutated after creation.
pub struct IncidentLog {
    state: RwLock<LogState>,
}

impl Default for IncidentLog {
    fn default() -> Self {
        Self::new()
    }
}

impl IncidentLog {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LogState {
                incidents: Vec::new(),
                by_hash: HashMap::new(),
            }),
        }
    }

    /// Generates and appends the incident for one finalized decision.
    pub fn record(
        &self,
        state_vector: &StateVector,
        action: MitigationAction,
        mode: &str,
        confidence: f64,
        timestamp: u64,
    ) -> Incident {
        let incident = Incident::generate(state_vector, action, mode, confidence, timestamp);
        let mut state = self.state.write();
        if !state.by_hash.contains_key(&incident.hash) {
            let index = state.incidents.len();
            state.by_hash.insert(incident.hash.clone(), index);
            state.incidents.push(incident.clone());
        }
        incident
    }

    pub fn get(&self, hash: &str) -> Option<Incident> {
        let state = self.state.read();
        state
            .by_hash
            .get(hash)
            .and_then(|i| state.incidents.get(*i))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `n` most recent incidents, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Incident> {
        let state = self.state.read();
        let skip = state.incidents.len().saturating_sub(n);
        state.incidents[skip..].to_vec()
    }
}
