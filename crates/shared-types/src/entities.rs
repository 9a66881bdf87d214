//! Core domain entities shared across sentinel subsystems.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Timestamp in milliseconds since UNIX epoch.
pub type Timestamp = u64;

/// A chain address, normalized to lowercase hex.
///
/// All reputation lists and caches key on the normalized form, so two
/// spellings of the same address always hit the same entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Creates an address, lowercasing the input.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().to_ascii_lowercase())
    }

    /// Returns the normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a shortened form for log output.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(10);
        &self.0[..end]
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Raw transaction data handed to the admission pipeline.
///
/// This is a reference view of what the chain node streamed in, not an
/// owned mempool entry; the sentinel never mutates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxData {
    /// Transaction hash (hex, as delivered by the node).
    pub hash: String,
    /// Sender address.
    #[serde(alias = "from")]
    pub sender: Address,
    /// Recipient address.
    #[serde(alias = "to")]
    pub recipient: Address,
    /// Transferred value in wei.
    #[serde(default)]
    pub value: U256,
    /// Call payload as a 0x-prefixed hex string; empty for plain transfers.
    #[serde(default)]
    pub payload: String,
    /// Gas limit.
    #[serde(default = "default_gas")]
    pub gas: u64,
    /// Fee rate in gwei, compared against the enforcement fee floor.
    #[serde(default)]
    pub fee: u64,
}

fn default_gas() -> u64 {
    21_000
}

impl TxData {
    /// Length of the payload hex string.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the payload looks like a contract call rather than
    /// a bare transfer ("0x" plus at least a selector).
    pub fn has_call_data(&self) -> bool {
        self.payload.len() > 10
    }
}

/// Address risk classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Safe,
    Known,
    Unknown,
    High,
    Critical,
}

impl RiskLevel {
    /// Discretized numeric scale used as a model feature.
    pub fn numeric(&self) -> f64 {
        match self {
            RiskLevel::Safe => 0.0,
            RiskLevel::Known => 0.2,
            RiskLevel::Unknown => 0.5,
            RiskLevel::High => 0.8,
            RiskLevel::Critical => 1.0,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Known => "KNOWN",
            RiskLevel::Unknown => "UNKNOWN",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The 5-element state vector consumed by the policy provider.
///
/// Field order is load-bearing: the trained policy was fitted against
/// `[tx_count, avg_fee_rate, congestion_score, avg_spam_score, spam_tx_ratio]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StateVector {
    /// Transactions currently observed in the mempool.
    pub tx_count: f64,
    /// Average fee rate across observed transactions.
    pub avg_fee_rate: f64,
    /// Mempool congestion score (unbounded, >= 0).
    pub congestion_score: f64,
    /// Average spam probability across observed transactions.
    pub avg_spam_score: f64,
    /// Fraction of observed transactions scored as spam.
    pub spam_tx_ratio: f64,
}

impl StateVector {
    /// Returns the vector in policy input order.
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.tx_count,
            self.avg_fee_rate,
            self.congestion_score,
            self.avg_spam_score,
            self.spam_tx_ratio,
        ]
    }
}
