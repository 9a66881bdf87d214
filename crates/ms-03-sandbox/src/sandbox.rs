//! Cached heuristic transaction analysis.

use crate::result::{RiskIndicator, SimulationResult};
use parking_lot::RwLock;
use primitive_types::U256;
use sha2::{Digest, Sha256};
use shared_types::{Clock, Timestamp, TxData};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// ERC-20 `transfer(address,uint256)` selector.
const SELECTOR_TRANSFER: &str = "0xa9059cbb";
/// ERC-20 `approve(address,uint256)` selector.
const SELECTOR_APPROVE: &str = "0x095ea7b3";

/// Default result TTL (300 s).
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;

/// Sandbox configuration.
#[derive(Clone, Debug)]
pub struct SandboxConfig {
    /// Value above which a transfer is flagged high-value (wei).
    pub high_value_threshold: U256,
    /// Gas limit above which a transaction is flagged high-gas.
    pub high_gas_threshold: u64,
    /// Result cache TTL in milliseconds.
    pub cache_ttl_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            // 10 ETH in wei.
            high_value_threshold: U256::from(10_000_000_000_000_000_000u128),
            high_gas_threshold: 500_000,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
        }
    }
}

/// Sandbox statistics for the status surface.
#[derive(Clone, Copy, Debug)]
pub struct SandboxStats {
    pub simulations_run: u64,
    pub cache_hits: u64,
    pub cache_hit_rate: f64,
    pub cache_size: usize,
}

struct CacheEntry {
    result: SimulationResult,
    stored_at: Timestamp,
}

struct SandboxState {
    cache: HashMap<String, CacheEntry>,
    simulations_run: u64,
    cache_hits: u64,
}

/// Heuristic what-if analyzer with a TTL result cache.
///
/// Safe to share across concurrent decision cycles behind an `Arc`; the
/// cache is read-mostly with a single writer at a time.
pub struct SimulationSandbox {
    config: SandboxConfig,
    state: RwLock<SandboxState>,
    clock: Arc<dyn Clock>,
}

impl SimulationSandbox {
    pub fn new(config: SandboxConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            state: RwLock::new(SandboxState {
                cache: HashMap::new(),
                simulations_run: 0,
                cache_hits: 0,
            }),
            clock,
        }
    }

    /// Cheap admission filter: analysis is expensive and must not run for
    /// every transaction. Analyze when the value is a tenth of the
    /// high-value threshold, the payload is non-trivial, or the spam score
    /// already flags the sender.
    pub fn should_simulate(&self, tx: &TxData, spam_score: f64) -> bool {
        if tx.value > self.config.high_value_threshold / U256::from(10) {
            return true;
        }
        if tx.payload_len() > 100 {
            return true;
        }
        spam_score > 0.7
    }

    /// Analyzes a transaction, serving cached results inside the TTL.
    ///
    /// Expired cache entries are evicted here, on read; there is no
    /// background sweep.
    pub fn simulate(&self, tx: &TxData, use_cache: bool) -> SimulationResult {
        let key = self.cache_key(tx);
        let now = self.clock.now_ms();

        if use_cache {
            let mut state = self.state.write();
            match state.cache.get(&key) {
                Some(entry) if now.saturating_sub(entry.stored_at) < self.config.cache_ttl_ms => {
                    let mut result = entry.result.clone();
                    state.cache_hits += 1;
                    result.cached = true;
                    return result;
                }
                Some(_) => {
                    state.cache.remove(&key);
                }
                None => {}
            }
        }

        let started = self.clock.now_ms();
        let mut result = self.analyze(tx);
        result.elapsed_ms = self.clock.now_ms().saturating_sub(started);

        let mut state = self.state.write();
        state.simulations_run += 1;
        if use_cache {
            state.cache.insert(
                key,
                CacheEntry {
                    result: result.clone(),
                    stored_at: now,
                },
            );
        }
        debug!(
            tx = %tx.hash,
            risk = result.risk_score(),
            indicators = result.indicators.len(),
            "transaction analyzed"
        );
        result
    }

    /// Analyzes several transactions, sharing the cache.
    pub fn simulate_batch(&self, txs: &[TxData]) -> Vec<SimulationResult> {
        txs.iter().map(|tx| self.simulate(tx, true)).collect()
    }

    pub fn stats(&self) -> SandboxStats {
        let state = self.state.read();
        let total = state.simulations_run + state.cache_hits;
        SandboxStats {
            simulations_run: state.simulations_run,
            cache_hits: state.cache_hits,
            cache_hit_rate: state.cache_hits as f64 / (total.max(1)) as f64,
            cache_size: state.cache.len(),
        }
    }

    /// Deterministic shape analysis of the transaction. Explicitly NOT
    /// chain execution: no state is forked, no bytecode runs.
    fn analyze(&self, tx: &TxData) -> SimulationResult {
        let mut result = SimulationResult {
            success: true,
            ..Default::default()
        };

        if tx.value > self.config.high_value_threshold {
            result.indicators.push(RiskIndicator::HighValueTransfer);
            result.value_transferred = tx.value;
        }

        if tx.has_call_data() {
            result.indicators.push(RiskIndicator::ContractInteraction);

            let payload = tx.payload.to_ascii_lowercase();
            if payload.starts_with(SELECTOR_TRANSFER) {
                result.indicators.push(RiskIndicator::TokenTransfer);
            } else if payload.starts_with(SELECTOR_APPROVE) {
                result.indicators.push(RiskIndicator::Approval);
                result.indicators.push(RiskIndicator::PotentialDrainRisk);
            }
        }

        if tx.gas > self.config.high_gas_threshold {
            result.indicators.push(RiskIndicator::HighGas);
            result.gas_estimate = tx.gas;
        }

        result.gas_used = tx.gas.min(100_000);

        // One 32-byte word is 64 hex chars; the word count approximates
        // touched storage slots.
        result.state_change_count = tx.payload_len() / 64;
        if result.state_change_count > 4 {
            result.indicators.push(RiskIndicator::MultipleCalls);
        }

        result
    }

    /// Content hash of (payload, sender, recipient, value), truncated to 16
    /// hex characters. Key order is canonical (sorted).
    fn cache_key(&self, tx: &TxData) -> String {
        let mut canonical: BTreeMap<&str, String> = BTreeMap::new();
        canonical.insert("data", tx.payload.clone());
        canonical.insert("from", tx.sender.as_str().to_string());
        canonical.insert("to", tx.recipient.as_str().to_string());
        canonical.insert("value", tx.value.to_string());

        let encoded = serde_json::to_string(&canonical).unwrap_or_default();
        let digest = Sha256::digest(encoded.as_bytes());
        hex::encode(digest)[..16].to_string()
    }
}
