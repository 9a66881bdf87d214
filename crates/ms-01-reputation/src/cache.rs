//! TTL-cached address reputation lookup.
//!
//! ## Derivation
//!
//! On a cache miss the record is derived deterministically from the
//! membership sets, in precedence order:
//!
//! | Membership | Score | Risk level |
//! |------------|-------|------------|
//! | blacklist | 0.0 | CRITICAL |
//! | whitelist | 1.0 | SAFE |
//! | known entity | 1.0 − entity.risk | KNOWN |
//! | none | 0.5 | UNKNOWN |
//!
//! ## Invalidation
//!
//! List mutations invalidate the cached record for that address; expiry is
//! lazy on lookup, there is no background sweep.

use parking_lot::RwLock;
use shared_types::{Address, Clock, FeatureMap, RiskLevel, Timestamp};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Default record TTL (1 hour).
pub const DEFAULT_TTL_MS: u64 = 3_600_000;

/// Reputation subsystem configuration.
#[derive(Clone, Debug)]
pub struct ReputationConfig {
    /// Cached record time-to-live in milliseconds.
    pub ttl_ms: u64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
        }
    }
}

/// A known entity with curated metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct KnownEntity {
    pub name: String,
    pub category: String,
    /// Curated risk in [0,1]; reputation score is its complement.
    pub risk: f64,
}

/// One address reputation record.
///
/// Immutable once cached; re-derived after TTL expiry or invalidation.
#[derive(Clone, Debug)]
pub struct ReputationRecord {
    pub address: Address,
    pub is_blacklisted: bool,
    pub is_whitelisted: bool,
    /// Reputation in [0,1], higher is better.
    pub reputation_score: f64,
    pub risk_level: RiskLevel,
    pub entity: Option<KnownEntity>,
    pub tags: Vec<String>,
    /// Provenance of the data in this record ("local", "external").
    pub sources: Vec<String>,
    /// When this record was derived (ms).
    pub looked_up_at: Timestamp,
}

/// Externally sourced enrichment pushed into the cache.
#[derive(Clone, Debug, Default)]
pub struct ExternalReputation {
    pub reputation_score: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub tags: Vec<String>,
}

/// Cache statistics for the status surface.
#[derive(Clone, Copy, Debug)]
pub struct ReputationCacheStats {
    pub cached_entries: usize,
    pub blacklist_size: usize,
    pub whitelist_size: usize,
    pub known_entities: usize,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Address, ReputationRecord>,
    /// Blacklisted addresses with the reason they were listed.
    blacklist: HashMap<Address, String>,
    whitelist: HashSet<Address>,
    known_entities: HashMap<Address, KnownEntity>,
}

/// Address reputation cache.
///
/// Read-mostly; a single writer at a time via the interior lock. Safe to
/// share across concurrent decision cycles behind an `Arc`.
pub struct ReputationCache {
    state: RwLock<CacheState>,
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl ReputationCache {
    pub fn new(config: ReputationConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            ttl_ms: config.ttl_ms,
            clock,
        }
    }

    /// Looks up an address, deriving and caching a record on miss/expiry.
    pub fn lookup(&self, address: &Address) -> ReputationRecord {
        let now = self.clock.now_ms();

        {
            let state = self.state.read();
            if let Some(record) = state.entries.get(address) {
                if now.saturating_sub(record.looked_up_at) < self.ttl_ms {
                    return record.clone();
                }
            }
        }

        let mut state = self.state.write();
        // A concurrent writer may have refreshed the entry while we waited.
        if let Some(record) = state.entries.get(address) {
            if now.saturating_sub(record.looked_up_at) < self.ttl_ms {
                return record.clone();
            }
        }

        let record = Self::derive(&state, address, now);
        state.entries.insert(address.clone(), record.clone());
        record
    }

    /// Looks up several addresses at once.
    pub fn batch_lookup(&self, addresses: &[Address]) -> Vec<ReputationRecord> {
        addresses.iter().map(|a| self.lookup(a)).collect()
    }

    /// Projects a record into numeric model features.
    pub fn get_features(&self, address: &Address) -> FeatureMap {
        let record = self.lookup(address);
        let mut features = FeatureMap::new();
        features.set("is_blacklisted", record.is_blacklisted);
        features.set("is_whitelisted", record.is_whitelisted);
        features.set("reputation_score", record.reputation_score);
        features.set("is_known_entity", record.entity.is_some());
        features.set("risk_numeric", record.risk_level.numeric());
        features
    }

    /// Adds an address to the blacklist and invalidates its cached record.
    pub fn add_to_blacklist(&self, address: Address, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(address = %address.short(), %reason, "address blacklisted");
        let mut state = self.state.write();
        state.entries.remove(&address);
        state.blacklist.insert(address, reason);
    }

    /// Adds an address to the whitelist and invalidates its cached record.
    pub fn add_to_whitelist(&self, address: Address) {
        let mut state = self.state.write();
        state.entries.remove(&address);
        state.whitelist.insert(address);
    }

    /// Registers a known entity and invalidates its cached record.
    pub fn register_entity(&self, address: Address, entity: KnownEntity) {
        let mut state = self.state.write();
        state.entries.remove(&address);
        state.known_entities.insert(address, entity);
    }

    /// Merges externally sourced enrichment into the cached record.
    ///
    /// The record's TTL restarts from the enrichment time.
    pub fn update_from_external(
        &self,
        address: &Address,
        external: ExternalReputation,
    ) -> ReputationRecord {
        let mut record = self.lookup(address);

        if let Some(score) = external.reputation_score {
            record.reputation_score = score.clamp(0.0, 1.0);
        }
        if let Some(level) = external.risk_level {
            record.risk_level = level;
        }
        for tag in external.tags {
            if !record.tags.contains(&tag) {
                record.tags.push(tag);
            }
        }
        if !record.sources.iter().any(|s| s == "external") {
            record.sources.push("external".to_string());
        }
        record.looked_up_at = self.clock.now_ms();

        let mut state = self.state.write();
        state.entries.insert(address.clone(), record.clone());
        record
    }

    /// Drops all cached records; membership sets are kept.
    pub fn clear(&self) {
        self.state.write().entries.clear();
    }

    pub fn stats(&self) -> ReputationCacheStats {
        let state = self.state.read();
        ReputationCacheStats {
            cached_entries: state.entries.len(),
            blacklist_size: state.blacklist.len(),
            whitelist_size: state.whitelist.len(),
            known_entities: state.known_entities.len(),
        }
    }

    fn derive(state: &CacheState, address: &Address, now: Timestamp) -> ReputationRecord {
        let is_blacklisted = state.blacklist.contains_key(address);
        let is_whitelisted = state.whitelist.contains(address);
        let entity = state.known_entities.get(address).cloned();

        let (reputation_score, risk_level, tag) = if is_blacklisted {
            (0.0, RiskLevel::Critical, Some("blacklisted".to_string()))
        } else if is_whitelisted {
            (1.0, RiskLevel::Safe, Some("whitelisted".to_string()))
        } else if let Some(e) = &entity {
            (
                (1.0 - e.risk).clamp(0.0, 1.0),
                RiskLevel::Known,
                Some(e.category.clone()),
            )
        } else {
            (0.5, RiskLevel::Unknown, None)
        };

        ReputationRecord {
            address: address.clone(),
            is_blacklisted,
            is_whitelisted,
            reputation_score,
            risk_level,
            entity,
            tags: tag.into_iter().collect(),
            sources: vec!["local".to_string()],
            looked_up_at: now,
        }
    }
}
