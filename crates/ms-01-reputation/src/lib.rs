//! # Reputation Subsystem
//!
//! Address reputation and blacklist/whitelist lookup with TTL caching.
//!
//! ## Purpose
//!
//! Answers one question cheaply on the decision hot path: what do we know
//! about this address? Records are derived deterministically from local
//! membership sets (blacklist, whitelist, known entities) and cached with a
//! TTL; external enrichment is pushed in, never pulled — this crate makes
//! no network calls.
//!
//! ## Ownership
//!
//! `ReputationCache` exclusively owns all `ReputationRecord`s. A cached
//! record is immutable until its TTL expires or a list mutation invalidates
//! it, after which it is re-derived on the next lookup.

pub mod cache;

pub use cache::{
    ExternalReputation, KnownEntity, ReputationCache, ReputationCacheStats, ReputationConfig,
    ReputationRecord,
};
