//! # Sandbox Subsystem
//!
//! Bounded, cached "what-if" analysis of a transaction, producing risk
//! indicators before the transaction is admitted.
//!
//! ## Contract
//!
//! This is a deterministic, side-effect-free **heuristic** analysis of the
//! transaction's shape (value, payload selectors, gas), NOT real chain
//! execution. Callers must not assume EVM semantics from its results.
//!
//! Analysis is assumed expensive relative to the rest of the pipeline, so
//! `should_simulate` gates it: only high-value, payload-heavy, or
//! spam-flagged transactions are analyzed. Results are cached by a content
//! hash of (sender, recipient, payload, value) with a fixed TTL; expired
//! entries are evicted lazily on read.

pub mod result;
pub mod sandbox;

pub use result::{RiskIndicator, SimulationResult};
pub use sandbox::{SandboxConfig, SandboxStats, SimulationSandbox};
