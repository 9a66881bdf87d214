//! # Decision Subsystem
//!
//! The control loop composing every independently-fallible input into one
//! action per transaction, finalized through the mitigation state machine
//! and the audit sink.
//!
//! ## Pipeline (per decision)
//!
//! ```text
//! watchdog snapshot ──degraded──→ fallback action ─────────────┐
//!        │ healthy                                             │
//!        ↓                                                     │
//! reputation lookup → rule evaluation ──ALLOW/BLOCK──→ rule action
//!        │                   │ advisory/none                   │
//!        ↓                   ↓                                 │
//! ML scores (bounded timeout) → conditional sandbox analysis   │
//!        │                                                     │
//!        ↓                                                     │
//! policy action (bounded timeout, unless frozen) ──────────────┤
//!        │                                                     ↓
//!        └────────────────────────────→ finalize: apply + incident
//!                                       + audit + metrics + drift + heal
//! ```
//!
//! ## Failure Contract
//!
//! No collaborator failure propagates out of a decision. Each stage
//! degrades to its documented default (spam 0.5, congestion 0, action 0)
//! and every started decision finalizes with exactly one applied action and
//! exactly one incident hash.

pub mod context;
pub mod explain;
pub mod incident;
pub mod orchestrator;
pub mod ports;

pub use context::{DecisionContext, DecisionOutcome, DecisionSource};
pub use explain::Explanation;
pub use incident::{risk_score_0_100, Incident, IncidentLog};
pub use orchestrator::{DecisionOrchestrator, OrchestratorConfig, SentinelStatus};
pub use ports::{AuditReceipt, AuditSink, MlScores, PolicyProvider, ProviderError, ScoreProvider};
