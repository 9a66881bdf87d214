//! # Mitigation Subsystem
//!
//! Owns the enforcement mode and its numeric parameters, and gates
//! transaction admission against them.
//!
//! ## State Machine
//!
//! ```text
//!            ┌──apply(1)──→ [FEE_FILTER]
//! [NORMAL] ──┼──apply(2)──→ [SPAM_DEPRIORITIZATION]
//!            └──apply(3)──→ [DEFENSIVE]
//!
//! any mode ──apply(0)──→ [NORMAL]   (monitor-only; min fee kept)
//! any mode ──reset()───→ [NORMAL]   (min fee and delay cleared)
//! ```
//!
//! `MitigationStateMachine` is the sole mutator of enforcement state. All
//! mitigation is local, advisory, and reversible; `reset()` returns to
//! NORMAL unconditionally.

pub mod state_machine;

pub use state_machine::{
    AdmissionDecision, AppliedAction, MitigationStateMachine, MitigationStatus, MitigationMode,
};
