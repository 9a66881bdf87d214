//! # Rules Subsystem
//!
//! Priority-ordered detection rule engine with a small condition DSL.
//!
//! ## Evaluation Contract
//!
//! Rules are kept sorted by descending priority, ties broken by insertion
//! order. `evaluate` returns the **first** enabled rule whose condition
//! holds and inspects nothing after it — first match wins, and that
//! tie-break is load-bearing for every caller.
//!
//! ## Condition DSL
//!
//! A condition is one clause `field OP value`, or clauses joined uniformly
//! by `AND` or by `OR`. Mixing `AND` and `OR` in one condition is
//! unsupported grammar and evaluates to false. A clause that fails to parse
//! evaluates to false; it never aborts the evaluation loop.
//!
//! ## Audit
//!
//! Every rule mutation (add/remove/import) appends an audit entry carrying
//! the author and a content hash of the rule.

pub mod dsl;
pub mod engine;

pub use dsl::{Clause, Condition, Operator};
pub use engine::{
    Rule, RuleAuditEntry, RuleChange, RuleEngine, RuleError, RuleMatch, RuleMeta, RuleSpec,
};
