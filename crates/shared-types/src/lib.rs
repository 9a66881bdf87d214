//! # Shared Types Crate
//!
//! This crate contains all domain types shared across sentinel subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **One Action Table**: `MitigationAction` is the only place where action
//!   codes, action names, and rule verdicts are mapped to each other. No
//!   subsystem keeps its own string-to-integer table.
//! - **Typed Context**: Decision stages exchange a typed `FeatureMap`
//!   instead of loose dictionaries; a missing field is an explicit
//!   `FieldValue::Absent`, never an accidental null.

pub mod action;
pub mod clock;
pub mod entities;
pub mod fields;

pub use action::{MitigationAction, RuleAction};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entities::{Address, RiskLevel, StateVector, Timestamp, TxData};
pub use fields::{FeatureMap, FieldValue};
