//! # Monitoring Subsystem
//!
//! The decision loop watching its own behavior: a fixed-size rolling window
//! of operational and decision metrics, threshold-based drift detection
//! over the window summary, and a bounded set of safe, reversible healing
//! responses.
//!
//! ## Safety Contract
//!
//! Healing never retrains models and never takes a destructive or
//! irreversible action. Every response is single-step, idempotent per alert
//! kind per cycle, and composable with `MitigationStateMachine::reset()`.

pub mod drift;
pub mod heal;
pub mod window;

pub use drift::{DriftAlert, DriftDetector, DriftKind, DriftSeverity, DriftThresholds};
pub use heal::{HealingAction, HealingKind, PolicyFreeze, SelfHealer};
pub use window::{CycleSample, Metric, MetricsSummary, MetricsWindow, Trend, DEFAULT_WINDOW_CAPACITY};
