//! # Watchdog Subsystem
//!
//! Periodic health checks of dependent services, with a computed fallback
//! directive for when the system is degraded.
//!
//! ## Contract
//!
//! Probes run only from the background loop, each wrapped in a bounded
//! timeout so a hung service cannot stall the watchdog. Decision cycles
//! never trigger a check inline; they read the last-computed snapshot.
//!
//! A service failing its probe `failure_threshold` times in a row escalates
//! to the registered alert handlers. Any degraded or unhealthy service
//! activates the fallback directive derived from the configured
//! `FallbackPolicy`:
//!
//! | Policy | Directive when degraded |
//! |--------|-------------------------|
//! | FAIL_OPEN | monitor-only, scoring/policy disabled, rules kept |
//! | FAIL_CLOSED | DEFENSIVE with a forced fee floor |
//! | MONITORING_ONLY | NORMAL, scoring/policy disabled, log only |

pub mod health;
pub mod watchdog;

pub use health::{HealthProbe, ProbeError, ServiceAlert, ServiceHealth, ServiceStatus};
pub use watchdog::{
    FallbackDirective, FallbackPolicy, HealthWatchdog, WatchdogConfig, WatchdogReport,
    WatchdogSnapshot,
};
