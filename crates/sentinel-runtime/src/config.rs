//! Unified sentinel configuration.
//!
//! One struct aggregates every subsystem's knobs with production-safe
//! defaults; the composition root threads the pieces to their owners.

use ms_01_reputation::ReputationConfig;
use ms_03_sandbox::SandboxConfig;
use ms_05_watchdog::WatchdogConfig;
use ms_06_monitoring::{DriftThresholds, DEFAULT_WINDOW_CAPACITY};
use ms_07_decision::OrchestratorConfig;

/// Complete sentinel configuration.
#[derive(Clone, Debug, Default)]
pub struct SentinelConfig {
    /// Reputation cache configuration.
    pub reputation: ReputationConfig,
    /// Sandbox analysis configuration.
    pub sandbox: SandboxConfig,
    /// Watchdog configuration (interval, thresholds, fallback policy).
    pub watchdog: WatchdogConfig,
    /// Orchestrator configuration (timeouts, policy path).
    pub orchestrator: OrchestratorConfig,
    /// Drift detection thresholds.
    pub drift: DriftThresholds,
    /// Monitoring configuration.
    pub monitoring: MonitoringConfig,
    /// Whether to seed the default detection rule set.
    pub seed_default_rules: bool,
    /// Addresses blacklisted at startup.
    pub blacklist: Vec<String>,
    /// Addresses whitelisted at startup.
    pub whitelist: Vec<String>,
}

/// Monitoring window configuration.
#[derive(Clone, Debug)]
pub struct MonitoringConfig {
    /// Rolling window capacity in cycles.
    pub window_capacity: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
        }
    }
}

impl SentinelConfig {
    /// Defaults plus the seeded rule set; what the binary runs with.
    pub fn standard() -> Self {
        Self {
            seed_default_rules: true,
            ..Default::default()
        }
    }
}
