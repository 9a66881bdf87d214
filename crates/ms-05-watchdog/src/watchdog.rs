//! The health watchdog service and fallback directive computation.

use crate::health::{HealthProbe, ServiceAlert, ServiceHealth, ServiceStatus};
use parking_lot::RwLock;
use shared_types::{Clock, MitigationAction};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Failover behavior when dependent services fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Continue with defaults; production-safe.
    #[default]
    FailOpen,
    /// Lock down: defensive mode, forced fee floor.
    FailClosed,
    /// Log but take no enforcement action.
    MonitoringOnly,
}

impl FallbackPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackPolicy::FailOpen => "fail_open",
            FallbackPolicy::FailClosed => "fail_closed",
            FallbackPolicy::MonitoringOnly => "monitoring_only",
        }
    }
}

/// Degraded-mode behavior handed to the decision loop.
#[derive(Clone, Debug, PartialEq)]
pub struct FallbackDirective {
    /// True when the system is degraded and this directive applies.
    pub active: bool,
    /// Action the decision loop must short-circuit to while degraded.
    pub fallback_action: MitigationAction,
    /// Fee floor to enforce while degraded (FAIL_CLOSED only).
    pub forced_min_fee: Option<u64>,
    /// Whether the learned policy path may run.
    pub policy_enabled: bool,
    /// Whether external ML scoring may run.
    pub scoring_enabled: bool,
    /// Whether rule evaluation may run.
    pub rules_enabled: bool,
}

impl FallbackDirective {
    fn healthy() -> Self {
        Self {
            active: false,
            fallback_action: MitigationAction::Monitor,
            forced_min_fee: None,
            policy_enabled: true,
            scoring_enabled: true,
            rules_enabled: true,
        }
    }

    fn degraded(policy: FallbackPolicy) -> Self {
        match policy {
            FallbackPolicy::FailOpen => Self {
                active: true,
                fallback_action: MitigationAction::Monitor,
                forced_min_fee: None,
                policy_enabled: false,
                scoring_enabled: false,
                rules_enabled: true,
            },
            FallbackPolicy::FailClosed => Self {
                active: true,
                fallback_action: MitigationAction::Defensive,
                forced_min_fee: Some(50),
                policy_enabled: false,
                scoring_enabled: false,
                rules_enabled: true,
            },
            FallbackPolicy::MonitoringOnly => Self {
                active: true,
                fallback_action: MitigationAction::Monitor,
                forced_min_fee: None,
                policy_enabled: false,
                scoring_enabled: false,
                rules_enabled: true,
            },
        }
    }
}

/// Last-computed view the decision loop reads; never triggers a probe.
#[derive(Clone, Debug)]
pub struct WatchdogSnapshot {
    pub system_healthy: bool,
    pub degraded_services: Vec<String>,
    pub directive: FallbackDirective,
    pub checked_at: Option<shared_types::Timestamp>,
}

impl WatchdogSnapshot {
    fn initial() -> Self {
        Self {
            system_healthy: true,
            degraded_services: Vec::new(),
            directive: FallbackDirective::healthy(),
            checked_at: None,
        }
    }
}

/// Full status report for external reporting layers.
#[derive(Clone, Debug)]
pub struct WatchdogReport {
    pub system_healthy: bool,
    pub fallback_policy: FallbackPolicy,
    pub fallback_active: bool,
    pub degraded_services: Vec<String>,
    pub services: Vec<ServiceHealth>,
}

/// Watchdog configuration.
#[derive(Clone, Debug)]
pub struct WatchdogConfig {
    /// Interval between background check rounds.
    pub check_interval: Duration,
    /// Consecutive failures before a service escalates to an alert.
    pub failure_threshold: u32,
    /// Upper bound on a single probe invocation.
    pub probe_timeout: Duration,
    pub fallback_policy: FallbackPolicy,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            failure_threshold: 3,
            probe_timeout: Duration::from_secs(5),
            fallback_policy: FallbackPolicy::FailOpen,
        }
    }
}

type AlertHandler = Box<dyn Fn(&ServiceAlert) + Send + Sync>;

struct WatchdogState {
    probes: Vec<(String, Arc<dyn HealthProbe>)>,
    healths: HashMap<String, ServiceHealth>,
    snapshot: WatchdogSnapshot,
    alert_handlers: Vec<AlertHandler>,
}

/// Service health watchdog.
///
/// Runs its check loop on an independent timer; decision cycles only read
/// `snapshot()`.
pub struct HealthWatchdog {
    config: WatchdogConfig,
    state: RwLock<WatchdogState>,
    clock: Arc<dyn Clock>,
}

impl HealthWatchdog {
    pub fn new(config: WatchdogConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            state: RwLock::new(WatchdogState {
                probes: Vec::new(),
                healths: HashMap::new(),
                snapshot: WatchdogSnapshot::initial(),
                alert_handlers: Vec::new(),
            }),
            clock,
        }
    }

    /// Registers a service for health monitoring.
    pub fn register_service(&self, name: impl Into<String>, probe: Arc<dyn HealthProbe>) {
        let name = name.into();
        let mut state = self.state.write();
        state.healths.insert(name.clone(), ServiceHealth::new(&name));
        state.probes.push((name, probe));
    }

    /// Registers a callback for failure-threshold escalations.
    pub fn add_alert_handler(&self, handler: impl Fn(&ServiceAlert) + Send + Sync + 'static) {
        self.state.write().alert_handlers.push(Box::new(handler));
    }

    /// Runs one check round over all registered services and recomputes the
    /// snapshot. Called from the background loop (and directly in tests).
    pub async fn check_all(&self) {
        let probes: Vec<(String, Arc<dyn HealthProbe>)> = self.state.read().probes.clone();

        for (name, probe) in probes {
            let started = std::time::Instant::now();
            let outcome = tokio::time::timeout(self.config.probe_timeout, probe.check()).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let (status, error) = match outcome {
                Ok(Ok(true)) => (ServiceStatus::Healthy, None),
                Ok(Ok(false)) => (ServiceStatus::Degraded, None),
                Ok(Err(e)) => (ServiceStatus::Unhealthy, Some(e.to_string())),
                Err(_) => (
                    ServiceStatus::Unhealthy,
                    Some(format!(
                        "probe timed out after {}ms",
                        self.config.probe_timeout.as_millis()
                    )),
                ),
            };

            self.apply_check_result(&name, status, error, elapsed_ms);
        }

        self.recompute_snapshot();
    }

    fn apply_check_result(
        &self,
        name: &str,
        status: ServiceStatus,
        error: Option<String>,
        elapsed_ms: u64,
    ) {
        let now = self.clock.now_ms();
        let alert = {
            let mut state = self.state.write();
            let health = match state.healths.get_mut(name) {
                Some(h) => h,
                None => return,
            };

            health.status = status;
            health.response_time_ms = elapsed_ms;
            health.last_check = Some(now);
            if status == ServiceStatus::Healthy {
                health.consecutive_failures = 0;
                health.last_error = None;
            } else {
                health.consecutive_failures += 1;
                health.last_error = error.clone();
            }

            if health.consecutive_failures >= self.config.failure_threshold {
                Some(ServiceAlert {
                    service: name.to_string(),
                    status,
                    consecutive_failures: health.consecutive_failures,
                    error,
                    timestamp: now,
                })
            } else {
                None
            }
        };

        if let Some(alert) = alert {
            warn!(
                service = %alert.service,
                failures = alert.consecutive_failures,
                "service crossed failure threshold"
            );
            self.fire_alert(&alert);
        }
    }

    fn fire_alert(&self, alert: &ServiceAlert) {
        let state = self.state.read();
        for handler in &state.alert_handlers {
            // A panicking handler must not take down the check loop.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(alert);
            }));
            if result.is_err() {
                error!(service = %alert.service, "alert handler panicked");
            }
        }
    }

    fn recompute_snapshot(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state.write();

        let mut degraded: Vec<String> = state
            .healths
            .values()
            .filter(|h| h.status.is_impaired())
            .map(|h| h.service.clone())
            .collect();
        degraded.sort();

        let system_healthy = degraded.is_empty();
        let directive = if system_healthy {
            FallbackDirective::healthy()
        } else {
            FallbackDirective::degraded(self.config.fallback_policy)
        };

        if !system_healthy {
            debug!(
                degraded = ?degraded,
                policy = self.config.fallback_policy.as_str(),
                "system degraded; fallback directive active"
            );
        }

        state.snapshot = WatchdogSnapshot {
            system_healthy,
            degraded_services: degraded,
            directive,
            checked_at: Some(now),
        };
    }

    /// Returns the last-computed snapshot. Never blocks on a probe.
    pub fn snapshot(&self) -> WatchdogSnapshot {
        self.state.read().snapshot.clone()
    }

    /// Full report for external reporting layers.
    pub fn report(&self) -> WatchdogReport {
        let state = self.state.read();
        let mut services: Vec<ServiceHealth> = state.healths.values().cloned().collect();
        services.sort_by(|a, b| a.service.cmp(&b.service));
        WatchdogReport {
            system_healthy: state.snapshot.system_healthy,
            fallback_policy: self.config.fallback_policy,
            fallback_active: state.snapshot.directive.active,
            degraded_services: state.snapshot.degraded_services.clone(),
            services,
        }
    }

    /// Spawns the background check loop.
    ///
    /// The loop runs until `shutdown` flips to true. Decision cycles are
    /// never blocked by it; they read `snapshot()`.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.check_interval;
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "health watchdog started");
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.check_all().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("health watchdog stopped");
                            return;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ProbeError;
    use async_trait::async_trait;
    use shared_types::ManualClock;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct StaticProbe(Result<bool, ProbeError>);

    #[async_trait]
    impl HealthProbe for StaticProbe {
        async fn check(&self) -> Result<bool, ProbeError> {
            self.0.clone()
        }
    }

    struct SwitchProbe(Arc<AtomicBool>);

    #[async_trait]
    impl HealthProbe for SwitchProbe {
        async fn check(&self) -> Result<bool, ProbeError> {
            Ok(self.0.load(Ordering::SeqCst))
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl HealthProbe for HangingProbe {
        async fn check(&self) -> Result<bool, ProbeError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(true)
        }
    }

    fn watchdog(policy: FallbackPolicy) -> HealthWatchdog {
        HealthWatchdog::new(
            WatchdogConfig {
                check_interval: Duration::from_secs(30),
                failure_threshold: 3,
                probe_timeout: Duration::from_millis(50),
                fallback_policy: policy,
            },
            Arc::new(ManualClock::new(1_000)),
        )
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_healthy() {
        let wd = watchdog(FallbackPolicy::FailOpen);
        let snap = wd.snapshot();
        assert!(snap.system_healthy);
        assert!(!snap.directive.active);
        assert!(snap.checked_at.is_none());
    }

    #[tokio::test]
    async fn test_healthy_services_keep_directive_inactive() {
        let wd = watchdog(FallbackPolicy::FailClosed);
        wd.register_service("ml_service", Arc::new(StaticProbe(Ok(true))));
        wd.register_service("feature_store", Arc::new(StaticProbe(Ok(true))));

        wd.check_all().await;

        let snap = wd.snapshot();
        assert!(snap.system_healthy);
        assert!(!snap.directive.active);
        assert!(snap.directive.policy_enabled);
        assert!(snap.checked_at.is_some());
    }

    #[tokio::test]
    async fn test_fail_closed_directive_forces_defensive() {
        let wd = watchdog(FallbackPolicy::FailClosed);
        wd.register_service("ml_service", Arc::new(StaticProbe(Ok(false))));

        wd.check_all().await;

        let snap = wd.snapshot();
        assert!(!snap.system_healthy);
        assert_eq!(snap.degraded_services, vec!["ml_service".to_string()]);
        assert!(snap.directive.active);
        assert_eq!(snap.directive.fallback_action, MitigationAction::Defensive);
        assert_eq!(snap.directive.forced_min_fee, Some(50));
        assert!(!snap.directive.policy_enabled);
        assert!(snap.directive.rules_enabled);
    }

    #[tokio::test]
    async fn test_fail_open_directive_is_monitor_only() {
        let wd = watchdog(FallbackPolicy::FailOpen);
        wd.register_service("ml_service", Arc::new(StaticProbe(Err(ProbeError::new("down")))));

        wd.check_all().await;

        let snap = wd.snapshot();
        assert!(snap.directive.active);
        assert_eq!(snap.directive.fallback_action, MitigationAction::Monitor);
        assert!(!snap.directive.scoring_enabled);
        assert!(snap.directive.rules_enabled);
    }

    #[tokio::test]
    async fn test_error_probe_records_unhealthy() {
        let wd = watchdog(FallbackPolicy::FailOpen);
        wd.register_service(
            "feature_store",
            Arc::new(StaticProbe(Err(ProbeError::new("connection refused")))),
        );

        wd.check_all().await;

        let report = wd.report();
        assert_eq!(report.services.len(), 1);
        assert_eq!(report.services[0].status, ServiceStatus::Unhealthy);
        assert_eq!(
            report.services[0].last_error.as_deref(),
            Some("connection refused")
        );
    }

    #[tokio::test]
    async fn test_hanging_probe_times_out_as_unhealthy() {
        let wd = watchdog(FallbackPolicy::FailOpen);
        wd.register_service("slow_service", Arc::new(HangingProbe));

        wd.check_all().await;

        let report = wd.report();
        assert_eq!(report.services[0].status, ServiceStatus::Unhealthy);
        assert!(report.services[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_alert_fires_at_failure_threshold() {
        let wd = watchdog(FallbackPolicy::FailOpen);
        wd.register_service("ml_service", Arc::new(StaticProbe(Ok(false))));

        let alert_count = Arc::new(AtomicU32::new(0));
        let seen = alert_count.clone();
        wd.add_alert_handler(move |alert| {
            assert_eq!(alert.service, "ml_service");
            seen.fetch_add(1, Ordering::SeqCst);
        });

        wd.check_all().await;
        wd.check_all().await;
        assert_eq!(alert_count.load(Ordering::SeqCst), 0);

        wd.check_all().await;
        assert_eq!(alert_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovery_resets_failure_count() {
        let up = Arc::new(AtomicBool::new(false));
        let wd = watchdog(FallbackPolicy::FailOpen);
        wd.register_service("flaky", Arc::new(SwitchProbe(up.clone())));

        wd.check_all().await;
        wd.check_all().await;
        assert!(!wd.snapshot().system_healthy);

        up.store(true, Ordering::SeqCst);
        wd.check_all().await;

        let snap = wd.snapshot();
        assert!(snap.system_healthy);
        let report = wd.report();
        assert_eq!(report.services[0].consecutive_failures, 0);
        assert_eq!(report.services[0].status, ServiceStatus::Healthy);
    }

    #[tokio::test]
    async fn test_panicking_alert_handler_is_isolated() {
        let wd = watchdog(FallbackPolicy::FailOpen);
        wd.register_service("ml_service", Arc::new(StaticProbe(Ok(false))));
        wd.add_alert_handler(|_| panic!("handler bug"));

        let called = Arc::new(AtomicU32::new(0));
        let seen = called.clone();
        wd.add_alert_handler(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        wd.check_all().await;
        wd.check_all().await;
        wd.check_all().await;

        // The panicking handler did not prevent the second handler.
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }
}
