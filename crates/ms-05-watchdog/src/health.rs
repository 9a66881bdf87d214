//! Health probe port and per-service health state.

use async_trait::async_trait;
use shared_types::Timestamp;

/// Error raised by a failing health probe.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ProbeError(pub String);

impl ProbeError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Boolean health probe for one named service.
///
/// `Ok(true)` is healthy, `Ok(false)` is degraded (reachable but not
/// serving), `Err` is unhealthy. Probes are invoked only by the watchdog's
/// background loop, never from a decision cycle.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<bool, ProbeError>;
}

/// Health classification of a dependent service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// Not yet probed.
    #[default]
    Unknown,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Degraded => "degraded",
            ServiceStatus::Unhealthy => "unhealthy",
            ServiceStatus::Unknown => "unknown",
        }
    }

    /// True when the service counts against overall system health.
    pub fn is_impaired(&self) -> bool {
        matches!(self, ServiceStatus::Degraded | ServiceStatus::Unhealthy)
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current health of one registered service. Owned by the watchdog.
#[derive(Clone, Debug)]
pub struct ServiceHealth {
    pub service: String,
    pub status: ServiceStatus,
    pub consecutive_failures: u32,
    pub response_time_ms: u64,
    pub last_error: Option<String>,
    pub last_check: Option<Timestamp>,
}

impl ServiceHealth {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            status: ServiceStatus::Unknown,
            consecutive_failures: 0,
            response_time_ms: 0,
            last_error: None,
            last_check: None,
        }
    }
}

/// Escalation fired when a service crosses the failure threshold.
#[derive(Clone, Debug)]
pub struct ServiceAlert {
    pub service: String,
    pub status: ServiceStatus,
    pub consecutive_failures: u32,
    pub error: Option<String>,
    pub timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impaired_statuses() {
        assert!(!ServiceStatus::Healthy.is_impaired());
        assert!(!ServiceStatus::Unknown.is_impaired());
        assert!(ServiceStatus::Degraded.is_impaired());
        assert!(ServiceStatus::Unhealthy.is_impaired());
    }

    #[test]
    fn test_new_service_health_is_unknown() {
        let health = ServiceHealth::new("ml_service");
        assert_eq!(health.status, ServiceStatus::Unknown);
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_check.is_none());
    }
}
