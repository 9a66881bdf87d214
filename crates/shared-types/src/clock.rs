//! Time source abstraction for consistent, testable timestamps.
//!
//! Every TTL cache and history entry in the workspace reads time through
//! this port so tests can drive expiry deterministically.

use crate::entities::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Millisecond clock port.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp in milliseconds since UNIX epoch.
    fn now_ms(&self) -> Timestamp;

    /// Returns the current timestamp in whole seconds.
    fn now_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    time: AtomicU64,
}

impl ManualClock {
    pub fn new(initial_ms: Timestamp) -> Self {
        Self {
            time: AtomicU64::new(initial_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: Timestamp) {
        self.time.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}
