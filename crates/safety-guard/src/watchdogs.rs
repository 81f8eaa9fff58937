use crate::WatchdogStatus;
use tracing::warn;

/// Base trait for all watchdogs. Time is passed in as wall-clock seconds so
/// callers decide which clock drives the check.
pub trait Watchdog: Send + Sync {
    fn name(&self) -> &str;
    fn check(&mut self, now: f64) -> WatchdogStatus;
    fn reset(&mut self);
    fn timeout_secs(&self) -> f64;
}

/// Heartbeat watchdog - monitors a controller through its published status.
///
/// The source counts as alive while either the status timestamp is recent or
/// the heartbeat counter advanced recently by the observer's own clock.
pub struct HeartbeatWatchdog {
    name: String,
    timeout_secs: f64,
    last_heartbeat: Option<u64>,
    last_published_at: Option<f64>,
    advanced_at: Option<f64>,
    consecutive_failures: u32,
}

impl HeartbeatWatchdog {
    pub fn new(name: impl Into<String>, timeout_secs: f64) -> Self {
        Self {
            name: name.into(),
            timeout_secs,
            last_heartbeat: None,
            last_published_at: None,
            advanced_at: None,
            consecutive_failures: 0,
        }
    }

    /// Record a status observation made at `now`.
    pub fn observe(&mut self, heartbeat: u64, published_at: f64, now: f64) {
        if self.last_heartbeat != Some(heartbeat) {
            self.last_heartbeat = Some(heartbeat);
            self.advanced_at = Some(now);
        }
        self.last_published_at = Some(published_at);
    }

    /// Seconds since the source last showed progress.
    pub fn age(&self, now: f64) -> Option<f64> {
        let by_stamp = self.last_published_at.map(|t| (now - t).max(0.0));
        let by_beat = self.advanced_at.map(|t| (now - t).max(0.0));
        match (by_stamp, by_beat) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn is_alive(&self, now: f64) -> bool {
        self.age(now).is_some_and(|age| age < self.timeout_secs)
    }
}

impl Watchdog for HeartbeatWatchdog {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&mut self, now: f64) -> WatchdogStatus {
        let age = self.age(now);
        let healthy = self.is_alive(now);

        let mut last_error = None;
        if !healthy {
            self.consecutive_failures += 1;
            last_error = Some(match age {
                Some(age) => format!("no status progress for {age:.1}s"),
                None => "no status observed".to_string(),
            });
            if self.consecutive_failures == 1 {
                warn!(watchdog = %self.name, error = ?last_error, "watchdog tripped");
            }
        } else {
            self.consecutive_failures = 0;
        }

        WatchdogStatus {
            name: self.name.clone(),
            healthy,
            age_secs: age,
            last_error,
            timeout_secs: self.timeout_secs,
            consecutive_failures: self.consecutive_failures,
        }
    }

    fn reset(&mut self) {
        self.last_heartbeat = None;
        self.last_published_at = None;
        self.advanced_at = None;
        self.consecutive_failures = 0;
    }

    fn timeout_secs(&self) -> f64 {
        self.timeout_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unobserved_is_unhealthy() {
        let mut dog = HeartbeatWatchdog::new("hb", 10.0);
        let status = dog.check(100.0);
        assert!(!status.healthy);
        assert_eq!(status.last_error.as_deref(), Some("no status observed"));
    }

    #[test]
    fn test_fresh_timestamp_is_healthy() {
        let mut dog = HeartbeatWatchdog::new("hb", 10.0);
        dog.observe(1, 95.0, 100.0);
        assert!(dog.check(100.0).healthy);
    }

    #[test]
    fn test_stalled_heartbeat_goes_stale() {
        let mut dog = HeartbeatWatchdog::new("hb", 10.0);
        dog.observe(7, 100.0, 100.0);
        dog.observe(7, 100.0, 105.0);
        let first = dog.check(111.0);
        assert!(!first.healthy);
        assert_eq!(first.consecutive_failures, 1);
        assert_eq!(dog.check(112.0).consecutive_failures, 2);
    }

    #[test]
    fn test_advancing_heartbeat_beats_skewed_clock() {
        let mut dog = HeartbeatWatchdog::new("hb", 10.0);
        dog.observe(1, 0.0, 500.0);
        dog.observe(2, 0.0, 505.0);
        assert!(dog.check(506.0).healthy);
        dog.reset();
        assert!(!dog.check(506.0).healthy);
    }
}
