//! Health monitor implementation
//!
//! Tracks feedback success/failure streaks on the servo bus and decides
//! when the motor counts as blocked. Time does not appear here: the
//! backoff between retries is injected by the caller, so the whole state
//! machine is testable without real delays.

/// Consecutive failed polls before the motor is considered blocked
pub const MAX_FEEDBACK_RETRIES: u8 = 10;

/// Emit a diagnostic only every this many consecutive failures
///
/// Keeps a dead bus from flooding the log at the poll rate.
pub const ERROR_LOG_THRESHOLD: u32 = 100;

/// Absolute load above which a possible mechanical blockage is reported
///
/// High load during normal acceleration is expected, so this is a
/// warning, never a state change.
pub const LOAD_WARN_THRESHOLD: i16 = 800;

/// Pause between feedback retries in milliseconds
pub const RETRY_BACKOFF_MS: u32 = 10;

/// Derived health state of the servo bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HealthState {
    /// Last poll succeeded
    Healthy,
    /// Recent failures, still retrying
    Degraded,
    /// Retry budget exhausted; sticky until a poll succeeds
    Blocked,
}

/// What the caller should do after a failed poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RetryAction {
    /// Retry after the given backoff
    Retry { backoff_ms: u32 },
    /// Retry budget exhausted; surface the failure
    GiveUp,
}

/// Health monitor for the servo bus
///
/// The retry counter gates the transition to Blocked; the consecutive
/// failure counter keeps running while blocked and only rate-limits
/// diagnostics. Blocked is cleared solely by a successful poll - there
/// is no separate operator reset.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    retries: u8,
    consecutive_failures: u32,
    blocked: bool,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    /// Create a new health monitor in the healthy state
    pub fn new() -> Self {
        Self {
            retries: 0,
            consecutive_failures: 0,
            blocked: false,
        }
    }

    /// Record a successful feedback poll
    ///
    /// Resets both counters and clears the blocked flag. Returns `true`
    /// if the reported load exceeds [`LOAD_WARN_THRESHOLD`] and the
    /// caller should log a possible-blockage warning.
    pub fn record_success(&mut self, load: i16) -> bool {
        self.retries = 0;
        self.consecutive_failures = 0;
        self.blocked = false;

        load.unsigned_abs() > LOAD_WARN_THRESHOLD as u16
    }

    /// Record a failed feedback poll
    ///
    /// Returns the action the caller should take. Once blocked, every
    /// further failure answers `GiveUp` immediately so callers fail fast
    /// instead of sitting in the retry loop.
    pub fn record_failure(&mut self) -> RetryAction {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.retries < MAX_FEEDBACK_RETRIES {
            self.retries += 1;
        }

        if self.retries >= MAX_FEEDBACK_RETRIES {
            self.blocked = true;
            RetryAction::GiveUp
        } else {
            RetryAction::Retry {
                backoff_ms: RETRY_BACKOFF_MS,
            }
        }
    }

    /// Check whether the motor is currently considered blocked
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Get the derived health state
    pub fn state(&self) -> HealthState {
        if self.blocked {
            HealthState::Blocked
        } else if self.retries > 0 {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }

    /// Get the current consecutive-failure count
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Check whether the failure just recorded should be logged
    ///
    /// True once per [`ERROR_LOG_THRESHOLD`] consecutive failures while
    /// blocked, starting with the first.
    pub fn should_log_failure(&self) -> bool {
        self.blocked && self.consecutive_failures % ERROR_LOG_THRESHOLD == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let monitor = HealthMonitor::new();
        assert_eq!(monitor.state(), HealthState::Healthy);
        assert!(!monitor.is_blocked());
    }

    #[test]
    fn test_failures_degrade_then_block() {
        let mut monitor = HealthMonitor::new();

        for i in 1..MAX_FEEDBACK_RETRIES {
            assert_eq!(
                monitor.record_failure(),
                RetryAction::Retry {
                    backoff_ms: RETRY_BACKOFF_MS
                }
            );
            assert_eq!(monitor.state(), HealthState::Degraded);
            assert_eq!(monitor.consecutive_failures(), i as u32);
        }

        // The tenth consecutive failure blocks
        assert_eq!(monitor.record_failure(), RetryAction::GiveUp);
        assert!(monitor.is_blocked());
        assert_eq!(monitor.state(), HealthState::Blocked);
    }

    #[test]
    fn test_success_clears_blocked() {
        let mut monitor = HealthMonitor::new();
        for _ in 0..MAX_FEEDBACK_RETRIES {
            let _ = monitor.record_failure();
        }
        assert!(monitor.is_blocked());

        monitor.record_success(0);
        assert!(!monitor.is_blocked());
        assert_eq!(monitor.state(), HealthState::Healthy);
        assert_eq!(monitor.consecutive_failures(), 0);
    }

    #[test]
    fn test_blocked_fails_fast() {
        let mut monitor = HealthMonitor::new();
        for _ in 0..MAX_FEEDBACK_RETRIES {
            let _ = monitor.record_failure();
        }

        // No more retry offers once blocked
        assert_eq!(monitor.record_failure(), RetryAction::GiveUp);
        assert_eq!(monitor.record_failure(), RetryAction::GiveUp);
    }

    #[test]
    fn test_high_load_is_warning_only() {
        let mut monitor = HealthMonitor::new();

        assert!(monitor.record_success(801));
        assert!(monitor.record_success(-801));
        assert!(!monitor.record_success(800));
        assert!(!monitor.record_success(-800));

        // Load warnings never change the health state
        assert_eq!(monitor.state(), HealthState::Healthy);
        assert!(!monitor.is_blocked());
    }

    #[test]
    fn test_log_rate_limiting() {
        let mut monitor = HealthMonitor::new();

        let mut logged = 0;
        for _ in 0..(ERROR_LOG_THRESHOLD * 3) {
            let _ = monitor.record_failure();
            if monitor.should_log_failure() {
                logged += 1;
            }
        }

        // Failures 101 and 201 fire while blocked; 1 is pre-block
        assert_eq!(logged, 2);
    }

    #[test]
    fn test_failure_count_continues_while_blocked() {
        let mut monitor = HealthMonitor::new();
        for _ in 0..250 {
            let _ = monitor.record_failure();
        }
        assert_eq!(monitor.consecutive_failures(), 250);
        assert!(monitor.is_blocked());
    }
}
