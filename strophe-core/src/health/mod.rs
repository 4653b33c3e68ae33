//! Servo bus health monitoring
//!
//! Classifies feedback polls, bounds retries, and derives the blocked flag.

pub mod monitor;

pub use monitor::{
    HealthMonitor, HealthState, RetryAction, ERROR_LOG_THRESHOLD, LOAD_WARN_THRESHOLD,
    MAX_FEEDBACK_RETRIES, RETRY_BACKOFF_MS,
};
