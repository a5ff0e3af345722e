//! Time source used when a build call leaves the timestamp out

use std::time::{SystemTime, UNIX_EPOCH};

use crate::entity::Timestamp;

pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    fn now_millis(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        // A clock set before 1970 yields 0 rather than failing the build
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as Timestamp)
            .unwrap_or(0)
    }
}

/// Clock frozen at a given instant, for reproducible builds and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now_millis(&self) -> Timestamp {
        self.0
    }
}
