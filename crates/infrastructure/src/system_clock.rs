//! Wall-clock implementation of the clock port.

use chrono::{DateTime, Utc};

use vigil_application::Clock;

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
