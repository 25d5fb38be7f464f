use chrono::Duration;

/// Default number of failed attempts tolerated before suspension.
pub const DEFAULT_ATTEMPT_LIMIT: i32 = 5;

/// Default attempt window and suspension cooldown, in minutes.
pub const DEFAULT_SUSPENSION_MINUTES: i64 = 15;

/// Thresholds governing when an account is suspended and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Failed attempts at or above this count trigger a suspension.
    pub attempt_limit: i32,
    /// Minutes a failed attempt counts against the limit. Doubles as the
    /// cooldown before a suspension lifts on its own.
    pub suspension_minutes: i64,
}

impl ThrottlePolicy {
    /// Creates a policy from explicit thresholds.
    #[must_use]
    pub fn new(attempt_limit: i32, suspension_minutes: i64) -> Self {
        Self {
            attempt_limit,
            suspension_minutes,
        }
    }

    /// Returns the attempt window / suspension cooldown as a duration.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::minutes(self.suspension_minutes)
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            attempt_limit: DEFAULT_ATTEMPT_LIMIT,
            suspension_minutes: DEFAULT_SUSPENSION_MINUTES,
        }
    }
}
