//! Throttle record state and its time-based transitions.
//!
//! The record is a pure state machine over `{Normal, Suspended} x
//! {NotBanned, Banned}`. Time never moves it on its own: expiry is applied
//! lazily by callers through [`ThrottleRecord::apply_expiry`], so the
//! machine stays free of timers and background sweeps.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// Persistent throttle state for one account.
///
/// Timestamps serialize as `YYYY-MM-DD HH:MM:SS`, matching the textual
/// export format of the `throttle` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleRecord {
    /// Account this record belongs to.
    pub account_id: AccountId,
    /// Consecutive failed attempts since the last reset.
    pub attempts: i32,
    /// When the most recent failed attempt happened. Absent while
    /// `attempts` is zero, except after a lazy window reset.
    #[serde(with = "export_timestamp")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Whether the account is currently suspended.
    pub suspended: bool,
    /// When the suspension began. Present iff `suspended`.
    #[serde(with = "export_timestamp")]
    pub suspended_at: Option<DateTime<Utc>>,
    /// Whether the account is banned. Orthogonal to suspension.
    pub banned: bool,
}

impl ThrottleRecord {
    /// Creates the initial record for an account: no attempts, not
    /// suspended, not banned.
    #[must_use]
    pub fn fresh(account_id: AccountId) -> Self {
        Self {
            account_id,
            attempts: 0,
            last_attempt_at: None,
            suspended: false,
            suspended_at: None,
            banned: false,
        }
    }

    /// Registers one failed attempt at `now`.
    pub fn register_attempt(&mut self, now: DateTime<Utc>) {
        self.attempts += 1;
        self.last_attempt_at = Some(now);
    }

    /// Marks the record suspended at `now`. Returns whether state changed;
    /// a live suspension is left untouched.
    pub fn begin_suspension(&mut self, now: DateTime<Utc>) -> bool {
        if self.suspended {
            return false;
        }

        self.suspended = true;
        self.suspended_at = Some(now);
        true
    }

    /// Lifts a suspension, clearing the attempt counters with it. Returns
    /// whether state changed.
    pub fn lift_suspension(&mut self) -> bool {
        if !self.suspended {
            return false;
        }

        self.reset_counters();
        true
    }

    /// Resets attempts, last attempt and suspension state unconditionally.
    pub fn reset_counters(&mut self) {
        self.attempts = 0;
        self.last_attempt_at = None;
        self.suspended = false;
        self.suspended_at = None;
    }

    /// Sets the ban flag. Returns whether state changed.
    pub fn set_banned(&mut self, banned: bool) -> bool {
        if self.banned == banned {
            return false;
        }

        self.banned = banned;
        true
    }

    /// Applies lazy time-based expiry as of `now`.
    ///
    /// Window expiry zeroes the attempt counter once the last failed
    /// attempt is at least `window` old. Cooldown expiry lifts a suspension
    /// once it is at least `window` old. Ban state never expires. Returns
    /// whether anything changed and therefore needs persisting.
    pub fn apply_expiry(&mut self, now: DateTime<Utc>, window: Duration) -> bool {
        let mut changed = false;

        if self.attempts > 0
            && let Some(last_attempt_at) = self.last_attempt_at
            && now >= last_attempt_at + window
        {
            self.attempts = 0;
            changed = true;
        }

        if self.suspended
            && let Some(suspended_at) = self.suspended_at
            && now >= suspended_at + window
        {
            self.lift_suspension();
            changed = true;
        }

        changed
    }
}

/// Optional timestamps in the `YYYY-MM-DD HH:MM:SS` export format used by
/// the `throttle` table.
mod export_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(timestamp) => serializer.serialize_some(&timestamp.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<String> = Option::deserialize(deserializer)?;
        value
            .map(|text| {
                NaiveDateTime::parse_from_str(text.as_str(), FORMAT)
                    .map(|naive| naive.and_utc())
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}
