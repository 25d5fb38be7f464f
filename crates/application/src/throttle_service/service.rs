use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use vigil_core::{AppError, AppResult};
use vigil_domain::{AccountId, AccountRef, ThrottleRecord};

use super::config::ThrottlePolicy;
use super::ports::{Clock, ThrottleRepository};

/// Per-account mutation locks shared by every guard minted from one
/// service. Serializes load-mutate-persist sequences per account id so
/// concurrent failed attempts cannot lose counter updates. Never locks
/// globally.
#[derive(Clone, Default)]
struct AccountLocks {
    inner: Arc<Mutex<HashMap<AccountId, Arc<Mutex<()>>>>>,
}

impl AccountLocks {
    async fn acquire(&self, account_id: AccountId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            Arc::clone(locks.entry(account_id).or_default())
        };

        lock.lock_owned().await
    }
}

/// Factory for per-account throttle guards.
#[derive(Clone)]
pub struct ThrottleService {
    repository: Arc<dyn ThrottleRepository>,
    clock: Arc<dyn Clock>,
    policy: ThrottlePolicy,
    locks: AccountLocks,
}

impl ThrottleService {
    /// Creates a service with the default policy.
    #[must_use]
    pub fn new(repository: Arc<dyn ThrottleRepository>, clock: Arc<dyn Clock>) -> Self {
        Self::with_policy(repository, clock, ThrottlePolicy::default())
    }

    /// Creates a service with an explicit process-wide policy.
    #[must_use]
    pub fn with_policy(
        repository: Arc<dyn ThrottleRepository>,
        clock: Arc<dyn Clock>,
        policy: ThrottlePolicy,
    ) -> Self {
        Self {
            repository,
            clock,
            policy,
            locks: AccountLocks::default(),
        }
    }

    /// Returns the process-wide default policy.
    #[must_use]
    pub fn policy(&self) -> ThrottlePolicy {
        self.policy
    }

    /// Builds a guard for one account. The guard starts enabled and
    /// inherits the service policy; both can be overridden per guard.
    #[must_use]
    pub fn guard(&self, account: AccountRef) -> ThrottleGuard {
        ThrottleGuard {
            account,
            repository: Arc::clone(&self.repository),
            clock: Arc::clone(&self.clock),
            locks: self.locks.clone(),
            policy: self.policy,
            enabled: true,
        }
    }
}

/// Per-account throttle handle: counts failed attempts, suspends at the
/// attempt limit, and gates logins on ban and suspension state.
///
/// An account with no persisted record behaves as a fresh one; the record
/// row is created on the first write.
pub struct ThrottleGuard {
    account: AccountRef,
    repository: Arc<dyn ThrottleRepository>,
    clock: Arc<dyn Clock>,
    locks: AccountLocks,
    policy: ThrottlePolicy,
    enabled: bool,
}

impl ThrottleGuard {
    /// Returns the account this guard watches.
    #[must_use]
    pub fn account(&self) -> &AccountRef {
        &self.account
    }

    /// Records one failed login attempt.
    ///
    /// Reaching the attempt limit suspends the account in the same write.
    /// Exactly one store write per call.
    pub async fn record_failed_attempt(&self) -> AppResult<()> {
        let _serial = self.locks.acquire(self.account.id()).await;
        let now = self.clock.now();

        let mut record = self.load().await?;
        record.apply_expiry(now, self.window());
        record.register_attempt(now);

        if record.attempts >= self.policy.attempt_limit && record.begin_suspension(now) {
            warn!(
                account = %self.account.login(),
                attempts = record.attempts,
                "attempt limit reached, suspending account"
            );
        }

        self.repository.save(&record).await
    }

    /// Returns the current attempt count, zeroing it first when the last
    /// failed attempt has aged past the window.
    pub async fn attempt_count(&self) -> AppResult<i32> {
        let _serial = self.locks.acquire(self.account.id()).await;

        let mut record = self.load().await?;
        if record.apply_expiry(self.clock.now(), self.window()) {
            self.repository.save(&record).await?;
        }

        Ok(record.attempts)
    }

    /// Clears attempts and suspension state.
    ///
    /// Refused while attempts are still inside the window and the account
    /// is not suspended: the window is left to expire on its own.
    pub async fn clear_attempts(&self) -> AppResult<()> {
        let _serial = self.locks.acquire(self.account.id()).await;

        let mut record = self.load().await?;
        record.apply_expiry(self.clock.now(), self.window());

        if record.attempts > 0 && !record.suspended {
            return Ok(());
        }

        record.reset_counters();
        self.repository.save(&record).await
    }

    /// Suspends the account now. Idempotent while a suspension is live; an
    /// expired suspension is lifted first and re-stamped.
    pub async fn suspend(&self) -> AppResult<()> {
        let _serial = self.locks.acquire(self.account.id()).await;
        let now = self.clock.now();

        let mut record = self.load().await?;
        let expired = record.apply_expiry(now, self.window());

        let suspended_now = record.begin_suspension(now);
        if suspended_now {
            info!(account = %self.account.login(), "account suspended");
        }

        if expired || suspended_now {
            self.repository.save(&record).await?;
        }

        Ok(())
    }

    /// Lifts a suspension and clears the attempt counters. Idempotent.
    pub async fn unsuspend(&self) -> AppResult<()> {
        let _serial = self.locks.acquire(self.account.id()).await;

        let mut record = self.load().await?;
        let mut changed = record.apply_expiry(self.clock.now(), self.window());

        if record.lift_suspension() {
            info!(account = %self.account.login(), "account suspension lifted");
            changed = true;
        }

        if changed {
            self.repository.save(&record).await?;
        }

        Ok(())
    }

    /// Whether the account is currently suspended, lifting the suspension
    /// first when its cooldown has elapsed.
    pub async fn is_suspended(&self) -> AppResult<bool> {
        let _serial = self.locks.acquire(self.account.id()).await;

        let mut record = self.load().await?;
        if record.apply_expiry(self.clock.now(), self.window()) {
            self.repository.save(&record).await?;
        }

        Ok(record.suspended)
    }

    /// Bans the account. Permanent until [`ThrottleGuard::unban`];
    /// suspension state is left untouched.
    pub async fn ban(&self) -> AppResult<()> {
        let _serial = self.locks.acquire(self.account.id()).await;

        let mut record = self.load().await?;
        if record.set_banned(true) {
            info!(account = %self.account.login(), "account banned");
            self.repository.save(&record).await?;
        }

        Ok(())
    }

    /// Lifts a ban. Suspension state is left untouched.
    pub async fn unban(&self) -> AppResult<()> {
        let _serial = self.locks.acquire(self.account.id()).await;

        let mut record = self.load().await?;
        if record.set_banned(false) {
            info!(account = %self.account.login(), "account unbanned");
            self.repository.save(&record).await?;
        }

        Ok(())
    }

    /// Whether the account is banned. Pure read, no expiry.
    pub async fn is_banned(&self) -> AppResult<bool> {
        Ok(self.load().await?.banned)
    }

    /// Gates a login attempt: fails when the account is banned or
    /// suspended, ban checked first.
    ///
    /// A disabled guard passes unconditionally, and so does an account
    /// with no persisted record.
    pub async fn check(&self) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let _serial = self.locks.acquire(self.account.id()).await;
        let mut record = self.load().await?;

        if record.banned {
            return Err(AppError::AccountBanned(self.account.login().to_owned()));
        }

        if record.apply_expiry(self.clock.now(), self.window()) {
            self.repository.save(&record).await?;
        }

        if record.suspended {
            return Err(AppError::AccountSuspended(self.account.login().to_owned()));
        }

        Ok(())
    }

    /// Enables the gate for this guard instance.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disables the gate; [`ThrottleGuard::check`] passes unconditionally
    /// while disabled.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Whether the gate is enabled. In-memory state, never persisted.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the attempt limit for this guard.
    #[must_use]
    pub fn attempt_limit(&self) -> i32 {
        self.policy.attempt_limit
    }

    /// Overrides the attempt limit for this guard.
    pub fn set_attempt_limit(&mut self, limit: i32) {
        self.policy.attempt_limit = limit;
    }

    /// Returns the suspension window in minutes.
    #[must_use]
    pub fn suspension_time(&self) -> i64 {
        self.policy.suspension_minutes
    }

    /// Overrides the suspension window, in minutes.
    pub fn set_suspension_time(&mut self, minutes: i64) {
        self.policy.suspension_minutes = minutes;
    }

    async fn load(&self) -> AppResult<ThrottleRecord> {
        let stored = self
            .repository
            .find_by_account_id(self.account.id())
            .await?;

        Ok(stored.unwrap_or_else(|| ThrottleRecord::fresh(self.account.id())))
    }

    fn window(&self) -> Duration {
        self.policy.window()
    }
}
