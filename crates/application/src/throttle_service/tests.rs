use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Mutex;

use vigil_core::{AppError, AppResult};
use vigil_domain::{AccountId, AccountRef, ThrottleRecord};

use super::config::ThrottlePolicy;
use super::ports::{Clock, ThrottleRepository};
use super::service::ThrottleService;

#[derive(Default)]
struct FakeThrottleRepository {
    records: Mutex<HashMap<AccountId, ThrottleRecord>>,
    writes: Mutex<u32>,
}

#[async_trait]
impl ThrottleRepository for FakeThrottleRepository {
    async fn find_by_account_id(
        &self,
        account_id: AccountId,
    ) -> AppResult<Option<ThrottleRecord>> {
        Ok(self.records.lock().await.get(&account_id).cloned())
    }

    async fn save(&self, record: &ThrottleRecord) -> AppResult<()> {
        *self.writes.lock().await += 1;
        self.records
            .lock()
            .await
            .insert(record.account_id, record.clone());
        Ok(())
    }
}

struct ManualClock {
    base: DateTime<Utc>,
    offset_minutes: AtomicI64,
}

impl ManualClock {
    fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            offset_minutes: AtomicI64::new(0),
        }
    }

    fn advance_minutes(&self, minutes: i64) {
        self.offset_minutes.fetch_add(minutes, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + Duration::minutes(self.offset_minutes.load(Ordering::SeqCst))
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

fn account() -> AccountRef {
    AccountRef::new(AccountId::new(), "alice@example.com")
        .unwrap_or_else(|_| panic!("test account"))
}

fn fixture_with(
    policy: ThrottlePolicy,
) -> (ThrottleService, Arc<FakeThrottleRepository>, Arc<ManualClock>) {
    let repository = Arc::new(FakeThrottleRepository::default());
    let clock = Arc::new(ManualClock::starting_at(base_time()));
    let service = ThrottleService::with_policy(
        Arc::clone(&repository) as Arc<dyn ThrottleRepository>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        policy,
    );

    (service, repository, clock)
}

fn fixture() -> (ThrottleService, Arc<FakeThrottleRepository>, Arc<ManualClock>) {
    fixture_with(ThrottlePolicy::default())
}

async fn write_count(repository: &FakeThrottleRepository) -> u32 {
    *repository.writes.lock().await
}

#[tokio::test]
async fn check_succeeds_for_an_account_with_no_record() {
    let (service, repository, _clock) = fixture();
    let guard = service.guard(account());

    assert!(guard.check().await.is_ok());
    assert_eq!(guard.attempt_count().await.ok(), Some(0));
    assert_eq!(guard.is_suspended().await.ok(), Some(false));
    assert_eq!(write_count(&repository).await, 0);
}

#[tokio::test]
async fn five_attempts_inside_the_window_suspend_the_account() {
    let (service, _repository, clock) = fixture();
    let guard = service.guard(account());

    for _ in 0..5 {
        assert!(guard.record_failed_attempt().await.is_ok());
        clock.advance_minutes(1);
    }

    assert_eq!(guard.is_suspended().await.ok(), Some(true));
    assert_eq!(guard.attempt_count().await.ok(), Some(5));

    let error = guard.check().await.err();
    assert!(matches!(
        error,
        Some(AppError::AccountSuspended(login)) if login == "alice@example.com"
    ));

    clock.advance_minutes(16);
    assert!(guard.check().await.is_ok());
    assert_eq!(guard.attempt_count().await.ok(), Some(0));
}

#[tokio::test]
async fn attempts_restart_from_one_after_the_window_expires() {
    let (service, _repository, clock) = fixture();
    let guard = service.guard(account());

    assert!(guard.record_failed_attempt().await.is_ok());
    clock.advance_minutes(1);
    assert!(guard.record_failed_attempt().await.is_ok());

    clock.advance_minutes(15);
    assert_eq!(guard.attempt_count().await.ok(), Some(0));

    assert!(guard.record_failed_attempt().await.is_ok());
    assert_eq!(guard.attempt_count().await.ok(), Some(1));
}

#[tokio::test]
async fn record_failed_attempt_writes_exactly_once_per_call() {
    let (service, repository, _clock) = fixture_with(ThrottlePolicy::new(3, 15));
    let guard = service.guard(account());

    for expected_writes in 1..=3 {
        assert!(guard.record_failed_attempt().await.is_ok());
        assert_eq!(write_count(&repository).await, expected_writes);
    }

    assert_eq!(guard.is_suspended().await.ok(), Some(true));
}

#[tokio::test]
async fn clear_attempts_is_refused_inside_the_window() {
    let (service, repository, clock) = fixture();
    let guard = service.guard(account());

    assert!(guard.record_failed_attempt().await.is_ok());
    clock.advance_minutes(1);
    assert!(guard.record_failed_attempt().await.is_ok());

    assert!(guard.clear_attempts().await.is_ok());
    assert_eq!(guard.attempt_count().await.ok(), Some(2));
    assert_eq!(write_count(&repository).await, 2);
}

#[tokio::test]
async fn clear_attempts_resets_a_suspended_account_mid_window() {
    let (service, _repository, _clock) = fixture();
    let guard = service.guard(account());

    assert!(guard.record_failed_attempt().await.is_ok());
    assert!(guard.suspend().await.is_ok());

    assert!(guard.clear_attempts().await.is_ok());
    assert_eq!(guard.attempt_count().await.ok(), Some(0));
    assert_eq!(guard.is_suspended().await.ok(), Some(false));
}

#[tokio::test]
async fn clear_attempts_persists_a_reset_when_nothing_is_counting() {
    let (service, repository, _clock) = fixture();
    let guard = service.guard(account());

    assert!(guard.clear_attempts().await.is_ok());
    assert_eq!(write_count(&repository).await, 1);

    let stored = repository
        .find_by_account_id(guard.account().id())
        .await
        .ok()
        .flatten();
    assert_eq!(stored.map(|record| record.attempts), Some(0));
}

#[tokio::test]
async fn ban_blocks_check_until_unban() {
    let (service, _repository, _clock) = fixture();
    let guard = service.guard(account());

    assert!(guard.ban().await.is_ok());
    assert_eq!(guard.is_banned().await.ok(), Some(true));

    let error = guard.check().await.err();
    assert!(matches!(
        error,
        Some(AppError::AccountBanned(login)) if login == "alice@example.com"
    ));

    assert!(guard.unban().await.is_ok());
    assert!(guard.check().await.is_ok());
}

#[tokio::test]
async fn ban_takes_precedence_over_suspension() {
    let (service, _repository, _clock) = fixture();
    let guard = service.guard(account());

    assert!(guard.suspend().await.is_ok());
    assert!(guard.ban().await.is_ok());

    assert!(matches!(
        guard.check().await.err(),
        Some(AppError::AccountBanned(_))
    ));

    assert!(guard.unban().await.is_ok());
    assert!(matches!(
        guard.check().await.err(),
        Some(AppError::AccountSuspended(_))
    ));
}

#[tokio::test]
async fn ban_and_unban_persist_only_on_state_change() {
    let (service, repository, _clock) = fixture();
    let guard = service.guard(account());

    assert!(guard.ban().await.is_ok());
    assert!(guard.ban().await.is_ok());
    assert_eq!(write_count(&repository).await, 1);

    assert!(guard.unban().await.is_ok());
    assert!(guard.unban().await.is_ok());
    assert_eq!(write_count(&repository).await, 2);
}

#[tokio::test]
async fn disabled_guard_passes_even_when_banned_and_suspended() {
    let (service, _repository, _clock) = fixture();
    let mut guard = service.guard(account());

    assert!(guard.ban().await.is_ok());
    assert!(guard.suspend().await.is_ok());

    guard.disable();
    assert!(!guard.is_enabled());
    assert!(guard.check().await.is_ok());

    guard.enable();
    assert!(guard.check().await.is_err());
}

#[tokio::test]
async fn suspension_lifts_lazily_once_the_cooldown_elapses() {
    let (service, _repository, clock) = fixture();
    let guard = service.guard(account());

    assert!(guard.record_failed_attempt().await.is_ok());
    assert!(guard.suspend().await.is_ok());

    clock.advance_minutes(15);
    assert_eq!(guard.is_suspended().await.ok(), Some(false));
    assert_eq!(guard.attempt_count().await.ok(), Some(0));
}

#[tokio::test]
async fn suspend_and_unsuspend_are_idempotent() {
    let (service, repository, _clock) = fixture();
    let guard = service.guard(account());

    assert!(guard.suspend().await.is_ok());
    assert!(guard.suspend().await.is_ok());
    assert_eq!(write_count(&repository).await, 1);

    assert!(guard.unsuspend().await.is_ok());
    assert!(guard.unsuspend().await.is_ok());
    assert_eq!(write_count(&repository).await, 2);
}

#[tokio::test]
async fn guard_overrides_leave_the_service_policy_alone() {
    let (service, _repository, _clock) = fixture();
    let mut guard = service.guard(account());

    assert_eq!(guard.attempt_limit(), 5);
    assert_eq!(guard.suspension_time(), 15);

    guard.set_attempt_limit(2);
    guard.set_suspension_time(30);

    assert!(guard.record_failed_attempt().await.is_ok());
    assert!(guard.record_failed_attempt().await.is_ok());
    assert_eq!(guard.is_suspended().await.ok(), Some(true));

    assert_eq!(service.policy(), ThrottlePolicy::default());
    let untouched =
        service.guard(AccountRef::new(AccountId::new(), "bob").unwrap_or_else(|_| panic!("test")));
    assert_eq!(untouched.attempt_limit(), 5);
}

#[tokio::test]
async fn concurrent_attempts_do_not_lose_updates() {
    let (service, _repository, _clock) = fixture_with(ThrottlePolicy::new(100, 15));
    let shared = account();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let guard = service.guard(shared.clone());
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                let _ = guard.record_failed_attempt().await;
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    let guard = service.guard(shared);
    assert_eq!(guard.attempt_count().await.ok(), Some(20));
}
