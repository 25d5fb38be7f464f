use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vigil_core::AppResult;
use vigil_domain::{AccountId, ThrottleRecord};

/// Repository port for throttle record persistence.
#[async_trait]
pub trait ThrottleRepository: Send + Sync {
    /// Loads the record for an account, if one has been persisted.
    async fn find_by_account_id(
        &self,
        account_id: AccountId,
    ) -> AppResult<Option<ThrottleRecord>>;

    /// Persists the record, inserting or overwriting by account id.
    async fn save(&self, record: &ThrottleRecord) -> AppResult<()>;
}

/// Port for reading the current time. Injectable so window and cooldown
/// expiry are testable without wall-clock delays.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}
