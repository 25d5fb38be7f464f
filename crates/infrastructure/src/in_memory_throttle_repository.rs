//! In-memory throttle repository implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use vigil_application::ThrottleRepository;
use vigil_core::AppResult;
use vigil_domain::{AccountId, ThrottleRecord};

/// In-memory throttle repository, for tests and single-process setups.
#[derive(Debug, Default)]
pub struct InMemoryThrottleRepository {
    records: RwLock<HashMap<AccountId, ThrottleRecord>>,
}

impl InMemoryThrottleRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ThrottleRepository for InMemoryThrottleRepository {
    async fn find_by_account_id(
        &self,
        account_id: AccountId,
    ) -> AppResult<Option<ThrottleRecord>> {
        Ok(self.records.read().await.get(&account_id).cloned())
    }

    async fn save(&self, record: &ThrottleRecord) -> AppResult<()> {
        self.records
            .write()
            .await
            .insert(record.account_id, record.clone());

        Ok(())
    }
}
