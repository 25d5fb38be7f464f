//! PostgreSQL-backed throttle repository using the `throttle` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vigil_application::ThrottleRepository;
use vigil_core::{AppError, AppResult};
use vigil_domain::{AccountId, ThrottleRecord};

/// PostgreSQL implementation of the throttle repository port.
#[derive(Clone)]
pub struct PostgresThrottleRepository {
    pool: PgPool,
}

impl PostgresThrottleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ThrottleRow {
    account_id: uuid::Uuid,
    attempts: i32,
    last_attempt_at: Option<DateTime<Utc>>,
    suspended: bool,
    suspended_at: Option<DateTime<Utc>>,
    banned: bool,
}

impl From<ThrottleRow> for ThrottleRecord {
    fn from(row: ThrottleRow) -> Self {
        Self {
            account_id: AccountId::from_uuid(row.account_id),
            attempts: row.attempts,
            last_attempt_at: row.last_attempt_at,
            suspended: row.suspended,
            suspended_at: row.suspended_at,
            banned: row.banned,
        }
    }
}

#[async_trait]
impl ThrottleRepository for PostgresThrottleRepository {
    async fn find_by_account_id(
        &self,
        account_id: AccountId,
    ) -> AppResult<Option<ThrottleRecord>> {
        let row = sqlx::query_as::<_, ThrottleRow>(
            r#"
            SELECT account_id, attempts, last_attempt_at, suspended, suspended_at, banned
            FROM throttle
            WHERE account_id = $1
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to load throttle record: {error}")))?;

        Ok(row.map(ThrottleRecord::from))
    }

    async fn save(&self, record: &ThrottleRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO throttle (account_id, attempts, last_attempt_at, suspended, suspended_at, banned)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (account_id) DO UPDATE
            SET attempts = EXCLUDED.attempts,
                last_attempt_at = EXCLUDED.last_attempt_at,
                suspended = EXCLUDED.suspended,
                suspended_at = EXCLUDED.suspended_at,
                banned = EXCLUDED.banned
            "#,
        )
        .bind(record.account_id.as_uuid())
        .bind(record.attempts)
        .bind(record.last_attempt_at)
        .bind(record.suspended)
        .bind(record.suspended_at)
        .bind(record.banned)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to save throttle record: {error}")))?;

        Ok(())
    }
}
