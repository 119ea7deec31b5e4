//! PostgreSQL Repository Implementations
//!
//! Counters and deadlines are single upsert statements. Windowed operations
//! (usage reservation, client windows) run in a transaction holding an
//! advisory lock on their key, so trim, count and insert are one step.

use crate::domain::entities::HealthRecord;
use crate::domain::repository::{
    CooldownRepository, HealthRepository, MaintenanceRepository, UsageRepository,
};
use crate::domain::value_objects::IdentityId;
use crate::error::CredentialResult;
use platform::clock::duration_ms;
use platform::rate_limit::{RateLimitConfig, RateLimitError, RateLimitResult, RateLimitStore};
use sqlx::PgPool;
use std::time::Duration;

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgCredentialRepository {
    pool: PgPool,
}

impl PgCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl HealthRepository for PgCredentialRepository {
    async fn ensure_records(&self, ids: &[IdentityId]) -> CredentialResult<u64> {
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();

        let created = sqlx::query(
            r#"
            INSERT INTO credential_health (identity_id)
            SELECT UNNEST($1::TEXT[])
            ON CONFLICT (identity_id) DO NOTHING
            "#,
        )
        .bind(&ids)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(created)
    }

    async fn record_success(
        &self,
        id: &IdentityId,
        now_ms: i64,
    ) -> CredentialResult<HealthRecord> {
        let row = sqlx::query_as::<_, HealthRow>(
            r#"
            WITH cleared AS (
                DELETE FROM credential_cooldowns WHERE identity_id = $1
            )
            INSERT INTO credential_health (identity_id, successes, last_success_at_ms)
            VALUES ($1, 1, $2)
            ON CONFLICT (identity_id) DO UPDATE SET
                successes = credential_health.successes + 1,
                last_success_at_ms = EXCLUDED.last_success_at_ms
            RETURNING
                successes,
                challenges,
                CASE WHEN rate_limits_expire_at_ms > $2 THEN rate_limits ELSE 0 END AS rate_limits,
                last_success_at_ms,
                last_challenge_at_ms,
                last_used_at_ms
            "#,
        )
        .bind(id.as_str())
        .bind(now_ms)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_record())
    }

    async fn record_challenge(&self, id: &IdentityId, now_ms: i64) -> CredentialResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO credential_health (identity_id, challenges, last_challenge_at_ms)
            VALUES ($1, 1, $2)
            ON CONFLICT (identity_id) DO UPDATE SET
                challenges = credential_health.challenges + 1,
                last_challenge_at_ms = EXCLUDED.last_challenge_at_ms
            RETURNING challenges
            "#,
        )
        .bind(id.as_str())
        .bind(now_ms)
        .fetch_one(&self.pool)
        .await?;

        Ok(to_u64(count))
    }

    async fn record_rate_limited(
        &self,
        id: &IdentityId,
        now_ms: i64,
        ttl: Duration,
    ) -> CredentialResult<u64> {
        let expires_at_ms = now_ms.saturating_add(duration_ms(ttl));

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO credential_health (identity_id, rate_limits, rate_limits_expire_at_ms)
            VALUES ($1, 1, $3)
            ON CONFLICT (identity_id) DO UPDATE SET
                rate_limits = CASE
                    WHEN credential_health.rate_limits_expire_at_ms > $2
                        THEN credential_health.rate_limits + 1
                    ELSE 1
                END,
                rate_limits_expire_at_ms = EXCLUDED.rate_limits_expire_at_ms
            RETURNING rate_limits
            "#,
        )
        .bind(id.as_str())
        .bind(now_ms)
        .bind(expires_at_ms)
        .fetch_one(&self.pool)
        .await?;

        Ok(to_u64(count))
    }

    async fn health_of(&self, id: &IdentityId, now_ms: i64) -> CredentialResult<HealthRecord> {
        let row = sqlx::query_as::<_, HealthRow>(
            r#"
            SELECT
                successes,
                challenges,
                CASE WHEN rate_limits_expire_at_ms > $2 THEN rate_limits ELSE 0 END AS rate_limits,
                last_success_at_ms,
                last_challenge_at_ms,
                last_used_at_ms
            FROM credential_health
            WHERE identity_id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(HealthRow::into_record).unwrap_or_default())
    }
}

impl CooldownRepository for PgCredentialRepository {
    async fn extend_cooldown(&self, id: &IdentityId, resume_at_ms: i64) -> CredentialResult<i64> {
        let until = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO credential_cooldowns (identity_id, resume_at_ms)
            VALUES ($1, $2)
            ON CONFLICT (identity_id) DO UPDATE SET
                resume_at_ms = GREATEST(credential_cooldowns.resume_at_ms, EXCLUDED.resume_at_ms)
            RETURNING resume_at_ms
            "#,
        )
        .bind(id.as_str())
        .bind(resume_at_ms)
        .fetch_one(&self.pool)
        .await?;

        Ok(until)
    }

    async fn cooldown_until(&self, id: &IdentityId, now_ms: i64) -> CredentialResult<Option<i64>> {
        let until = sqlx::query_scalar::<_, i64>(
            "SELECT resume_at_ms FROM credential_cooldowns WHERE identity_id = $1 AND resume_at_ms > $2",
        )
        .bind(id.as_str())
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(until)
    }
}

impl UsageRepository for PgCredentialRepository {
    async fn usage_count(
        &self,
        id: &IdentityId,
        now_ms: i64,
        window: Duration,
    ) -> CredentialResult<u32> {
        let floor = now_ms.saturating_sub(duration_ms(window));

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM credential_usage WHERE identity_id = $1 AND used_at_ms > $2",
        )
        .bind(id.as_str())
        .bind(floor)
        .fetch_one(&self.pool)
        .await?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn reserve_use(
        &self,
        id: &IdentityId,
        now_ms: i64,
        window: Duration,
        cap: u32,
    ) -> CredentialResult<bool> {
        let floor = now_ms.saturating_sub(duration_ms(window));
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("usage:{}", id.as_str()))
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM credential_usage WHERE identity_id = $1 AND used_at_ms <= $2")
            .bind(id.as_str())
            .bind(floor)
            .execute(&mut *tx)
            .await?;

        let used = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM credential_usage WHERE identity_id = $1",
        )
        .bind(id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        if used >= i64::from(cap) {
            tx.commit().await?;
            tracing::debug!(identity_id = %id, used, cap, "Usage cap reached");
            return Ok(false);
        }

        sqlx::query("INSERT INTO credential_usage (identity_id, used_at_ms) VALUES ($1, $2)")
            .bind(id.as_str())
            .bind(now_ms)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO credential_health (identity_id, last_used_at_ms)
            VALUES ($1, $2)
            ON CONFLICT (identity_id) DO UPDATE SET
                last_used_at_ms = EXCLUDED.last_used_at_ms
            "#,
        )
        .bind(id.as_str())
        .bind(now_ms)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

impl MaintenanceRepository for PgCredentialRepository {
    async fn purge_expired(&self, now_ms: i64, usage_window: Duration) -> CredentialResult<u64> {
        let floor = now_ms.saturating_sub(duration_ms(usage_window));

        let cooldowns_deleted =
            sqlx::query("DELETE FROM credential_cooldowns WHERE resume_at_ms <= $1")
                .bind(now_ms)
                .execute(&self.pool)
                .await?
                .rows_affected();

        let usage_deleted = sqlx::query("DELETE FROM credential_usage WHERE used_at_ms <= $1")
            .bind(floor)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(
            cooldowns = cooldowns_deleted,
            usage = usage_deleted,
            "Cleaned up expired credential data"
        );

        Ok(cooldowns_deleted + usage_deleted)
    }
}

impl RateLimitStore for PgCredentialRepository {
    async fn check_and_record(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        let floor = config.window_floor_ms(now_ms);
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        sqlx::query("DELETE FROM client_rate_limits WHERE client_key = $1 AND hit_at_ms <= $2")
            .bind(key)
            .bind(floor)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        let (count, oldest) = sqlx::query_as::<_, (i64, Option<i64>)>(
            "SELECT COUNT(*), MIN(hit_at_ms) FROM client_rate_limits WHERE client_key = $1",
        )
        .bind(key)
        .fetch_one(&mut *tx)
        .await
        .map_err(unavailable)?;

        let allowed = count < i64::from(config.max_requests);
        if allowed {
            sqlx::query("INSERT INTO client_rate_limits (client_key, hit_at_ms) VALUES ($1, $2)")
                .bind(key)
                .bind(now_ms)
                .execute(&mut *tx)
                .await
                .map_err(unavailable)?;
        }

        tx.commit().await.map_err(unavailable)?;

        let count = if allowed { count + 1 } else { count };
        let oldest = oldest.or(allowed.then_some(now_ms));
        Ok(RateLimitResult::from_window(
            allowed,
            u32::try_from(count).unwrap_or(u32::MAX),
            oldest,
            config,
        ))
    }

    async fn purge_idle(
        &self,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<u64, RateLimitError> {
        let floor = config.window_floor_ms(now_ms);

        let idle = sqlx::query_scalar::<_, i64>(
            r#"
            WITH idle AS (
                SELECT client_key FROM client_rate_limits
                GROUP BY client_key
                HAVING MAX(hit_at_ms) <= $1
            ), gone AS (
                DELETE FROM client_rate_limits WHERE hit_at_ms <= $1
            )
            SELECT COUNT(*) FROM idle
            "#,
        )
        .bind(floor)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(to_u64(idle))
    }
}

fn unavailable(e: sqlx::Error) -> RateLimitError {
    RateLimitError::Unavailable(e.to_string())
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct HealthRow {
    successes: i64,
    challenges: i64,
    rate_limits: i64,
    last_success_at_ms: Option<i64>,
    last_challenge_at_ms: Option<i64>,
    last_used_at_ms: Option<i64>,
}

impl HealthRow {
    fn into_record(self) -> HealthRecord {
        HealthRecord {
            successes: to_u64(self.successes),
            challenges: to_u64(self.challenges),
            rate_limits: to_u64(self.rate_limits),
            last_success_at_ms: self.last_success_at_ms,
            last_challenge_at_ms: self.last_challenge_at_ms,
            last_used_at_ms: self.last_used_at_ms,
        }
    }
}
