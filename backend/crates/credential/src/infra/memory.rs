//! In-Memory Repository
//!
//! Single-process store for development and tests. Each identity's state sits
//! behind one DashMap shard lock, so every trait method is atomic per identity.

use crate::domain::entities::HealthRecord;
use crate::domain::repository::{
    CooldownRepository, HealthRepository, MaintenanceRepository, UsageRepository,
};
use crate::domain::value_objects::IdentityId;
use crate::error::CredentialResult;
use dashmap::DashMap;
use platform::clock::duration_ms;
use platform::rate_limit::{
    MemoryRateLimitStore, RateLimitConfig, RateLimitError, RateLimitResult, RateLimitStore,
};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Default)]
struct IdentityState {
    successes: u64,
    challenges: u64,
    rate_limits: u64,
    rate_limits_expire_at_ms: Option<i64>,
    last_success_at_ms: Option<i64>,
    last_challenge_at_ms: Option<i64>,
    last_used_at_ms: Option<i64>,
    cooldown_until_ms: Option<i64>,
    usage: VecDeque<i64>,
}

impl IdentityState {
    fn rate_limits_at(&self, now_ms: i64) -> u64 {
        match self.rate_limits_expire_at_ms {
            Some(expires) if expires > now_ms => self.rate_limits,
            _ => 0,
        }
    }

    fn record(&self, now_ms: i64) -> HealthRecord {
        HealthRecord {
            successes: self.successes,
            challenges: self.challenges,
            rate_limits: self.rate_limits_at(now_ms),
            last_success_at_ms: self.last_success_at_ms,
            last_challenge_at_ms: self.last_challenge_at_ms,
            last_used_at_ms: self.last_used_at_ms,
        }
    }

    fn trim_usage(&mut self, floor_ms: i64) {
        while self.usage.front().is_some_and(|&ts| ts <= floor_ms) {
            self.usage.pop_front();
        }
    }
}

/// In-process credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    identities: DashMap<IdentityId, IdentityState>,
    windows: MemoryRateLimitStore,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identities with a record
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl HealthRepository for MemoryCredentialStore {
    async fn ensure_records(&self, ids: &[IdentityId]) -> CredentialResult<u64> {
        let mut created = 0;
        for id in ids {
            self.identities.entry(id.clone()).or_insert_with(|| {
                created += 1;
                IdentityState::default()
            });
        }
        Ok(created)
    }

    async fn record_success(
        &self,
        id: &IdentityId,
        now_ms: i64,
    ) -> CredentialResult<HealthRecord> {
        let mut state = self.identities.entry(id.clone()).or_default();
        state.successes = state.successes.saturating_add(1);
        state.last_success_at_ms = Some(now_ms);
        state.cooldown_until_ms = None;
        Ok(state.record(now_ms))
    }

    async fn record_challenge(&self, id: &IdentityId, now_ms: i64) -> CredentialResult<u64> {
        let mut state = self.identities.entry(id.clone()).or_default();
        state.challenges = state.challenges.saturating_add(1);
        state.last_challenge_at_ms = Some(now_ms);
        Ok(state.challenges)
    }

    async fn record_rate_limited(
        &self,
        id: &IdentityId,
        now_ms: i64,
        ttl: Duration,
    ) -> CredentialResult<u64> {
        let mut state = self.identities.entry(id.clone()).or_default();
        state.rate_limits = state.rate_limits_at(now_ms).saturating_add(1);
        state.rate_limits_expire_at_ms = Some(now_ms.saturating_add(duration_ms(ttl)));
        Ok(state.rate_limits)
    }

    async fn health_of(&self, id: &IdentityId, now_ms: i64) -> CredentialResult<HealthRecord> {
        Ok(self
            .identities
            .get(id)
            .map(|state| state.record(now_ms))
            .unwrap_or_default())
    }
}

impl CooldownRepository for MemoryCredentialStore {
    async fn extend_cooldown(&self, id: &IdentityId, resume_at_ms: i64) -> CredentialResult<i64> {
        let mut state = self.identities.entry(id.clone()).or_default();
        let until = state
            .cooldown_until_ms
            .map_or(resume_at_ms, |existing| existing.max(resume_at_ms));
        state.cooldown_until_ms = Some(until);
        Ok(until)
    }

    async fn cooldown_until(&self, id: &IdentityId, now_ms: i64) -> CredentialResult<Option<i64>> {
        Ok(self
            .identities
            .get(id)
            .and_then(|state| state.cooldown_until_ms)
            .filter(|&until| until > now_ms))
    }
}

impl UsageRepository for MemoryCredentialStore {
    async fn usage_count(
        &self,
        id: &IdentityId,
        now_ms: i64,
        window: Duration,
    ) -> CredentialResult<u32> {
        let floor = now_ms.saturating_sub(duration_ms(window));
        let count = self
            .identities
            .get(id)
            .map(|state| state.usage.iter().filter(|&&ts| ts > floor).count())
            .unwrap_or(0);
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn reserve_use(
        &self,
        id: &IdentityId,
        now_ms: i64,
        window: Duration,
        cap: u32,
    ) -> CredentialResult<bool> {
        let mut state = self.identities.entry(id.clone()).or_default();
        state.trim_usage(now_ms.saturating_sub(duration_ms(window)));
        if state.usage.len() >= cap as usize {
            return Ok(false);
        }
        state.usage.push_back(now_ms);
        state.last_used_at_ms = Some(now_ms);
        Ok(true)
    }
}

impl MaintenanceRepository for MemoryCredentialStore {
    async fn purge_expired(&self, now_ms: i64, usage_window: Duration) -> CredentialResult<u64> {
        let floor = now_ms.saturating_sub(duration_ms(usage_window));
        let mut removed = 0u64;
        for mut state in self.identities.iter_mut() {
            if state.cooldown_until_ms.is_some_and(|until| until <= now_ms) {
                state.cooldown_until_ms = None;
                removed += 1;
            }
            let before = state.usage.len();
            state.trim_usage(floor);
            removed += (before - state.usage.len()) as u64;
        }
        Ok(removed)
    }
}

impl RateLimitStore for MemoryCredentialStore {
    async fn check_and_record(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        self.windows.check_and_record(key, config, now_ms).await
    }

    async fn purge_idle(
        &self,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<u64, RateLimitError> {
        self.windows.purge_idle(config, now_ms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;
    const HOUR: Duration = Duration::from_secs(3600);

    fn id(s: &str) -> IdentityId {
        IdentityId::new(s)
    }

    #[tokio::test]
    async fn test_ensure_records_counts_only_new() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.ensure_records(&[id("a"), id("b")]).await.unwrap(), 2);
        assert_eq!(store.ensure_records(&[id("a"), id("c")]).await.unwrap(), 1);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_identity_reads_as_zero() {
        let store = MemoryCredentialStore::new();
        let health = store.health_of(&id("ghost"), NOW).await.unwrap();
        assert_eq!(health, HealthRecord::default());
        assert_eq!(store.cooldown_until(&id("ghost"), NOW).await.unwrap(), None);
        assert_eq!(store.usage_count(&id("ghost"), NOW, HOUR).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_success_clears_cooldown_keeps_challenges() {
        let store = MemoryCredentialStore::new();
        store.record_challenge(&id("a"), NOW).await.unwrap();
        store.extend_cooldown(&id("a"), NOW + 60_000).await.unwrap();

        let health = store.record_success(&id("a"), NOW + 1).await.unwrap();
        assert_eq!(health.successes, 1);
        assert_eq!(health.challenges, 1);
        assert_eq!(health.last_success_at_ms, Some(NOW + 1));
        assert_eq!(store.cooldown_until(&id("a"), NOW + 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rate_limit_counter_expires() {
        let store = MemoryCredentialStore::new();
        let ttl = Duration::from_secs(24 * 3600);
        assert_eq!(store.record_rate_limited(&id("a"), NOW, ttl).await.unwrap(), 1);
        assert_eq!(store.record_rate_limited(&id("a"), NOW + 1_000, ttl).await.unwrap(), 2);

        // Expiry is measured from the latest increment
        let later = NOW + 1_000 + duration_ms(ttl);
        assert_eq!(store.health_of(&id("a"), later - 1).await.unwrap().rate_limits, 2);
        assert_eq!(store.health_of(&id("a"), later).await.unwrap().rate_limits, 0);
        assert_eq!(store.record_rate_limited(&id("a"), later, ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_never_shortens() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.extend_cooldown(&id("a"), NOW + 5_000).await.unwrap(), NOW + 5_000);
        assert_eq!(store.extend_cooldown(&id("a"), NOW + 1_000).await.unwrap(), NOW + 5_000);
        assert_eq!(
            store.cooldown_until(&id("a"), NOW + 4_999).await.unwrap(),
            Some(NOW + 5_000)
        );
        assert_eq!(store.cooldown_until(&id("a"), NOW + 5_000).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reserve_use_respects_cap_and_window() {
        let store = MemoryCredentialStore::new();
        assert!(store.reserve_use(&id("a"), NOW, HOUR, 2).await.unwrap());
        assert!(store.reserve_use(&id("a"), NOW + 1, HOUR, 2).await.unwrap());
        assert!(!store.reserve_use(&id("a"), NOW + 2, HOUR, 2).await.unwrap());
        assert_eq!(store.usage_count(&id("a"), NOW + 2, HOUR).await.unwrap(), 2);
        assert_eq!(
            store.health_of(&id("a"), NOW + 2).await.unwrap().last_used_at_ms,
            Some(NOW + 1)
        );

        // First use leaves the window
        let later = NOW + duration_ms(HOUR);
        assert_eq!(store.usage_count(&id("a"), later, HOUR).await.unwrap(), 1);
        assert!(store.reserve_use(&id("a"), later, HOUR, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_exceed_cap() {
        let store = std::sync::Arc::new(MemoryCredentialStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.reserve_use(&id("a"), NOW, HOUR, 10).await.unwrap()
            }));
        }
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_health_writes_are_not_lost() {
        let store = std::sync::Arc::new(MemoryCredentialStore::new());
        let mut handles = Vec::new();
        for i in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.record_success(&id("a"), NOW + i).await.unwrap();
                store.record_challenge(&id("a"), NOW + i).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let health = store.health_of(&id("a"), NOW + 64).await.unwrap();
        assert_eq!(health.successes, 64);
        assert_eq!(health.challenges, 64);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryCredentialStore::new();
        store.extend_cooldown(&id("a"), NOW + 10).await.unwrap();
        store.reserve_use(&id("a"), NOW, HOUR, 10).await.unwrap();
        store.reserve_use(&id("b"), NOW + 100, HOUR, 10).await.unwrap();

        let later = NOW + duration_ms(HOUR) + 50;
        assert_eq!(store.purge_expired(later, HOUR).await.unwrap(), 2);
        assert_eq!(store.usage_count(&id("b"), later, HOUR).await.unwrap(), 1);
        // Health survives purges
        assert_eq!(store.len(), 2);
    }
}
