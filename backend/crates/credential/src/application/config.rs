//! Application Configuration
//!
//! Every scheduling policy constant lives here and can be tuned per deployment.

use crate::domain::services::{CooldownPolicy, ScoreWeights};
use platform::rate_limit::RateLimitConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Attempts per logical operation
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt
    pub base_delay: Duration,
    /// Random delay added to every backoff
    pub jitter_min: Duration,
    pub jitter_max: Duration,
    /// Timeout for one platform call
    pub request_timeout: Duration,
    /// Uses per identity inside `usage_window`
    pub hourly_usage_cap: u32,
    pub usage_window: Duration,
    /// Pick uniformly among this many best-scored identities
    pub top_k: usize,
    pub challenge_cooldown: CooldownPolicy,
    pub rate_limit_cooldown: CooldownPolicy,
    /// Lifetime of the rate-limit counter after its last increment
    pub rate_limit_counter_ttl: Duration,
    pub score: ScoreWeights,
    /// Inbound per-client limit
    pub client_rate_limit: RateLimitConfig,
    pub task_max_age: Duration,
    pub sweep_interval: Duration,
    /// Outbound HTTP clients kept in rotation
    pub client_pool_size: usize,
    pub identity_dir: PathBuf,
    pub platform_base_url: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(10),
            jitter_min: Duration::from_secs(1),
            jitter_max: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            hourly_usage_cap: 100,
            usage_window: Duration::from_secs(3600),
            top_k: 3,
            challenge_cooldown: CooldownPolicy::CHALLENGE,
            rate_limit_cooldown: CooldownPolicy::RATE_LIMIT,
            rate_limit_counter_ttl: Duration::from_secs(24 * 3600),
            score: ScoreWeights::default(),
            client_rate_limit: RateLimitConfig::default(),
            task_max_age: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            client_pool_size: 5,
            identity_dir: PathBuf::from("cookies"),
            platform_base_url: "https://www.instagram.com".to_string(),
        }
    }
}

impl CredentialConfig {
    pub fn usage_window_ms(&self) -> i64 {
        platform::clock::duration_ms(self.usage_window)
    }

    /// Jitter bounds in milliseconds, low end first
    pub fn jitter_range_ms(&self) -> std::ops::RangeInclusive<u64> {
        let low = self.jitter_min.as_millis() as u64;
        let high = (self.jitter_max.as_millis() as u64).max(low);
        low..=high
    }
}
