//! Rate Limiting Infrastructure
//!
//! Sliding-window rate limiting: a key is admitted while fewer than
//! `max_requests` admitted hits fall inside the trailing `window`.

use crate::clock::duration_ms;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Trailing window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        duration_ms(self.window)
    }

    /// Oldest timestamp still inside the window ending at `now_ms`
    ///
    /// Hits at or before `now_ms - window` have expired.
    pub fn window_floor_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.window_ms())
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Hits inside the window after this check
    pub count: u32,
    pub remaining: u32,
    /// When the oldest hit leaves the window (0 if the window is empty)
    pub reset_at_ms: i64,
}

impl RateLimitResult {
    /// Build a result from the window contents after the check
    pub fn from_window(
        allowed: bool,
        count: u32,
        oldest_ms: Option<i64>,
        config: &RateLimitConfig,
    ) -> Self {
        Self {
            allowed,
            count,
            remaining: config.max_requests.saturating_sub(count),
            reset_at_ms: oldest_ms
                .map(|ts| ts.saturating_add(config.window_ms()))
                .unwrap_or(0),
        }
    }

    /// Milliseconds the caller should wait before trying again
    pub fn retry_after_ms(&self, now_ms: i64) -> i64 {
        if self.allowed {
            0
        } else {
            self.reset_at_ms.saturating_sub(now_ms).max(0)
        }
    }
}

/// Rate limit store failure
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit store unavailable: {0}")]
    Unavailable(String),
}

/// Trait for rate limit storage backends
///
/// Implementations must trim, admit and count as one atomic step per key.
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Drop expired hits, admit `now_ms` if there is room, and report the window
    ///
    /// Only admitted hits are recorded. A rejected hit leaves the window
    /// untouched, so a caller that keeps sending while over quota is admitted
    /// again one window after its oldest admitted hit.
    async fn check_and_record(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError>;

    /// Forget keys whose every hit has left the window. Returns keys removed.
    async fn purge_idle(
        &self,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<u64, RateLimitError>;
}

/// In-process store: one timestamp queue per key, mutated under its shard lock
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    windows: DashMap<String, VecDeque<i64>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    async fn check_and_record(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        let floor = config.window_floor_ms(now_ms);
        let mut window = self.windows.entry(key.to_string()).or_default();

        while window.front().is_some_and(|&ts| ts <= floor) {
            window.pop_front();
        }

        let allowed = window.len() < config.max_requests as usize;
        if allowed {
            window.push_back(now_ms);
        }

        let count = u32::try_from(window.len()).unwrap_or(u32::MAX);
        Ok(RateLimitResult::from_window(
            allowed,
            count,
            window.front().copied(),
            config,
        ))
    }

    async fn purge_idle(
        &self,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<u64, RateLimitError> {
        let floor = config.window_floor_ms(now_ms);
        let before = self.windows.len();
        self.windows
            .retain(|_, window| window.back().is_some_and(|&ts| ts > floor));
        Ok(before.saturating_sub(self.windows.len()) as u64)
    }
}
