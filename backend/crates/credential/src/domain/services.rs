//! Domain Services - Pure scheduling math
//!
//! Cooldown lengths, selection scores and retry delays. No I/O here.

use crate::domain::entities::HealthRecord;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

/// Exponential suspension schedule: `min(base * 2^(count-1), cap)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl CooldownPolicy {
    /// 30 minutes doubling per challenge, capped at 12 hours
    pub const CHALLENGE: Self = Self {
        base: Duration::from_secs(30 * 60),
        cap: Duration::from_secs(720 * 60),
    };

    /// 15 minutes doubling per rate-limit signal, capped at 6 hours
    pub const RATE_LIMIT: Self = Self {
        base: Duration::from_secs(15 * 60),
        cap: Duration::from_secs(360 * 60),
    };

    /// Suspension after the `count`-th signal. A count of 0 is treated as 1.
    pub fn duration_for(&self, count: u64) -> Duration {
        let exponent = count.max(1) - 1;
        let multiplier = u32::try_from(exponent)
            .ok()
            .and_then(|e| 1u32.checked_shl(e))
            .unwrap_or(u32::MAX);
        self.base.saturating_mul(multiplier).min(self.cap)
    }

    /// Same as [`Self::duration_for`], in whole minutes
    pub fn minutes_for(&self, count: u64) -> u64 {
        self.duration_for(count).as_secs() / MINUTE.as_secs()
    }
}

/// Weights for [`score`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    /// Penalty per challenge, relative to one success
    pub challenge_weight: f64,
    /// Minimum rest before the rest bonus starts
    pub rest_threshold: Duration,
    /// Upper bound of the rest bonus
    pub max_rest_bonus: f64,
    /// Bonus for an identity with its whole hourly budget left
    pub capacity_weight: f64,
    /// Identities with fewer observations never score below zero
    pub min_observations: u64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            challenge_weight: 2.0,
            rest_threshold: Duration::from_secs(5 * 60),
            max_rest_bonus: 10.0,
            capacity_weight: 5.0,
            min_observations: 5,
        }
    }
}

/// Bonus for time since last use
///
/// Zero below `rest_threshold`, then one point per threshold interval rested,
/// capped at `max_rest_bonus`. A never-used identity gets the full bonus.
pub fn rest_bonus(last_used_at_ms: Option<i64>, now_ms: i64, weights: &ScoreWeights) -> f64 {
    let Some(last_used) = last_used_at_ms else {
        return weights.max_rest_bonus;
    };
    let rested_ms = now_ms.saturating_sub(last_used).max(0) as f64;
    let threshold_ms = weights.rest_threshold.as_millis() as f64;
    if threshold_ms <= 0.0 {
        return weights.max_rest_bonus;
    }
    if rested_ms < threshold_ms {
        return 0.0;
    }
    (rested_ms / threshold_ms).floor().min(weights.max_rest_bonus)
}

/// Bonus proportional to the unused share of the hourly cap
pub fn capacity_bonus(used_in_window: u32, hourly_cap: u32, weights: &ScoreWeights) -> f64 {
    if hourly_cap == 0 {
        return 0.0;
    }
    let remaining = hourly_cap.saturating_sub(used_in_window) as f64;
    remaining / hourly_cap as f64 * weights.capacity_weight
}

/// Selection score: `successes - 2*challenges + rest bonus + capacity bonus`
pub fn score(
    health: &HealthRecord,
    used_in_window: u32,
    hourly_cap: u32,
    now_ms: i64,
    weights: &ScoreWeights,
) -> f64 {
    let track_record =
        health.successes as f64 - weights.challenge_weight * health.challenges as f64;
    let total = track_record
        + rest_bonus(health.last_used_at_ms, now_ms, weights)
        + capacity_bonus(used_in_window, hourly_cap, weights);

    if health.observations() < weights.min_observations {
        total.max(0.0)
    } else {
        total
    }
}

/// Delay before retry number `attempt + 1`: `base * 2^attempt + jitter`
pub fn backoff_delay(base: Duration, attempt: u32, jitter: Duration) -> Duration {
    let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(multiplier).saturating_add(jitter)
}
