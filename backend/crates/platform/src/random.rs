//! Random Source
//!
//! Selection and backoff jitter draw from this trait so tests can pin the
//! outcome.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

pub trait RandomSource: Send + Sync + fmt::Debug {
    /// Uniform index in `0..upper`. `upper` must be non-zero.
    fn index_below(&self, upper: usize) -> usize;

    /// Uniform value in the inclusive range
    fn in_range(&self, range: RangeInclusive<u64>) -> u64;
}

impl<R: RandomSource + ?Sized> RandomSource for Arc<R> {
    fn index_below(&self, upper: usize) -> usize {
        (**self).index_below(upper)
    }

    fn in_range(&self, range: RangeInclusive<u64>) -> u64 {
        (**self).in_range(range)
    }
}

/// Thread-local RNG from `rand`
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn index_below(&self, upper: usize) -> usize {
        rand::rng().random_range(0..upper.max(1))
    }

    fn in_range(&self, range: RangeInclusive<u64>) -> u64 {
        if range.is_empty() {
            return *range.start();
        }
        rand::rng().random_range(range)
    }
}

/// Replays a fixed script of draws
///
/// Each draw pops the next scripted value and clamps it into the requested
/// bounds. Once the script runs out every draw returns the lowest value.
#[derive(Debug, Default)]
pub struct ScriptedRandom {
    script: Mutex<VecDeque<u64>>,
}

impl ScriptedRandom {
    pub fn new(script: impl IntoIterator<Item = u64>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }

    /// Always returns the lowest possible value
    pub fn lowest() -> Self {
        Self::default()
    }

    pub fn push(&self, value: u64) {
        self.script.lock().push_back(value);
    }

    fn next(&self) -> u64 {
        self.script.lock().pop_front().unwrap_or(0)
    }
}

impl RandomSource for ScriptedRandom {
    fn index_below(&self, upper: usize) -> usize {
        let value = usize::try_from(self.next()).unwrap_or(usize::MAX);
        value.min(upper.saturating_sub(1))
    }

    fn in_range(&self, range: RangeInclusive<u64>) -> u64 {
        let (low, high) = (*range.start(), *range.end());
        self.next().clamp(low, high.max(low))
    }
}
