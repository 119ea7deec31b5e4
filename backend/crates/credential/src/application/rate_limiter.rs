//! Client Rate Limiter
//!
//! Per-caller sliding window, evaluated before any identity is touched.
//! If the backing store cannot be reached the request is let through and
//! the outage is logged.

use crate::error::{CredentialError, CredentialResult};
use platform::clock::Clock;
use platform::rate_limit::{RateLimitConfig, RateLimitStore};
use std::sync::Arc;

pub struct ClientRateLimiter<S>
where
    S: RateLimitStore,
{
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

impl<S> Clone for ClientRateLimiter<S>
where
    S: RateLimitStore,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S> ClientRateLimiter<S>
where
    S: RateLimitStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Admit one request from `client_key`, or fail with `QuotaExceeded`
    pub async fn check(&self, client_key: &str) -> CredentialResult<()> {
        let now_ms = self.clock.now_ms();
        let key = format!("ratelimit:{client_key}");

        match self.store.check_and_record(&key, &self.config, now_ms).await {
            Ok(result) if result.allowed => Ok(()),
            Ok(result) => {
                tracing::warn!(
                    client = %client_key,
                    count = result.count,
                    max = self.config.max_requests,
                    "Client rate limit exceeded"
                );
                Err(CredentialError::QuotaExceeded {
                    retry_after_ms: result.retry_after_ms(now_ms),
                })
            }
            Err(e) => {
                tracing::error!(
                    client = %client_key,
                    error = %e,
                    "Rate limit store unavailable, allowing request"
                );
                Ok(())
            }
        }
    }

    pub async fn is_allowed(&self, client_key: &str) -> bool {
        self.check(client_key).await.is_ok()
    }

    /// Forget callers idle for longer than the window
    pub async fn purge_idle(&self) -> CredentialResult<u64> {
        Ok(self
            .store
            .purge_idle(&self.config, self.clock.now_ms())
            .await?)
    }
}
