// src/rate_gate/mod.rs

//! Per-method token bucket + concurrency semaphore + retry controller
//! guarding every outbound call to the upstream messaging API.

mod bucket;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::Duration;
use tracing::warn;

use crate::error::{RateGateError, UpstreamError};

pub use bucket::TokenBucket;

/// Tuning for a single rate-gated method.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
    pub max_concurrent: usize,
    pub retry_max_attempts: u32,
    pub retry_base_delay: f64,
    pub retry_max_delay: f64,
    pub retry_jitter: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 50,
            burst_size: 10,
            max_concurrent: 5,
            retry_max_attempts: 3,
            retry_base_delay: 1.0,
            retry_max_delay: 60.0,
            retry_jitter: 0.5,
        }
    }
}

/// Per-method tier defaults for the upstream messaging API (§6).
pub fn tier_default(method: &str) -> RateLimitConfig {
    match method {
        "conversations.list" => RateLimitConfig {
            requests_per_minute: 20,
            burst_size: 5,
            ..Default::default()
        },
        "conversations.history" => RateLimitConfig {
            requests_per_minute: 50,
            burst_size: 10,
            ..Default::default()
        },
        "conversations.replies" => RateLimitConfig {
            requests_per_minute: 50,
            burst_size: 10,
            ..Default::default()
        },
        "users.info" => RateLimitConfig {
            requests_per_minute: 100,
            burst_size: 20,
            ..Default::default()
        },
        "users.list" => RateLimitConfig {
            requests_per_minute: 20,
            burst_size: 5,
            ..Default::default()
        },
        "search.messages" => RateLimitConfig {
            requests_per_minute: 20,
            burst_size: 5,
            ..Default::default()
        },
        "reminders.list" => RateLimitConfig {
            requests_per_minute: 20,
            burst_size: 5,
            ..Default::default()
        },
        "auth.test" => RateLimitConfig {
            requests_per_minute: 100,
            burst_size: 20,
            ..Default::default()
        },
        _ => RateLimitConfig::default(),
    }
}

struct MethodGate {
    bucket: TokenBucket,
    semaphore: Semaphore,
    config: RateLimitConfig,
}

/// Gates every outbound call to the upstream messaging API, one gate per
/// method name, lazily created from the §6 tier defaults.
pub struct RateGate {
    gates: RwLock<HashMap<String, Arc<MethodGate>>>,
}

impl RateGate {
    pub fn new() -> Self {
        Self {
            gates: RwLock::new(HashMap::new()),
        }
    }

    async fn gate_for(&self, method: &str) -> Arc<MethodGate> {
        if let Some(gate) = self.gates.read().await.get(method) {
            return gate.clone();
        }

        let mut gates = self.gates.write().await;
        if let Some(gate) = gates.get(method) {
            return gate.clone();
        }

        let config = tier_default(method);
        let gate = Arc::new(MethodGate {
            bucket: TokenBucket::new(config.requests_per_minute as f64 / 60.0, config.burst_size as f64),
            semaphore: Semaphore::new(config.max_concurrent),
            config,
        });
        gates.insert(method.to_string(), gate.clone());
        gate
    }

    /// Execute `fut_fn` under the gate for `method`, retrying on
    /// [`UpstreamError::RateLimited`] failures with backoff, honoring a
    /// server-supplied `Retry-After` hint when present.
    pub async fn execute<F, Fut, T>(&self, method: &str, mut fut_fn: F) -> Result<T, RateGateError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let gate = self.gate_for(method).await;
        let mut attempt: u32 = 0;

        loop {
            gate.bucket.acquire().await;

            let result = {
                let _permit = gate
                    .semaphore
                    .acquire()
                    .await
                    .expect("rate gate semaphore never closed");
                fut_fn().await
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limited() => {
                    attempt += 1;
                    if attempt >= gate.config.retry_max_attempts {
                        return Err(RateGateError::RateLimitExceeded { attempts: attempt });
                    }

                    let delay = err
                        .retry_after()
                        .unwrap_or_else(|| calculate_backoff(&gate.config, attempt));

                    warn!(
                        method,
                        attempt,
                        max_attempts = gate.config.retry_max_attempts,
                        delay_seconds = delay,
                        "rate limited, retrying"
                    );

                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
                Err(err) => return Err(RateGateError::Inner(err.into())),
            }
        }
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential backoff with jitter: `base * 2^attempt`, jittered by
/// `±jitter_factor`, capped at `max_delay`.
fn calculate_backoff(config: &RateLimitConfig, attempt: u32) -> f64 {
    let mut delay = config.retry_base_delay * 2f64.powi(attempt as i32);

    if config.retry_jitter > 0.0 {
        let jitter_range = delay * config.retry_jitter;
        let roll: f64 = rand::rng().random();
        delay = delay - jitter_range + (roll * jitter_range * 2.0);
    }

    delay.min(config.retry_max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_immediately_without_retry() {
        let gate = RateGate::new();
        let calls = AtomicU32::new(0);

        let result = gate
            .execute("users.info", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, UpstreamError>(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_on_rate_limited_then_succeeds() {
        let gate = RateGate::new();
        let calls = AtomicU32::new(0);

        let result = gate
            .execute("users.info", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(UpstreamError::RateLimited { retry_after: Some(0.01) })
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let gate = RateGate::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), RateGateError> = gate
            .execute("users.info", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError::RateLimited { retry_after: Some(0.01) }) }
            })
            .await;

        assert!(matches!(result, Err(RateGateError::RateLimitExceeded { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), tier_default("users.info").retry_max_attempts);
    }

    #[tokio::test]
    async fn non_rate_limited_error_is_not_retried() {
        let gate = RateGate::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), RateGateError> = gate
            .execute("users.info", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError::NotFound) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrency_is_capped_at_max_concurrent() {
        // "users.info" has burst=20/rpm=100, generous enough that 10
        // concurrent calls never touch the token bucket; only the
        // semaphore (max_concurrent=5, the default) should gate them.
        let gate = Arc::new(RateGate::new());
        let in_flight = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let gate = gate.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                gate.execute("users.info", || {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, UpstreamError>(())
                    }
                })
                .await
                .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= tier_default("users.info").max_concurrent as u32);
    }
}
