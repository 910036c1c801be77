//! Dual sliding-window rate limiter for exchange REST calls.
//!
//! Two budgets are enforced at once:
//!
//! - **Weight**: the sum of request weights over the trailing 60 seconds
//!   stays at or below `weight_limit_per_minute * buffer_pct`.
//! - **Count**: the number of requests over the trailing second stays at or
//!   below `request_limit_per_second`.
//!
//! # Example
//!
//! ```rust,ignore
//! use order_safety::resilience::{RateLimiter, RateLimitSettings};
//!
//! let limiter = RateLimiter::new(RateLimitSettings::new(1200, 10, 0.8))?;
//! limiter.acquire(1).await?;
//! exchange.submit_order(&request).await?;
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const WEIGHT_WINDOW: Duration = Duration::from_secs(60);
const COUNT_WINDOW: Duration = Duration::from_secs(1);

/// Rate limiter errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    /// Capacity did not free up within the configured timeout.
    #[error("rate limit acquire for weight {weight} timed out after {waited:?}")]
    Timeout {
        /// Requested weight.
        weight: u32,
        /// Time spent waiting before giving up.
        waited: Duration,
    },

    /// The caller cancelled the wait.
    #[error("rate limit acquire cancelled")]
    Cancelled,

    /// A single request is heavier than the whole window budget.
    #[error("request weight {weight} exceeds per-minute budget {budget}")]
    WeightExceedsBudget {
        /// Requested weight.
        weight: u32,
        /// Effective per-minute budget.
        budget: u32,
    },

    /// Settings cannot produce a usable limiter.
    #[error("invalid rate limit settings: {0}")]
    InvalidConfig(String),
}

/// Limiter settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitSettings {
    /// Exchange weight limit per minute.
    pub weight_limit_per_minute: u32,
    /// Exchange request count limit per second.
    pub request_limit_per_second: u32,
    /// Fraction of the weight limit this process may use (0, 1].
    pub buffer_pct: f64,
    /// Maximum time `acquire` may wait; `None` waits indefinitely.
    pub acquire_timeout: Option<Duration>,
}

impl RateLimitSettings {
    /// Settings without an acquire timeout.
    #[must_use]
    pub const fn new(weight_limit_per_minute: u32, request_limit_per_second: u32, buffer_pct: f64) -> Self {
        Self {
            weight_limit_per_minute,
            request_limit_per_second,
            buffer_pct,
            acquire_timeout: None,
        }
    }

    /// Set the acquire timeout.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Effective weight budget for the 60-second window.
    #[must_use]
    pub fn weight_budget(&self) -> u32 {
        (f64::from(self.weight_limit_per_minute) * self.buffer_pct).floor() as u32
    }

    fn validate(&self) -> Result<(), RateLimitError> {
        if self.weight_limit_per_minute == 0 {
            return Err(RateLimitError::InvalidConfig(
                "weight_limit_per_minute must be positive".to_string(),
            ));
        }
        if self.request_limit_per_second == 0 {
            return Err(RateLimitError::InvalidConfig(
                "request_limit_per_second must be positive".to_string(),
            ));
        }
        if !(self.buffer_pct > 0.0 && self.buffer_pct <= 1.0) {
            return Err(RateLimitError::InvalidConfig(format!(
                "buffer_pct must be in (0, 1], got {}",
                self.buffer_pct
            )));
        }
        if self.weight_budget() == 0 {
            return Err(RateLimitError::InvalidConfig(
                "weight_limit_per_minute * buffer_pct rounds to zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Snapshot of current window usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitUsage {
    /// Weight used in the trailing 60 seconds.
    pub used_weight: u32,
    /// Effective weight budget.
    pub weight_budget: u32,
    /// Requests in the trailing second.
    pub request_count: u32,
    /// Request count limit.
    pub request_limit: u32,
}

#[derive(Debug, Default)]
struct RateWindowState {
    weights: VecDeque<(Instant, u32)>,
    requests: VecDeque<Instant>,
    used_weight: u32,
    request_count: u32,
}

impl RateWindowState {
    fn prune(&mut self, now: Instant) {
        while let Some(&(at, weight)) = self.weights.front() {
            if now.duration_since(at) < WEIGHT_WINDOW {
                break;
            }
            self.weights.pop_front();
            self.used_weight -= weight;
        }

        while let Some(&at) = self.requests.front() {
            if now.duration_since(at) < COUNT_WINDOW {
                break;
            }
            self.requests.pop_front();
            self.request_count -= 1;
        }
    }

    /// Admit the request, or return how long until the oldest blocking entry expires.
    fn try_admit(&mut self, now: Instant, weight: u32, budget: u32, request_limit: u32) -> Result<(), Duration> {
        if self.used_weight + weight > budget {
            let wait = self
                .weights
                .front()
                .map_or(WEIGHT_WINDOW, |&(at, _)| (at + WEIGHT_WINDOW).saturating_duration_since(now));
            return Err(wait);
        }

        if self.request_count + 1 > request_limit {
            let wait = self
                .requests
                .front()
                .map_or(COUNT_WINDOW, |&at| (at + COUNT_WINDOW).saturating_duration_since(now));
            return Err(wait);
        }

        self.weights.push_back((now, weight));
        self.requests.push_back(now);
        self.used_weight += weight;
        self.request_count += 1;
        Ok(())
    }
}

/// Sliding-window limiter shared by every outbound call of one exchange account.
#[derive(Debug)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    weight_budget: u32,
    state: Mutex<RateWindowState>,
}

impl RateLimiter {
    /// Create a limiter; fails on unusable settings.
    pub fn new(settings: RateLimitSettings) -> Result<Self, RateLimitError> {
        settings.validate()?;
        let weight_budget = settings.weight_budget();
        Ok(Self {
            settings,
            weight_budget,
            state: Mutex::new(RateWindowState::default()),
        })
    }

    /// Limiter settings.
    #[must_use]
    pub const fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Wait for capacity and reserve `weight`.
    pub async fn acquire(&self, weight: u32) -> Result<(), RateLimitError> {
        self.acquire_cancellable(weight, &CancellationToken::new()).await
    }

    /// Wait for capacity and reserve `weight`, aborting when `cancel` fires.
    pub async fn acquire_cancellable(
        &self,
        weight: u32,
        cancel: &CancellationToken,
    ) -> Result<(), RateLimitError> {
        if weight > self.weight_budget {
            return Err(RateLimitError::WeightExceedsBudget {
                weight,
                budget: self.weight_budget,
            });
        }

        let started = Instant::now();
        let deadline = self.settings.acquire_timeout.map(|timeout| started + timeout);

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                state.prune(now);
                match state.try_admit(
                    now,
                    weight,
                    self.weight_budget,
                    self.settings.request_limit_per_second,
                ) {
                    Ok(()) => return Ok(()),
                    Err(wait) => wait,
                }
            };

            let wake = Instant::now() + wait;
            if let Some(deadline) = deadline {
                // Windows only drain with time; nothing frees up before `wake`
                if wake > deadline {
                    let waited = started.elapsed();
                    warn!(weight, waited_ms = waited.as_millis() as u64, "Rate limit acquire timed out");
                    return Err(RateLimitError::Timeout { weight, waited });
                }
            }

            debug!(weight, wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");

            tokio::select! {
                () = sleep(wait) => {}
                () = cancel.cancelled() => return Err(RateLimitError::Cancelled),
            }
        }
    }

    /// Current window usage.
    pub async fn usage(&self) -> RateLimitUsage {
        let mut state = self.state.lock().await;
        state.prune(Instant::now());
        RateLimitUsage {
            used_weight: state.used_weight,
            weight_budget: self.weight_budget,
            request_count: state.request_count,
            request_limit: self.settings.request_limit_per_second,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(weight: u32, rps: u32, buffer: f64) -> RateLimiter {
        RateLimiter::new(RateLimitSettings::new(weight, rps, buffer)).unwrap()
    }

    #[test]
    fn test_invalid_settings_rejected() {
        for settings in [
            RateLimitSettings::new(0, 10, 0.8),
            RateLimitSettings::new(1200, 0, 0.8),
            RateLimitSettings::new(1200, 10, 0.0),
            RateLimitSettings::new(1200, 10, 1.5),
            RateLimitSettings::new(1, 10, 0.5),
        ] {
            assert!(matches!(
                RateLimiter::new(settings),
                Err(RateLimitError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_weight_budget_applies_buffer() {
        assert_eq!(RateLimitSettings::new(1200, 10, 0.8).weight_budget(), 960);
        assert_eq!(RateLimitSettings::new(100, 10, 1.0).weight_budget(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_minute_weight_never_exceeds_budget() {
        // Budget 50 per minute; 12 requests of weight 10 need three windows
        let limiter = limiter(100, 1000, 0.5);
        let start = Instant::now();
        let mut admitted = Vec::new();

        for _ in 0..12 {
            limiter.acquire(10).await.unwrap();
            admitted.push(Instant::now());
        }

        for &t in &admitted {
            let in_window: u32 = admitted
                .iter()
                .filter(|&&a| a <= t && t.duration_since(a) < WEIGHT_WINDOW)
                .map(|_| 10)
                .sum();
            assert!(in_window <= 50, "window ending at {:?} held {in_window}", t - start);
        }

        assert_eq!(admitted[4] - start, Duration::ZERO);
        assert_eq!(admitted[5] - start, Duration::from_secs(60));
        assert_eq!(admitted[10] - start, Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_second_count_is_enforced() {
        let limiter = limiter(10_000, 2, 1.0);
        let start = Instant::now();
        let mut offsets = Vec::new();

        for _ in 0..5 {
            limiter.acquire(1).await.unwrap();
            offsets.push((Instant::now() - start).as_secs());
        }

        assert_eq!(offsets, vec![0, 0, 1, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_reports_and_expires() {
        let limiter = limiter(1200, 10, 0.8);
        limiter.acquire(5).await.unwrap();
        limiter.acquire(7).await.unwrap();

        let usage = limiter.usage().await;
        assert_eq!(usage.used_weight, 12);
        assert_eq!(usage.request_count, 2);
        assert_eq!(usage.weight_budget, 960);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(limiter.usage().await.request_count, 0);
        assert_eq!(limiter.usage().await.used_weight, 12);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(limiter.usage().await.used_weight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_request_fails_immediately() {
        let limiter = limiter(100, 10, 0.5);
        let err = limiter.acquire(51).await.unwrap_err();
        assert_eq!(err, RateLimitError::WeightExceedsBudget { weight: 51, budget: 50 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out_when_budget_exhausted() {
        let settings =
            RateLimitSettings::new(100, 10, 1.0).with_acquire_timeout(Duration::from_secs(5));
        let limiter = RateLimiter::new(settings).unwrap();
        limiter.acquire(100).await.unwrap();

        let err = limiter.acquire(1).await.unwrap_err();
        assert!(matches!(err, RateLimitError::Timeout { weight: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_within_timeout_succeeds() {
        let settings =
            RateLimitSettings::new(10_000, 1, 1.0).with_acquire_timeout(Duration::from_secs(5));
        let limiter = RateLimiter::new(settings).unwrap();
        limiter.acquire(1).await.unwrap();
        limiter.acquire(1).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_cancellable_aborts_on_cancel() {
        let limiter = Arc::new(limiter(100, 10, 1.0));
        limiter.acquire(100).await.unwrap();

        let token = CancellationToken::new();
        let waiter = {
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            tokio::spawn(async move { limiter.acquire_cancellable(1, &token).await })
        };

        sleep(Duration::from_secs(1)).await;
        token.cancel();

        assert_eq!(waiter.await.unwrap(), Err(RateLimitError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquirers_respect_budget() {
        let limiter = Arc::new(limiter(60, 1000, 1.0));
        let start = Instant::now();

        let tasks: Vec<_> = (0..9)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire(20).await.unwrap();
                    Instant::now()
                })
            })
            .collect();

        let mut times = Vec::new();
        for task in tasks {
            times.push(task.await.unwrap() - start);
        }
        times.sort();

        assert_eq!(times.iter().filter(|t| **t < WEIGHT_WINDOW).count(), 3);
        assert_eq!(times.iter().filter(|t| **t >= WEIGHT_WINDOW * 2).count(), 3);
    }
}
