//! Sliding-window rate limiting per operation (optionally per caller).
//!
//! Each key keeps the admission times of its recent calls. A call is admitted
//! when fewer than `limit` admissions fall inside the trailing window;
//! eviction, the check, and the append happen under a single lock scope that
//! is never held across an await point.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};

pub const HEAVY_OPERATIONS: &[&str] = &["compare_companies"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub window_seconds: u64,
}

impl RateLimit {
    #[must_use]
    pub const fn new(limit: u32, window_seconds: u64) -> Self {
        Self {
            limit,
            window_seconds,
        }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub default: RateLimit,
    pub overrides: HashMap<String, RateLimit>,
    pub per_caller: bool,
    /// Keys idle for longer than this are dropped by [`RateLimiter::sweep`].
    /// Defaults to three times the largest configured window.
    pub stale_after: Option<Duration>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(RateLimit::new(60, 60)).with_heavy(RateLimit::new(30, 60))
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn new(default: RateLimit) -> Self {
        Self {
            enabled: true,
            default,
            overrides: HashMap::new(),
            per_caller: false,
            stale_after: None,
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_override(mut self, operation: impl Into<String>, limit: RateLimit) -> Self {
        self.overrides.insert(operation.into(), limit);
        self
    }

    /// Applies `limit` to every operation in [`HEAVY_OPERATIONS`].
    #[must_use]
    pub fn with_heavy(self, limit: RateLimit) -> Self {
        HEAVY_OPERATIONS
            .iter()
            .fold(self, |config, operation| config.with_override(*operation, limit))
    }

    #[must_use]
    pub const fn with_per_caller(mut self, per_caller: bool) -> Self {
        self.per_caller = per_caller;
        self
    }

    #[must_use]
    pub const fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = Some(stale_after);
        self
    }

    #[must_use]
    pub fn limit_for(&self, operation: &str) -> RateLimit {
        self.overrides
            .get(operation)
            .copied()
            .unwrap_or(self.default)
    }

    fn stale_after(&self) -> Duration {
        self.stale_after.unwrap_or_else(|| {
            let largest = self
                .overrides
                .values()
                .map(RateLimit::window)
                .fold(self.default.window(), Duration::max);
            largest * 3
        })
    }
}

/// Monotonic time source.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, VecDeque<Duration>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::default()))
    }

    #[must_use]
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                config,
                clock,
                windows: Mutex::new(HashMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.inner.config
    }

    /// Admits or rejects one call of `operation` by `caller`.
    ///
    /// # Errors
    /// Returns `CoreError::RateLimited` with the number of seconds until the
    /// oldest admission in the window expires.
    pub fn check(&self, operation: &str, caller: &str) -> CoreResult<()> {
        let config = &self.inner.config;
        if !config.enabled {
            return Ok(());
        }
        let rate = config.limit_for(operation);
        let window = rate.window();
        let key = self.key(operation, caller);
        let now = self.inner.clock.now();

        let mut windows = self
            .inner
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let admitted = windows.entry(key).or_default();
        while admitted
            .front()
            .is_some_and(|oldest| now.saturating_sub(*oldest) > window)
        {
            admitted.pop_front();
        }
        if admitted.len() < rate.limit as usize {
            admitted.push_back(now);
            return Ok(());
        }

        let oldest = admitted.front().copied().unwrap_or(now);
        let remaining = window.saturating_sub(now.saturating_sub(oldest));
        let retry_after_seconds = ceil_seconds(remaining).max(1);
        drop(windows);
        warn!(
            operation,
            caller,
            limit = rate.limit,
            retry_after_seconds,
            "rate limit exceeded"
        );
        Err(CoreError::RateLimited {
            operation: operation.to_string(),
            retry_after_seconds,
        })
    }

    /// Clears the window of one key, or every window when `key` is `None`.
    pub fn reset(&self, key: Option<&str>) {
        let mut windows = self
            .inner
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match key {
            Some(key) => {
                windows.remove(key);
            }
            None => windows.clear(),
        }
    }

    /// Drops keys with no admission newer than the stale threshold and
    /// returns how many were removed.
    pub fn sweep(&self) -> usize {
        let stale_after = self.inner.config.stale_after();
        let now = self.inner.clock.now();
        let mut windows = self
            .inner
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, admitted| {
            admitted
                .back()
                .is_some_and(|newest| now.saturating_sub(*newest) < stale_after)
        });
        let removed = before.saturating_sub(windows.len());
        if removed > 0 {
            debug!(removed, remaining = windows.len(), "swept idle rate-limit windows");
        }
        removed
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.inner
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Runs [`Self::sweep`] every `interval` on the current runtime.
    pub fn spawn_sweeper(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let _ = self.sweep();
            }
        })
    }

    fn key(&self, operation: &str, caller: &str) -> String {
        if self.inner.config.per_caller {
            format!("{operation}:{caller}")
        } else {
            operation.to_string()
        }
    }
}

fn ceil_seconds(duration: Duration) -> u64 {
    let whole = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        whole + 1
    } else {
        whole
    }
}
