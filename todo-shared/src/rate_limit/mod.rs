/// Fixed-window request ceilings
///
/// A [`RateLimit`] is "N requests per window". The [`RateLimiter`] counts hits
/// per key in a [`CounterStore`] and decides on the post-increment count, so
/// the `N + 1`th request inside one window is the first one rejected.
///
/// # Stores
///
/// - [`MemoryCounterStore`]: process-local, the default
/// - [`RedisCounterStore`]: shared by every process pointing at the same Redis
///
/// # Example
///
/// ```no_run
/// use todo_shared::rate_limit::{RateLimit, RateLimiter, RateLimitDecision};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = RateLimiter::in_memory();
/// let limit: RateLimit = "40/day".parse()?;
///
/// match limiter.check("users:203.0.113.7", &limit).await? {
///     RateLimitDecision::Allowed { remaining, .. } => println!("{} left", remaining),
///     RateLimitDecision::Exceeded { retry_after } => println!("wait {:?}", retry_after),
/// }
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Error type for rate limiting
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Limit string could not be parsed
    #[error("Invalid rate limit '{0}'")]
    InvalidLimit(String),

    /// Counter store unavailable or misbehaving
    #[error("Counter store error: {0}")]
    Store(String),
}

impl From<::redis::RedisError> for RateLimitError {
    fn from(err: ::redis::RedisError) -> Self {
        RateLimitError::Store(err.to_string())
    }
}

/// A request ceiling: at most `max_requests` per `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u64,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn per_second(max_requests: u64) -> Self {
        Self::new(max_requests, Duration::from_secs(1))
    }

    pub fn per_minute(max_requests: u64) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    pub fn per_hour(max_requests: u64) -> Self {
        Self::new(max_requests, Duration::from_secs(60 * 60))
    }

    pub fn per_day(max_requests: u64) -> Self {
        Self::new(max_requests, Duration::from_secs(24 * 60 * 60))
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.window.as_secs();
        match secs {
            86_400 => write!(f, "{}/day", self.max_requests),
            3_600 => write!(f, "{}/hour", self.max_requests),
            60 => write!(f, "{}/minute", self.max_requests),
            1 => write!(f, "{}/second", self.max_requests),
            _ => write!(f, "{}/{} seconds", self.max_requests, secs),
        }
    }
}

/// Parses `"40/day"`, `"100/hour"`, `"10 per minute"`, `"5/second"`,
/// and multiples such as `"10/5 minutes"`.
impl FromStr for RateLimit {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RateLimitError::InvalidLimit(s.to_string());
        let lower = s.trim().to_ascii_lowercase();

        let (count, period) = lower
            .split_once('/')
            .or_else(|| lower.split_once(" per "))
            .ok_or_else(invalid)?;

        let max_requests: u64 = count.trim().parse().map_err(|_| invalid())?;

        let mut parts = period.split_whitespace();
        let first = parts.next().ok_or_else(invalid)?;
        let (multiplier, unit) = match first.parse::<u64>() {
            Ok(n) => (n, parts.next().ok_or_else(invalid)?),
            Err(_) => (1, first),
        };
        if parts.next().is_some() || multiplier == 0 {
            return Err(invalid());
        }

        let unit_secs = match unit.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 60 * 60,
            "day" => 24 * 60 * 60,
            _ => return Err(invalid()),
        };

        Ok(Self::new(max_requests, Duration::from_secs(unit_secs * multiplier)))
    }
}

impl Serialize for RateLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RateLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Result of counting one hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Hits in the current window, including this one
    pub count: u64,

    /// Time until the current window ends
    pub reset_after: Duration,
}

/// Storage for per-key hit counters
///
/// `hit` must be atomic per key: concurrent callers never observe the same
/// post-increment count.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn hit(&self, key: &str, window: Duration) -> Result<Hit, RateLimitError>;

    /// Short name for logs and health output
    fn kind(&self) -> &'static str;
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u64, reset_after: Duration },
    Exceeded { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Checks keys against ceilings using a shared counter store
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("store", &self.store.kind())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Limiter backed by a fresh [`MemoryCounterStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCounterStore::new()))
    }

    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }

    /// Counts one hit for `key` and decides whether it fits under `limit`
    pub async fn check(&self, key: &str, limit: &RateLimit) -> Result<RateLimitDecision, RateLimitError> {
        let hit = self.store.hit(key, limit.window).await?;

        if hit.count > limit.max_requests {
            warn!(
                key = %key,
                limit = %limit,
                retry_after_secs = hit.reset_after.as_secs(),
                "Rate limit exceeded"
            );
            return Ok(RateLimitDecision::Exceeded {
                retry_after: hit.reset_after,
            });
        }

        Ok(RateLimitDecision::Allowed {
            remaining: limit.max_requests - hit.count,
            reset_after: hit.reset_after,
        })
    }
}
