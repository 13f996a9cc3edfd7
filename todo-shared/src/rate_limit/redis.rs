/// Redis-backed counter store
///
/// Lets several API processes share one set of ceilings. Each hit runs a Lua
/// script so the increment and the expiry are applied atomically:
///
/// ```lua
/// local count = redis.call('INCR', KEYS[1])
/// if count == 1 then
///     redis.call('PEXPIRE', KEYS[1], ARGV[1])
/// end
/// local ttl = redis.call('PTTL', KEYS[1])
/// if ttl < 0 then
///     redis.call('PEXPIRE', KEYS[1], ARGV[1])
///     ttl = tonumber(ARGV[1])
/// end
/// return {count, ttl}
/// ```
///
/// # Keys
///
/// `ratelimit:{key}`, expiring with the window.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use todo_shared::rate_limit::{RateLimiter, RedisCounterStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RedisCounterStore::connect("redis://localhost:6379").await?;
/// let limiter = RateLimiter::new(Arc::new(store));
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::sync::Arc;
use std::time::Duration;

use super::{CounterStore, Hit, RateLimitError};

const KEY_PREFIX: &str = "ratelimit:";

const HIT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

/// Fixed-window counters stored in Redis
#[derive(Clone)]
pub struct RedisCounterStore {
    manager: ConnectionManager,
    script: Arc<Script>,
}

impl RedisCounterStore {
    /// Connects to Redis
    ///
    /// The connection manager reconnects on its own after failures.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::Store` if the URL is invalid or the first
    /// connection fails.
    pub async fn connect(url: &str) -> Result<Self, RateLimitError> {
        let client = Client::open(url)
            .map_err(|e| RateLimitError::Store(format!("Invalid Redis URL: {}", e)))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| RateLimitError::Store(format!("Failed to connect to Redis: {}", e)))?;

        tracing::info!("Rate limit counters stored in Redis at {}", sanitize_url(url));

        Ok(Self {
            manager,
            script: Arc::new(Script::new(HIT_SCRIPT)),
        })
    }

    /// Sends PING; true on PONG
    pub async fn ping(&self) -> Result<bool, RateLimitError> {
        let mut conn = self.manager.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<Hit, RateLimitError> {
        let mut conn = self.manager.clone();
        let window_ms = window.as_millis().max(1) as u64;

        let (count, ttl_ms): (i64, i64) = self
            .script
            .key(format!("{}{}", KEY_PREFIX, key))
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %key, "Rate limit script failed");
                RateLimitError::from(e)
            })?;

        Ok(Hit {
            count: count.max(0) as u64,
            reset_after: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}

/// Replaces credentials in a Redis URL with `***:***` for logging
fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let host = &url[at_pos + 1..];
            return format!("{}***:***@{}", scheme, host);
        }
    }
    url.to_string()
}
