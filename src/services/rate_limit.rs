//! Fixed window limiter on claim attempts per address, applied in front of the cooldown gate.
//! Backed by Redis when it is configured, by an in-process map otherwise.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use failure::Error as FailureError;
use r2d2::Pool;
use r2d2_redis::redis;
use r2d2_redis::RedisConnectionManager;

pub const RATE_LIMIT_NAMESPACE: &str = "coupons:claim_attempts";

const PRUNE_THRESHOLD: usize = 1024;

pub trait RateLimiter: Send + Sync {
    /// Counts one attempt for `key`. Returns how long to wait if the key is over its quota.
    fn hit(&self, key: &str) -> Result<Option<Duration>, FailureError>;
}

/// Redis `INCR` + `EXPIRE` window, shared by every instance of the app
pub struct RedisRateLimiter {
    pool: Pool<RedisConnectionManager>,
    max_hits: u32,
    window: Duration,
}

impl RedisRateLimiter {
    pub fn new(pool: Pool<RedisConnectionManager>, max_hits: u32, window: Duration) -> Self {
        Self { pool, max_hits, window }
    }
}

impl RateLimiter for RedisRateLimiter {
    fn hit(&self, key: &str) -> Result<Option<Duration>, FailureError> {
        let conn = self.pool.get()?;
        let key = format!("{}:{}", RATE_LIMIT_NAMESPACE, key);

        let hits: u32 = redis::cmd("INCR").arg(&key).query(&*conn)?;
        if hits == 1 {
            redis::cmd("EXPIRE").arg(&key).arg(self.window.as_secs()).query::<()>(&*conn)?;
        }

        if hits <= self.max_hits {
            return Ok(None);
        }

        let ttl: i64 = redis::cmd("TTL").arg(&key).query(&*conn)?;
        if ttl > 0 {
            Ok(Some(Duration::from_secs(ttl as u64)))
        } else {
            // key lost its expiry, start the window over
            redis::cmd("EXPIRE").arg(&key).arg(self.window.as_secs()).query::<()>(&*conn)?;
            Ok(Some(self.window))
        }
    }
}

/// Per-process window, used when no Redis is configured
pub struct MemoryRateLimiter {
    max_hits: u32,
    window: Duration,
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

impl MemoryRateLimiter {
    pub fn new(max_hits: u32, window: Duration) -> Self {
        Self {
            max_hits,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for MemoryRateLimiter {
    fn hit(&self, key: &str) -> Result<Option<Duration>, FailureError> {
        let now = Instant::now();
        let window = self.window;
        let mut windows = self.windows.lock().map_err(|_| format_err!("Rate limiter state is poisoned"))?;

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, &mut (started, _)| now.duration_since(started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0) >= window {
            *entry = (now, 0);
        }
        entry.1 += 1;

        if entry.1 <= self.max_hits {
            Ok(None)
        } else {
            Ok(Some(window - now.duration_since(entry.0)))
        }
    }
}
