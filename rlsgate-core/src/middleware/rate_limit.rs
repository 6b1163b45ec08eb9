//! In-memory sliding window rate limiting
//!
//! Two buckets guard a route: `<route key>:ip:<address>` before the session
//! is checked, and `<route key>:user:<id>` once the session is verified.
//! Unverified token claims never pick a bucket. A poisoned bucket map fails
//! open.

use super::client_ip::extract_client_ip;
use crate::config::RateLimitConfig;
use crate::domain::UserId;
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Bucket count above which empty buckets are swept
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Clone)]
pub struct RateLimiter {
    /// key -> request timestamps (epoch seconds)
    buckets: Arc<Mutex<HashMap<String, Vec<u64>>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Record one request for `route_key` from the address behind `headers`.
    /// Returns `false` when the address is over the limit.
    pub fn check_request(&self, route_key: &str, headers: &HeaderMap) -> bool {
        self.check_key(route_key, &client_identifier(headers))
    }

    /// Record one request for `route_key` by an authenticated user
    pub fn check_user(&self, route_key: &str, user_id: UserId) -> bool {
        self.check_key(route_key, &format!("user:{}", user_id))
    }

    fn check_key(&self, route_key: &str, identifier: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let key = format!("{}:{}", route_key, identifier);
        let allowed = self.check(&key, self.config.requests, self.config.window_secs);
        if !allowed {
            metrics::counter!("rlsgate_rate_limit_throttled_total", "key" => route_key.to_string())
                .increment(1);
            tracing::warn!(key = %key, "Rate limit exceeded");
        }
        allowed
    }

    /// Check and record a request against one bucket
    pub fn check(&self, key: &str, max_requests: u64, window_secs: u64) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.check_at(key, max_requests, window_secs, now)
    }

    fn check_at(&self, key: &str, max_requests: u64, window_secs: u64, now: u64) -> bool {
        let cutoff = now.saturating_sub(window_secs);

        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(key, "Rate limiter state poisoned, allowing request");
                return true;
            }
        };

        let timestamps = buckets.entry(key.to_string()).or_default();
        timestamps.retain(|&ts| ts > cutoff);

        if timestamps.len() as u64 >= max_requests {
            return false;
        }
        timestamps.push(now);

        if buckets.len() > SWEEP_THRESHOLD {
            buckets.retain(|_, v| {
                v.retain(|&ts| ts > cutoff);
                !v.is_empty()
            });
        }

        true
    }
}

/// `ip:<address>` of the caller behind `headers`
pub fn client_identifier(headers: &HeaderMap) -> String {
    format!("ip:{}", extract_client_ip(headers))
}
