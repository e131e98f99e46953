//! Per-client rate limiting middleware

use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, sync::Arc, time::Instant};
use tokio::sync::Mutex;

/// Burst allowance relative to the steady-state rate
const BURST_FACTOR: f64 = 2.0;

/// Token bucket tracked per client key
#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refreshed: Instant,
}

/// Token-bucket rate limiter keyed by client IP
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_second` sustained, with a
    /// burst of twice that
    pub fn new(requests_per_second: u32) -> Self {
        let rate = requests_per_second as f64;
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate,
            capacity: rate * BURST_FACTOR,
        }
    }

    /// Record one request for `key`; returns false when over budget
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            refreshed: now,
        });

        let elapsed = now.duration_since(bucket.refreshed).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.capacity);
        bucket.refreshed = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets idle for longer than `max_age`
    pub async fn cleanup(&self, max_age: std::time::Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        buckets.retain(|_, b| now.duration_since(b.refreshed) < max_age);
    }
}

/// Create the rate limiting middleware layer
pub fn rate_limit_layer(
    rate_limiter: RateLimiter,
) -> impl Fn(
    Request<Body>,
    Next,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>>
       + Clone
       + Send {
    move |request: Request<Body>, next: Next| {
        let rate_limiter = rate_limiter.clone();
        Box::pin(async move {
            let client_key = client_ip(&request);

            if !rate_limiter.check(&client_key).await {
                tracing::warn!(client = %client_key, "Rate limit exceeded");
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, "1")],
                    "Too many requests. Please try again later.",
                )
                    .into_response();
            }

            next.run(request).await
        })
    }
}

/// Best-effort client IP from proxy headers
fn client_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_then_deny() {
        let limiter = RateLimiter::new(5);

        // Burst capacity is 2x the sustained rate
        for _ in 0..10 {
            assert!(limiter.check("client").await);
        }
        assert!(!limiter.check("client").await);
    }

    #[tokio::test]
    async fn buckets_are_per_client() {
        let limiter = RateLimiter::new(1);

        assert!(limiter.check("a").await);
        assert!(limiter.check("b").await);
        assert!(limiter.check("a").await);
        assert!(limiter.check("b").await);
        assert!(!limiter.check("a").await);
    }

    #[tokio::test]
    async fn cleanup_drops_idle_buckets() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.check("stale").await);

        limiter.cleanup(std::time::Duration::from_secs(0)).await;
        assert!(limiter.buckets.lock().await.is_empty());
    }
}
