//! Per-client rate limiting for the unauthenticated write endpoints.
//!
//! Login and the contact form are the only routes a stranger can hit with a
//! request body, so each gets its own bucket per client IP. Buckets refill
//! gradually within the window and reset fully once the window has passed.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RateLimitConfig;
use crate::AppState;

use super::error::{ApiError, ErrorCode};

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// Admin login attempts
    Auth,
    /// Contact form submissions
    Contact,
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    tokens: u32,
    window_start: Instant,
    last_request: Instant,
}

impl RateLimitEntry {
    fn new(max_tokens: u32, now: Instant) -> Self {
        Self {
            tokens: max_tokens,
            window_start: now,
            last_request: now,
        }
    }
}

/// Thread-safe rate limiter using dashmap
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<(IpAddr, RateLimitTier), RateLimitEntry>,
    config: RateLimitConfig,
    window_duration: Duration,
}

/// Rate limit status after an allowed request
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub limit: u32,
    /// Seconds until the window resets
    pub reset_after: u64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            window_duration: Duration::from_secs(config.window_seconds),
            config,
        }
    }

    /// Consume a token if one is left. `Err` carries the retry-after seconds.
    pub fn check_rate_limit(&self, ip: IpAddr, tier: RateLimitTier) -> Result<RateLimitInfo, u64> {
        self.check_at(ip, tier, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, tier: RateLimitTier, now: Instant) -> Result<RateLimitInfo, u64> {
        if !self.config.enabled {
            return Ok(RateLimitInfo {
                remaining: u32::MAX,
                limit: u32::MAX,
                reset_after: 0,
            });
        }

        let max_tokens = self.max_tokens(tier);
        let mut entry = self
            .entries
            .entry((ip, tier))
            .or_insert_with(|| RateLimitEntry::new(max_tokens, now));

        let mut elapsed = now.saturating_duration_since(entry.window_start);
        if elapsed >= self.window_duration {
            entry.tokens = max_tokens;
            entry.window_start = now;
            elapsed = Duration::ZERO;
        } else {
            // Sliding refill proportional to the time since the last request
            let since_last = now.saturating_duration_since(entry.last_request);
            let replenish_rate = max_tokens as f64 / self.window_duration.as_secs_f64();
            let replenished = (since_last.as_secs_f64() * replenish_rate) as u32;
            entry.tokens = entry.tokens.saturating_add(replenished).min(max_tokens);
        }
        entry.last_request = now;

        let reset_after = self.window_duration.saturating_sub(elapsed).as_secs();
        if entry.tokens > 0 {
            entry.tokens -= 1;
            Ok(RateLimitInfo {
                remaining: entry.tokens,
                limit: max_tokens,
                reset_after,
            })
        } else {
            Err(reset_after.max(1))
        }
    }

    pub fn max_tokens(&self, tier: RateLimitTier) -> u32 {
        match tier {
            RateLimitTier::Auth => self.config.auth_requests_per_window,
            RateLimitTier::Contact => self.config.contact_requests_per_window,
        }
    }

    /// Drop entries idle for two full windows
    pub fn cleanup_expired(&self) {
        self.cleanup_expired_at(Instant::now());
    }

    fn cleanup_expired_at(&self, now: Instant) {
        let expiry = self.window_duration * 2;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.window_start) < expiry);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn trusts_proxy_headers(&self) -> bool {
        self.config.trust_proxy_headers
    }
}

/// Client address. Forwarding headers are client-controlled, so they are
/// only consulted when a trusted proxy sets them; otherwise the socket peer.
fn extract_client_ip(request: &Request<Body>, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(request) {
            return ip;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// First X-Forwarded-For hop, then X-Real-IP
fn forwarded_ip(request: &Request<Body>) -> Option<IpAddr> {
    let headers = request.headers();

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<IpAddr>().ok())
        })
}

pub async fn rate_limit_auth(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    rate_limit_with_tier(state, request, next, RateLimitTier::Auth).await
}

pub async fn rate_limit_contact(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    rate_limit_with_tier(state, request, next, RateLimitTier::Contact).await
}

async fn rate_limit_with_tier(
    state: Arc<AppState>,
    request: Request<Body>,
    next: Next,
    tier: RateLimitTier,
) -> Response {
    let ip = extract_client_ip(&request, state.rate_limiter.trusts_proxy_headers());

    match state.rate_limiter.check_rate_limit(ip, tier) {
        Ok(info) => {
            let mut response = next.run(request).await;
            if info.limit != u32::MAX {
                let headers = response.headers_mut();
                headers.insert(LIMIT_HEADER, HeaderValue::from(info.limit));
                headers.insert(REMAINING_HEADER, HeaderValue::from(info.remaining));
                headers.insert(RESET_HEADER, HeaderValue::from(info.reset_after));
            }
            response
        }
        Err(retry_after) => {
            tracing::warn!(client = %ip, tier = ?tier, "Rate limit exceeded");
            let mut response = ApiError::new(
                ErrorCode::TooManyRequests,
                format!("Rate limit exceeded. Try again in {} seconds.", retry_after),
            )
            .into_response();
            let headers = response.headers_mut();
            headers.insert(
                axum::http::header::RETRY_AFTER,
                HeaderValue::from(retry_after),
            );
            headers.insert(
                LIMIT_HEADER,
                HeaderValue::from(state.rate_limiter.max_tokens(tier)),
            );
            headers.insert(REMAINING_HEADER, HeaderValue::from(0u32));
            headers.insert(RESET_HEADER, HeaderValue::from(retry_after));
            response
        }
    }
}

/// Periodically evict stale entries until `shutdown` fires
pub fn spawn_cleanup_task(
    rate_limiter: Arc<RateLimiter>,
    cleanup_interval_secs: u64,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cleanup_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    rate_limiter.cleanup_expired();
                    tracing::debug!(
                        "Rate limiter cleanup complete, {} entries remaining",
                        rate_limiter.entry_count()
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            auth_requests_per_window: 5,
            contact_requests_per_window: 3,
            window_seconds: 60,
            cleanup_interval: 300,
            trust_proxy_headers: false,
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_blocks_after_limit() {
        let limiter = RateLimiter::new(test_config());
        let now = Instant::now();
        let client = ip("192.168.1.1");

        for i in 0..5 {
            assert!(
                limiter.check_at(client, RateLimitTier::Auth, now).is_ok(),
                "Request {} should be allowed",
                i
            );
        }
        let retry_after = limiter
            .check_at(client, RateLimitTier::Auth, now)
            .unwrap_err();
        assert_eq!(retry_after, 60);
    }

    #[test]
    fn test_different_ips_have_separate_limits() {
        let limiter = RateLimiter::new(test_config());
        let now = Instant::now();

        for _ in 0..3 {
            let _ = limiter.check_at(ip("10.0.0.1"), RateLimitTier::Contact, now);
        }
        assert!(limiter.check_at(ip("10.0.0.1"), RateLimitTier::Contact, now).is_err());
        assert!(limiter.check_at(ip("10.0.0.2"), RateLimitTier::Contact, now).is_ok());
    }

    #[test]
    fn test_tiers_are_independent() {
        let limiter = RateLimiter::new(test_config());
        let now = Instant::now();
        let client = ip("192.168.1.1");

        for _ in 0..3 {
            let _ = limiter.check_at(client, RateLimitTier::Contact, now);
        }
        assert!(limiter.check_at(client, RateLimitTier::Contact, now).is_err());
        assert!(limiter.check_at(client, RateLimitTier::Auth, now).is_ok());
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(test_config());
        let now = Instant::now();
        let client = ip("192.168.1.1");

        for _ in 0..5 {
            let _ = limiter.check_at(client, RateLimitTier::Auth, now);
        }
        assert!(limiter.check_at(client, RateLimitTier::Auth, now).is_err());

        let later = now + Duration::from_secs(61);
        let info = limiter.check_at(client, RateLimitTier::Auth, later).unwrap();
        assert_eq!(info.remaining, 4);
    }

    #[test]
    fn test_disabled_rate_limiting() {
        let mut config = test_config();
        config.enabled = false;
        let limiter = RateLimiter::new(config);

        for _ in 0..100 {
            assert!(limiter
                .check_rate_limit(ip("192.168.1.1"), RateLimitTier::Auth)
                .is_ok());
        }
        assert_eq!(limiter.entry_count(), 0);
    }

    #[test]
    fn test_cleanup_expired() {
        let limiter = RateLimiter::new(test_config());
        let now = Instant::now();
        let _ = limiter.check_at(ip("192.168.1.1"), RateLimitTier::Auth, now);
        assert_eq!(limiter.entry_count(), 1);

        limiter.cleanup_expired_at(now + Duration::from_secs(30));
        assert_eq!(limiter.entry_count(), 1);

        limiter.cleanup_expired_at(now + Duration::from_secs(121));
        assert_eq!(limiter.entry_count(), 0);
    }

    fn request_from(peer: &str, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::new(ip(peer), 40000)));
        request
    }

    #[test]
    fn test_client_ip_ignores_forwarding_headers_by_default() {
        let request = request_from("192.0.2.10", &[("x-forwarded-for", "203.0.113.7")]);
        assert_eq!(extract_client_ip(&request, false), ip("192.0.2.10"));

        let request = request_from("192.0.2.10", &[("x-real-ip", "198.51.100.2")]);
        assert_eq!(extract_client_ip(&request, false), ip("192.0.2.10"));

        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&request, false), ip("127.0.0.1"));
    }

    #[test]
    fn test_client_ip_uses_forwarding_headers_behind_trusted_proxy() {
        let request = request_from("10.0.0.1", &[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(extract_client_ip(&request, true), ip("203.0.113.7"));

        let request = request_from("10.0.0.1", &[("x-real-ip", "198.51.100.2")]);
        assert_eq!(extract_client_ip(&request, true), ip("198.51.100.2"));

        let request = request_from("10.0.0.1", &[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(extract_client_ip(&request, true), ip("10.0.0.1"));
    }
}
