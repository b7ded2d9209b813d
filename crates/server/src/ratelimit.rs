//! Rate limiting middleware using token bucket algorithm.
//!
//! Provides dual-layer rate limiting:
//! - Per-IP limiting for all requests (applied first)
//! - Per-user limiting for authenticated requests (applied after auth)
//!
//! # Memory Safety
//!
//! Tracked keys are bounded: a configurable maximum entry count, TTL
//! eviction of stale entries, and a background cleanup task.
//!
//! # Security Note
//!
//! X-Forwarded-For and X-Real-IP headers are NOT trusted by default, to
//! prevent IP spoofing. Configure `trusted_proxies` explicitly:
//!
//! - Empty list (default): only the direct connection IP is used
//! - List of IPs/CIDRs: headers trusted only from these addresses
//! - ["*"]: trust headers from all sources (NOT recommended for production)

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::{DashMap, mapref::entry::Entry};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
};
use ipnet::IpNet;
use pinboard_core::config::RateLimitConfig;
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// Type alias for the keyed rate limiter (per-IP or per-user).
type KeyedLimiter =
    RateLimiter<String, DashMap<String, InMemoryState>, DefaultClock, NoOpMiddleware>;

/// Rate limiter state shared across requests.
#[derive(Clone)]
pub struct RateLimitState {
    inner: Option<Arc<RateLimitStateInner>>,
}

/// Inner state that's only allocated when rate limiting is enabled.
struct RateLimitStateInner {
    /// Per-IP limiter. Wrapped in RwLock so cleanup can rebuild it;
    /// governor's internal DashMap does not support key removal.
    ip_limiter: RwLock<KeyedLimiter>,
    /// Per-user limiter, same rebuild caveat.
    user_limiter: RwLock<KeyedLimiter>,
    /// Last access timestamps for IP limiter entries (for eviction).
    ip_last_access: DashMap<String, Instant>,
    /// Last access timestamps for user limiter entries (for eviction).
    user_last_access: DashMap<String, Instant>,
    trusted_proxies: TrustedProxies,
    max_entries: u32,
    entry_ttl: Duration,
    /// Whether ConnectInfo missing warning has been logged.
    connect_info_warned: AtomicBool,
    /// At-capacity warnings fire once per capacity event to prevent
    /// log spam during floods.
    at_capacity_warned_ip: AtomicBool,
    at_capacity_warned_user: AtomicBool,
    /// Quotas kept for rebuilding.
    ip_quota: Quota,
    user_quota: Quota,
}

/// A parsed trusted proxy entry (either an IP or CIDR range).
#[derive(Clone, Debug)]
enum TrustedEntry {
    Ip(IpAddr),
    Cidr(IpNet),
}

/// Trusted proxy configuration for IP extraction.
#[derive(Clone, Debug)]
enum TrustedProxies {
    /// Never trust forwarded headers (default, most secure).
    None,
    /// Trust headers from all sources (development only).
    All,
    /// Trust headers only from specific IPs/CIDRs.
    List(Vec<TrustedEntry>),
}

impl TrustedProxies {
    fn from_config(proxies: &[String]) -> Self {
        if proxies.is_empty() {
            Self::None
        } else if proxies.len() == 1 && proxies[0] == "*" {
            Self::All
        } else {
            let entries: Vec<TrustedEntry> = proxies
                .iter()
                .filter_map(|p| {
                    if p.contains('/') {
                        match p.parse::<IpNet>() {
                            Ok(net) => Some(TrustedEntry::Cidr(net)),
                            Err(e) => {
                                tracing::warn!("Invalid CIDR in trusted_proxies: '{}': {}", p, e);
                                None
                            }
                        }
                    } else {
                        match p.parse::<IpAddr>() {
                            Ok(ip) => Some(TrustedEntry::Ip(ip)),
                            Err(e) => {
                                tracing::warn!("Invalid IP in trusted_proxies: '{}': {}", p, e);
                                None
                            }
                        }
                    }
                })
                .collect();
            Self::List(entries)
        }
    }

    /// Check if the given connection IP is a trusted proxy.
    fn is_trusted(&self, connection_ip: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::List(entries) => {
                let ip: IpAddr = match connection_ip.parse() {
                    Ok(ip) => ip,
                    Err(_) => return false,
                };
                entries.iter().any(|entry| match entry {
                    TrustedEntry::Ip(trusted) => *trusted == ip,
                    TrustedEntry::Cidr(network) => network.contains(&ip),
                })
            }
        }
    }
}

impl RateLimitState {
    /// Create a new rate limit state from configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self { inner: None };
        }

        let trusted_proxies = TrustedProxies::from_config(&config.trusted_proxies);

        let ip_quota = Quota::per_minute(
            NonZeroU32::new(config.ip_requests_per_minute).unwrap_or(NonZeroU32::new(60).unwrap()),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::new(1).unwrap()));
        let ip_limiter = RateLimiter::dashmap(ip_quota);

        // Authenticated callers get their own bucket with a wider burst.
        let user_quota = Quota::per_minute(
            NonZeroU32::new(config.user_requests_per_minute)
                .unwrap_or(NonZeroU32::new(600).unwrap()),
        )
        .allow_burst(
            NonZeroU32::new(config.burst_size.saturating_mul(2))
                .unwrap_or(NonZeroU32::new(1).unwrap()),
        );
        let user_limiter = RateLimiter::dashmap(user_quota);

        Self {
            inner: Some(Arc::new(RateLimitStateInner {
                ip_limiter: RwLock::new(ip_limiter),
                user_limiter: RwLock::new(user_limiter),
                ip_last_access: DashMap::new(),
                user_last_access: DashMap::new(),
                trusted_proxies,
                max_entries: config.max_entries,
                entry_ttl: Duration::from_secs(config.entry_ttl_secs),
                connect_info_warned: AtomicBool::new(false),
                at_capacity_warned_ip: AtomicBool::new(false),
                at_capacity_warned_user: AtomicBool::new(false),
                ip_quota,
                user_quota,
            })),
        }
    }

    /// Check if a request from the given IP is allowed.
    pub fn check_ip(&self, ip: &str) -> Result<(), RateLimitError> {
        let inner = match &self.inner {
            Some(inner) => inner,
            None => return Ok(()),
        };

        Self::track_key(
            &inner.ip_last_access,
            ip,
            inner.max_entries,
            &inner.at_capacity_warned_ip,
            "IP",
        )?;

        let ip_limiter = inner.ip_limiter.read().unwrap_or_else(|poisoned| {
            tracing::warn!("ip_limiter RwLock was poisoned, recovering with into_inner()");
            poisoned.into_inner()
        });
        Self::check_limiter(&ip_limiter, ip)
    }

    /// Check if a request from the given authenticated subject is allowed.
    pub fn check_user(&self, subject: &str) -> Result<(), RateLimitError> {
        let inner = match &self.inner {
            Some(inner) => inner,
            None => return Ok(()),
        };

        Self::track_key(
            &inner.user_last_access,
            subject,
            inner.max_entries,
            &inner.at_capacity_warned_user,
            "user",
        )?;

        let user_limiter = inner.user_limiter.read().unwrap_or_else(|poisoned| {
            tracing::warn!("user_limiter RwLock was poisoned, recovering with into_inner()");
            poisoned.into_inner()
        });
        Self::check_limiter(&user_limiter, subject)
    }

    /// Record a key access, enforcing the maximum entry count.
    fn track_key(
        last_access: &DashMap<String, Instant>,
        key: &str,
        max_entries: u32,
        warned_flag: &AtomicBool,
        entry_type: &str,
    ) -> Result<(), RateLimitError> {
        let now = Instant::now();

        // Capacity is read before acquiring the entry lock; DashMap's
        // len() can deadlock while holding one. The check is slightly
        // racy but only overshoots by the number of concurrent threads.
        let current_len = last_access.len();
        let at_capacity = current_len >= max_entries as usize;

        match last_access.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(now);
            }
            Entry::Vacant(entry) => {
                if at_capacity {
                    if !warned_flag.swap(true, Ordering::Relaxed) {
                        tracing::warn!(
                            current_entries = current_len,
                            max_entries = max_entries,
                            entry_type = entry_type,
                            "Rate limiter at capacity, rejecting new entries"
                        );
                    }
                    return Err(RateLimitError {
                        retry_after_secs: 60,
                        reason: RateLimitReason::AtCapacity,
                    });
                }
                entry.insert(now);
            }
        }
        Ok(())
    }

    fn check_limiter(limiter: &KeyedLimiter, key: &str) -> Result<(), RateLimitError> {
        match limiter.check_key(&key.to_string()) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait_time =
                    not_until.wait_time_from(governor::clock::Clock::now(&DefaultClock::default()));
                Err(RateLimitError {
                    retry_after_secs: wait_time.as_secs() + 1,
                    reason: RateLimitReason::RateLimited,
                })
            }
        }
    }

    /// Check if rate limiting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Clean up stale entries from both limiters.
    /// Returns the number of entries evicted.
    ///
    /// When entries are evicted, the governor limiters are rebuilt to
    /// reclaim memory; governor's internal DashMap does not support key
    /// removal, so without a rebuild memory would grow without bound.
    pub fn cleanup(&self) -> usize {
        let inner = match &self.inner {
            Some(inner) => inner,
            None => return 0,
        };

        let now = Instant::now();
        let ttl = inner.entry_ttl;

        let ip_evicted = Self::evict_stale(&inner.ip_last_access, now, ttl);
        let user_evicted = Self::evict_stale(&inner.user_last_access, now, ttl);

        // Rebuilding resets the rate-limit window for active keys; they
        // stay tracked in last_access so the reset is the lesser evil
        // against unbounded memory.
        if ip_evicted > 0 {
            let new_limiter = RateLimiter::dashmap(inner.ip_quota);
            let mut limiter = inner.ip_limiter.write().unwrap_or_else(|poisoned| {
                tracing::warn!("ip_limiter RwLock was poisoned during rebuild, recovering");
                poisoned.into_inner()
            });
            *limiter = new_limiter;
            inner.at_capacity_warned_ip.store(false, Ordering::Relaxed);
        }
        if user_evicted > 0 {
            let new_limiter = RateLimiter::dashmap(inner.user_quota);
            let mut limiter = inner.user_limiter.write().unwrap_or_else(|poisoned| {
                tracing::warn!("user_limiter RwLock was poisoned during rebuild, recovering");
                poisoned.into_inner()
            });
            *limiter = new_limiter;
            inner.at_capacity_warned_user.store(false, Ordering::Relaxed);
        }

        let total_evicted = ip_evicted + user_evicted;
        if total_evicted > 0 {
            tracing::debug!(
                ip_evicted = ip_evicted,
                user_evicted = user_evicted,
                ip_entries = inner.ip_last_access.len(),
                user_entries = inner.user_last_access.len(),
                "Rate limiter cleanup completed"
            );
        }
        total_evicted
    }

    /// Remove entries older than the TTL. `remove_if` re-checks the
    /// timestamp so a freshly-accessed entry is never evicted.
    fn evict_stale(last_access: &DashMap<String, Instant>, now: Instant, ttl: Duration) -> usize {
        let stale_keys: Vec<String> = last_access
            .iter()
            .filter(|entry| now.duration_since(*entry.value()) > ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for key in stale_keys {
            if last_access
                .remove_if(&key, |_, last| now.duration_since(*last) > ttl)
                .is_some()
            {
                evicted += 1;
            }
        }
        evicted
    }

    /// Get the current number of tracked entries.
    pub fn entry_count(&self) -> (usize, usize) {
        match &self.inner {
            Some(inner) => (inner.ip_last_access.len(), inner.user_last_access.len()),
            None => (0, 0),
        }
    }

    /// Log a warning if ConnectInfo is not available (only once).
    fn warn_connect_info_missing(&self) {
        if let Some(inner) = &self.inner
            && !inner.connect_info_warned.swap(true, Ordering::Relaxed)
        {
            tracing::warn!(
                "ConnectInfo not available for rate limiting. All requests will share a single \
                     rate limit bucket ('unknown' IP). Add .into_make_service_with_connect_info::<SocketAddr>() \
                     to your server configuration to enable per-IP rate limiting."
            );
        }
    }
}

/// Reason for rate limit rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    /// Request exceeded rate limit.
    RateLimited,
    /// Rate limiter at capacity, cannot track new entries.
    AtCapacity,
}

/// Error returned when rate limit is exceeded.
#[derive(Debug)]
pub struct RateLimitError {
    /// Number of seconds to wait before retrying.
    pub retry_after_secs: u64,
    /// Reason for the rate limit.
    pub reason: RateLimitReason,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let (code, message) = match self.reason {
            RateLimitReason::RateLimited => (
                "rate_limit_exceeded",
                format!(
                    "Rate limit exceeded. Retry after {} seconds.",
                    self.retry_after_secs
                ),
            ),
            RateLimitReason::AtCapacity => (
                "rate_limiter_at_capacity",
                "Server is experiencing high load. Please retry later.".to_string(),
            ),
        };

        let body = serde_json::json!({
            "code": code,
            "message": message,
            "retry_after": self.retry_after_secs,
        });

        (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", self.retry_after_secs.to_string())],
            axum::Json(body),
        )
            .into_response()
    }
}

/// Extract client IP address from request headers (only if trusted).
fn extract_forwarded_ip(req: &Request<Body>) -> Option<String> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(s) = forwarded.to_str()
    {
        // First IP in the chain is the client.
        if let Some(ip) = s.split(',').next() {
            return Some(ip.trim().to_string());
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(s) = real_ip.to_str()
    {
        return Some(s.trim().to_string());
    }

    None
}

/// Extract connection IP from request extensions (set by ConnectInfo).
fn extract_connection_ip(req: &Request<Body>) -> Option<String> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}

/// Extract client IP address from request, honoring trusted_proxies.
fn extract_ip(req: &Request<Body>, state: &RateLimitState) -> String {
    let inner = match &state.inner {
        Some(inner) => inner,
        None => return "unknown".to_string(),
    };

    let connection_ip = extract_connection_ip(req);

    let trust_headers = match (&connection_ip, &inner.trusted_proxies) {
        (None, TrustedProxies::All) => true,
        // Cannot verify the proxy without a connection IP.
        (None, TrustedProxies::List(_)) => false,
        (None, TrustedProxies::None) => false,
        (Some(conn_ip), trusted_proxies) => trusted_proxies.is_trusted(conn_ip),
    };

    if trust_headers && let Some(forwarded_ip) = extract_forwarded_ip(req) {
        return forwarded_ip;
    }

    match connection_ip {
        Some(ip) => ip,
        None => {
            state.warn_connect_info_missing();
            "unknown".to_string()
        }
    }
}

/// Per-IP rate limiting middleware. Applied as an outer layer, before
/// authentication.
pub async fn ip_rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !rate_limit.is_enabled() {
        return next.run(req).await;
    }

    let ip = extract_ip(&req, &rate_limit);

    match rate_limit.check_ip(&ip) {
        Ok(_) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

/// Per-user rate limiting middleware. Applied after authentication;
/// unauthenticated requests fall through to the IP limit alone.
pub async fn user_rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !rate_limit.is_enabled() {
        return next.run(req).await;
    }

    if let Some(subject) = req.extensions().get::<SubjectIdExtension>() {
        match rate_limit.check_user(&subject.0) {
            Ok(_) => next.run(req).await,
            Err(e) => e.into_response(),
        }
    } else {
        next.run(req).await
    }
}

/// Extension holding the authenticated subject for rate limiting.
#[derive(Clone)]
pub struct SubjectIdExtension(pub String);

/// Spawn a background task that periodically cleans up stale rate
/// limiter entries.
pub fn spawn_cleanup_task(
    state: RateLimitState,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let evicted = state.cleanup();
            if evicted > 0 {
                tracing::info!(
                    evicted = evicted,
                    "Rate limiter cleanup task evicted stale entries"
                );
            }
        }
    })
}
