use std::{
    collections::HashMap,
    env,
    net::{IpAddr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::{connect_info::ConnectInfo, State},
    http::{header::RETRY_AFTER, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

const DEFAULT_MAX_REQUESTS: u32 = 100;
const DEFAULT_WINDOW_SECONDS: u64 = 15 * 60;
const LIMITED_MESSAGE: &str = "Too many requests from this IP, please try again later.";

const HEADER_RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Fixed-window request budget per client IP
#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<RateLimitConfig>,
    buckets: Arc<Mutex<HashMap<String, BucketState>>>,
}

impl RateLimitState {
    pub fn from_env() -> Self {
        Self::new(RateLimitConfig::from_env())
    }

    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config: Arc::new(config),
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check_request<B>(&self, request: &Request<B>) -> RateLimitDecision {
        let limit = self.config.max_requests;
        let ip = extract_client_ip(request, self.config.trust_proxy);
        let now = Instant::now();

        // A poisoned map only holds counters; keep serving with its contents.
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Drop windows that have fully elapsed so the map stays bounded.
        if buckets.len() > 10_000 {
            let window = self.config.window;
            buckets.retain(|_, b| now.duration_since(b.window_start) < window);
        }

        let bucket = buckets.entry(ip).or_insert_with(|| BucketState {
            window_start: now,
            count: 0,
        });

        if now.duration_since(bucket.window_start) >= self.config.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        let remaining_window = self
            .config
            .window
            .saturating_sub(now.duration_since(bucket.window_start));
        let reset_seconds = ceil_duration_to_seconds(remaining_window).max(1);

        if bucket.count >= limit {
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_seconds,
            };
        }

        bucket.count += 1;

        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(bucket.count),
            reset_seconds,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    max_requests: u32,
    window: Duration,
    /// Key on `X-Forwarded-For` / `X-Real-IP` instead of the peer address.
    /// Only safe behind a proxy that overwrites those headers.
    trust_proxy: bool,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            trust_proxy: false,
        }
    }

    pub fn trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    pub fn from_env() -> Self {
        let max_requests = env_u32("RATE_LIMIT_MAX_REQUESTS", DEFAULT_MAX_REQUESTS);
        let window_seconds = env_u64("RATE_LIMIT_WINDOW_SECONDS", DEFAULT_WINDOW_SECONDS);
        let trust_proxy = env_bool("TRUST_PROXY");

        tracing::info!(max_requests, window_seconds, trust_proxy, "Rate limiter configured");

        Self::new(max_requests, Duration::from_secs(window_seconds)).trust_proxy(trust_proxy)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, Duration::from_secs(DEFAULT_WINDOW_SECONDS))
    }
}

struct BucketState {
    window_start: Instant,
    count: u32,
}

struct RateLimitDecision {
    allowed: bool,
    limit: u32,
    remaining: u32,
    reset_seconds: u64,
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = rate_limiter.check_request(&request);

    if !decision.allowed {
        tracing::debug!(limit = decision.limit, "rate limit exceeded");
        let mut response =
            ApiError::new(StatusCode::TOO_MANY_REQUESTS, LIMITED_MESSAGE).into_response();
        attach_rate_limit_headers(&mut response, &decision);
        response.headers_mut().insert(
            RETRY_AFTER,
            HeaderValue::from_str(&decision.reset_seconds.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("1")),
        );
        return response;
    }

    let mut response = next.run(request).await;
    attach_rate_limit_headers(&mut response, &decision);
    response
}

fn attach_rate_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    headers.insert(HEADER_RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(HEADER_RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(HEADER_RATE_LIMIT_RESET, HeaderValue::from(decision.reset_seconds));
}

fn extract_client_ip<B>(request: &Request<B>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(ip) = forwarded_ip(request) {
            return ip.to_string();
        }
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

fn forwarded_ip<B>(request: &Request<B>) -> Option<IpAddr> {
    if let Some(ip) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_x_forwarded_for)
    {
        return Some(ip);
    }

    request
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_ip_addr)
}

fn parse_x_forwarded_for(raw: &str) -> Option<IpAddr> {
    raw.split(',').map(str::trim).find_map(parse_ip_addr)
}

fn parse_ip_addr(raw: &str) -> Option<IpAddr> {
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

fn env_u32(key: &str, default: u32) -> u32 {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u32>() {
            Ok(value) if value > 0 => value,
            _ => {
                tracing::warn!("Invalid value for {key} (`{raw}`), using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(value) if value > 0 => value,
            _ => {
                tracing::warn!("Invalid value for {key} (`{raw}`), using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_bool(key: &str) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "" | "0" | "false" | "no" => false,
            _ => {
                tracing::warn!("Invalid value for {key} (`{raw}`), using default false");
                false
            }
        },
        Err(_) => false,
    }
}

fn ceil_duration_to_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::Service;

    fn test_app(max_requests: u32, window: Duration) -> Router<()> {
        limited_app(RateLimitConfig::new(max_requests, window).trust_proxy(true))
    }

    fn limited_app(config: RateLimitConfig) -> Router<()> {
        let limiter = RateLimitState::new(config);

        Router::new()
            .route("/users", get(|| async { "users" }).post(|| async { "created" }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
    }

    fn request(method: &str, ip: &str) -> Request<Body> {
        Request::builder()
            .uri("/users")
            .method(method)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    fn from_peer(peer: &str, forwarded_for: &str) -> Request<Body> {
        let mut request = request("GET", forwarded_for);
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    async fn call(app: &Router<()>, request: Request<Body>) -> Response {
        let mut svc = app.clone();
        svc.call(request).await.unwrap()
    }

    #[tokio::test]
    async fn returns_429_on_101st_request() {
        let app = test_app(100, Duration::from_secs(900));

        for _ in 0..100 {
            let response = call(&app, request("GET", "203.0.113.10")).await;
            assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        }

        let response = call(&app, request("GET", "203.0.113.10")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(RETRY_AFTER));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], LIMITED_MESSAGE);
    }

    #[tokio::test]
    async fn budget_is_shared_across_methods_but_not_ips() {
        let app = test_app(2, Duration::from_secs(900));

        assert_eq!(call(&app, request("GET", "198.51.100.22")).await.status(), StatusCode::OK);
        assert_eq!(call(&app, request("POST", "198.51.100.22")).await.status(), StatusCode::OK);
        assert_eq!(
            call(&app, request("GET", "198.51.100.22")).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(call(&app, request("GET", "198.51.100.23")).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn includes_rate_limit_headers() {
        let app = test_app(5, Duration::from_secs(900));
        let response = call(&app, request("GET", "192.0.2.7")).await;

        assert_eq!(response.headers()[HEADER_RATE_LIMIT_LIMIT], "5");
        assert_eq!(response.headers()[HEADER_RATE_LIMIT_REMAINING], "4");
        assert!(response.headers().contains_key(HEADER_RATE_LIMIT_RESET));
    }

    #[tokio::test]
    async fn allows_requests_again_after_window_reset() {
        let app = test_app(1, Duration::from_secs(1));

        assert_eq!(call(&app, request("GET", "192.0.2.44")).await.status(), StatusCode::OK);
        assert_eq!(
            call(&app, request("GET", "192.0.2.44")).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(call(&app, request("GET", "192.0.2.44")).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rotating_forwarded_header_does_not_reset_budget() {
        let app = limited_app(RateLimitConfig::new(2, Duration::from_secs(900)));

        assert_eq!(call(&app, from_peer("192.0.2.50:4000", "10.0.0.1")).await.status(), StatusCode::OK);
        assert_eq!(call(&app, from_peer("192.0.2.50:4001", "10.0.0.2")).await.status(), StatusCode::OK);
        assert_eq!(
            call(&app, from_peer("192.0.2.50:4002", "10.0.0.3")).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(call(&app, from_peer("192.0.2.51:4000", "10.0.0.3")).await.status(), StatusCode::OK);
    }

    #[test]
    fn forwarded_headers_are_ignored_unless_trusted() {
        let request = from_peer("192.0.2.60:5000", "203.0.113.9");
        assert_eq!(extract_client_ip(&request, false), "192.0.2.60");
        assert_eq!(extract_client_ip(&request, true), "203.0.113.9");

        let anonymous = request_without_peer();
        assert_eq!(extract_client_ip(&anonymous, false), "unknown");
    }

    fn request_without_peer() -> Request<Body> {
        Request::builder().uri("/users").body(Body::empty()).unwrap()
    }

    #[test]
    fn forwarded_header_takes_first_valid_ip() {
        assert_eq!(
            parse_x_forwarded_for("garbage, 10.0.0.1:443, 10.0.0.2"),
            Some("10.0.0.1".parse().unwrap())
        );
        assert_eq!(parse_x_forwarded_for("nope"), None);
    }
}
