use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{config::RateLimitConfig, error::ApiError, state::AppState};

/// Entries are only swept once the map grows past this many clients.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32, reset: Duration },
    Limited { retry_after: Duration },
}

/// Fixed-window request counter keyed by client IP.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
    max: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max: cfg.max_requests,
            window: cfg.window(),
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn check(&self, ip: IpAddr, now: Instant) -> Decision {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        if windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.saturating_duration_since(w.started) < window);
        }

        let w = windows.entry(ip).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.saturating_duration_since(w.started) >= self.window {
            *w = Window {
                started: now,
                hits: 0,
            };
        }

        let reset = self
            .window
            .saturating_sub(now.saturating_duration_since(w.started));
        if w.hits >= self.max {
            return Decision::Limited { retry_after: reset };
        }
        w.hits += 1;
        Decision::Allowed {
            remaining: self.max - w.hits,
            reset,
        }
    }
}

fn client_ip(req: &Request, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn set_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset: Duration) {
    let secs = reset.as_secs().max(1);
    headers.insert(HeaderName::from_static("ratelimit-limit"), HeaderValue::from(limit));
    headers.insert(
        HeaderName::from_static("ratelimit-remaining"),
        HeaderValue::from(remaining),
    );
    headers.insert(HeaderName::from_static("ratelimit-reset"), HeaderValue::from(secs));
}

pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req, state.config.trust_proxy);
    let limit = state.limiter.max();
    match state.limiter.check(ip, Instant::now()) {
        Decision::Allowed { remaining, reset } => {
            let mut res = next.run(req).await;
            set_limit_headers(res.headers_mut(), limit, remaining, reset);
            res
        }
        Decision::Limited { retry_after } => {
            warn!(%ip, "rate limit exceeded");
            let mut res =
                ApiError::TooManyRequests("Too many requests, please try again later.".into())
                    .into_response();
            set_limit_headers(res.headers_mut(), limit, 0, retry_after);
            res.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after.as_secs().max(1)),
            );
            res
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests: max,
            window_secs,
        })
    }

    #[test]
    fn limits_after_max_hits_in_window() {
        let rl = limiter(3, 60);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let t0 = Instant::now();
        for expected in [2, 1, 0] {
            match rl.check(ip, t0) {
                Decision::Allowed { remaining, .. } => assert_eq!(remaining, expected),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(matches!(rl.check(ip, t0), Decision::Limited { .. }));
    }

    #[test]
    fn window_resets_after_it_elapses() {
        let rl = limiter(1, 60);
        let ip: IpAddr = "10.0.0.2".parse().unwrap();
        let t0 = Instant::now();
        assert!(matches!(rl.check(ip, t0), Decision::Allowed { .. }));
        match rl.check(ip, t0 + Duration::from_secs(20)) {
            Decision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(40)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            rl.check(ip, t0 + Duration::from_secs(60)),
            Decision::Allowed { .. }
        ));
    }

    #[test]
    fn clients_are_counted_separately() {
        let rl = limiter(1, 60);
        let t0 = Instant::now();
        assert!(matches!(
            rl.check("10.0.0.3".parse().unwrap(), t0),
            Decision::Allowed { .. }
        ));
        assert!(matches!(
            rl.check("10.0.0.4".parse().unwrap(), t0),
            Decision::Allowed { .. }
        ));
    }

    #[test]
    fn forwarded_for_only_when_trusted() {
        let req = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 198.51.100.7")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req, true), "198.51.100.7".parse::<IpAddr>().unwrap());
        assert_eq!(client_ip(&req, false), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
}
