use std::{collections::HashMap, net::SocketAddr, time::Duration};

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use tokio::{sync::Mutex, time::Instant};
use tracing::warn;

use crate::{error::ApiError, state::AppState};

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by an arbitrary string (client + route).
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request for `key`; `false` once the window is used up.
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        if windows.len() > 10_000 {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }
        let w = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(w.started) >= self.window {
            w.started = now;
            w.count = 0;
        }
        if w.count >= self.max_requests {
            return false;
        }
        w.count += 1;
        true
    }

    pub async fn clear(&self) {
        self.windows.lock().await.clear();
    }

    #[cfg(test)]
    pub async fn tracked(&self) -> usize {
        self.windows.lock().await.len()
    }
}

fn client_key(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".into())
}

/// Route-layer middleware; rejects with 429 when the caller exhausted the
/// window for the matched route.
pub async fn limit_requests(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str())
        .unwrap_or_else(|| req.uri().path())
        .trim_end_matches('/')
        .to_string();
    let key = format!("{}:{} {}", client_key(&req), req.method(), route);

    if !state.limiter.check(&key).await {
        warn!(%key, "rate limit exceeded");
        return Err(ApiError::TooManyRequests);
    }
    Ok(next.run(req).await)
}
