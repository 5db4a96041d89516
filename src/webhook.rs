//! HTTP ingress for group messages.
//!
//! `POST /v1/messages` runs a message through the pipeline and returns the
//! processing report. Requests carry the shared hook token in `X-Hook-Token`
//! and are rate limited per group with a fixed one-minute window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::pipeline::{GroupMessage, MessageProcessor};

const HOOK_TOKEN_HEADER: &str = "x-hook-token";
const RATE_WINDOW_SECS: u64 = 60;
const RATE_LIMIT_PER_WINDOW: u32 = 30;

/// Fixed-window counter per group id.
struct RateLimiter {
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    async fn allow(&self, group_id: &str) -> bool {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        // Sweep expired windows so the map stays bounded by active groups.
        windows.retain(|_, (start, _)| now.duration_since(*start).as_secs() < RATE_WINDOW_SECS);
        let entry = windows.entry(group_id.to_string()).or_insert((now, 0));
        entry.1 += 1;
        entry.1 <= RATE_LIMIT_PER_WINDOW
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<MessageProcessor>,
    pub hook_token: Arc<SecretString>,
    limiter: Arc<RateLimiter>,
}

/// Build the Axum router for the ingress endpoints.
pub fn message_routes(processor: Arc<MessageProcessor>, hook_token: SecretString) -> Router {
    let state = AppState {
        processor,
        hook_token: Arc::new(hook_token),
        limiter: Arc::new(RateLimiter::new()),
    };

    Router::new()
        .route("/health", get(health))
        .route("/v1/messages", post(ingest_message))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "vouch"
    }))
}

async fn ingest_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let token = headers
        .get(HOOK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if token != state.hook_token.expose_secret() {
        warn!("Rejected message with bad hook token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid hook token" })),
        );
    }

    let message: GroupMessage = match serde_json::from_slice(&body) {
        Ok(m) => m,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "error": format!("malformed message: {e}") })),
            );
        }
    };

    if !state.limiter.allow(&message.group_id).await {
        warn!(group = %message.group_id, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": "rate limit exceeded" })),
        );
    }

    info!(id = %message.id, group = %message.group_id, "Message received");
    match state.processor.process(&message, None).await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::to_value(&report).unwrap_or_default()),
        ),
        Err(PipelineError::Classification(e)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
        Err(PipelineError::Extraction(e)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
        Err(e) => {
            warn!(error = %e, "Message processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "processing failed" })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_counts_per_group() {
        let limiter = RateLimiter::new();
        for _ in 0..RATE_LIMIT_PER_WINDOW {
            assert!(limiter.allow("g-1").await);
        }
        assert!(!limiter.allow("g-1").await);
        // Other groups are unaffected.
        assert!(limiter.allow("g-2").await);
    }

    #[tokio::test]
    async fn rate_limiter_sweeps_expired_windows() {
        let limiter = RateLimiter::new();
        let stale = Instant::now()
            .checked_sub(std::time::Duration::from_secs(RATE_WINDOW_SECS + 1))
            .unwrap();
        {
            let mut windows = limiter.windows.lock().await;
            windows.insert("g-old".into(), (stale, RATE_LIMIT_PER_WINDOW));
            windows.insert("g-dead".into(), (stale, 3));
        }
        // An expired window no longer counts against its group.
        assert!(limiter.allow("g-old").await);
        let windows = limiter.windows.lock().await;
        assert!(!windows.contains_key("g-dead"));
    }
}
