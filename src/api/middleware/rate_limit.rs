use crate::AppState;
use crate::api::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

pub const RATE_LIMIT_MESSAGE: &str = "too many requests, please try again later";

/// Socket address when served with connect info, else the first
/// X-Forwarded-For hop.
fn client_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let decision = state.rate_limiter.check(&client_key(&req));

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        AppError::TooManyRequests(RATE_LIMIT_MESSAGE.to_string()).into_response()
    };

    let reset_secs = decision.reset_after.as_secs();
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("ratelimit-limit"),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-remaining"),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-reset"),
        HeaderValue::from(reset_secs),
    );
    if !decision.allowed {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(reset_secs));
    }

    response
}
