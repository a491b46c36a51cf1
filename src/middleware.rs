//! Admission middleware: every request passes the configuration gate,
//! identity hashing and the interval throttle before it reaches a
//! handler. CORS preflights bypass the gate entirely.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use tracing::info;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::identity;

/// Hashed identity of the requesting client, attached as a request
/// extension for handlers that enforce the write quota.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

pub async fn admission(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return preflight_response();
    }

    if let Err(e) = state.config.check_credentials() {
        return e.into_response();
    }
    if let Err(e) = state.config.check_tunables() {
        return e.into_response();
    }

    let client_ip = client_ip(&request);
    let token = identity::hash_identity(&client_ip, &state.config.hash_salt);
    if !identity::is_well_formed(&token) {
        return ApiError::Identity(
            "unable to derive a request identity, refusing".to_string(),
        )
        .into_response();
    }

    if !state.rate_gate.allow_interval(&token).await {
        return ApiError::RateLimited(format!(
            "only 1 request per {} second(s) is allowed",
            state.config.rate_limit_interval_secs
        ))
        .into_response();
    }

    let method = request.method().clone();
    let uri = request.uri().clone();
    request.extensions_mut().insert(Identity(token));

    let response = next.run(request).await;

    info!(
        target: "linkgate::middleware",
        method = %method,
        uri = %uri,
        status = %response.status(),
        "request completed"
    );

    response
}

fn preflight_response() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, DELETE, POST, PATCH, OPTIONS"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type, Authorization"),
            ),
            (
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static("86400"),
            ),
        ],
    )
        .into_response()
}

/// Best available client address: forwarding headers first, then the
/// socket peer, then a shared fallback bucket.
pub fn client_ip(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return first_ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.trim().to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        addr.ip().to_string()
    } else {
        "unknown".to_string()
    }
}
