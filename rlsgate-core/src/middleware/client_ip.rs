//! Client address resolution for rate limiting and request spans

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const REAL_IP: &str = "x-real-ip";

/// First `X-Forwarded-For` hop, then `X-Real-IP`, else `"unknown"`
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get(REAL_IP)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .unwrap_or("unknown")
        .to_string()
}

/// Fill `X-Real-IP` from the socket peer on direct connections so
/// [`extract_client_ip`] sees an address without a reverse proxy in front.
pub async fn inject_client_ip(mut request: Request, next: Next) -> Response {
    let proxied =
        request.headers().contains_key(FORWARDED_FOR) || request.headers().contains_key(REAL_IP);

    if !proxied {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        if let Some(value) = peer.and_then(|ip| ip.parse().ok()) {
            request.headers_mut().insert(REAL_IP, value);
        }
    }

    next.run(request).await
}
