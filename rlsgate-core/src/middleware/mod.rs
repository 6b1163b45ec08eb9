//! HTTP middleware for the RLS gate
//!
//! - bearer extraction and session validation
//! - in-memory rate limiting
//! - the RLS route guard and its context extractor
//! - client address, request metrics and span helpers

pub mod client_ip;
pub mod metrics;
pub mod rate_limit;
pub mod rls;
pub mod token;
pub mod trace;

pub use client_ip::{extract_client_ip, inject_client_ip};
pub use metrics::HttpMetricsLayer;
pub use rate_limit::RateLimiter;
pub use rls::{
    handle_rls_violation, rls_layer, rls_middleware, validate_rls_middleware, RequestMeta,
    RlsContextExt, RlsLayerState, RlsMiddlewareConfig, RlsMiddlewareResult,
};
pub use token::{extract_bearer_token, validate_session};
pub use trace::RedactingMakeSpan;
