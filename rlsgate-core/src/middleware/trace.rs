//! Request span maker that keeps bearer material out of logs

use axum::http::{Request, Uri};
use tower_http::trace::MakeSpan;
use tracing::Span;

/// Query keys whose values never reach a log line (compared case-insensitively)
const REDACTED_KEYS: &[&str] = &[
    "access_token",
    "refresh_token",
    "token",
    "apikey",
    "api_key",
    "service_role_key",
];

const REDACTED: &str = "[REDACTED]";

#[derive(Clone, Debug, Default)]
pub struct RedactingMakeSpan;

impl<B> MakeSpan<B> for RedactingMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %redact_uri(request.uri()),
            client_ip = %super::client_ip::extract_client_ip(request.headers()),
        )
    }
}

/// Path plus query, with the values of [`REDACTED_KEYS`] replaced
pub fn redact_uri(uri: &Uri) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let query = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_redacted(key) => format!("{key}={REDACTED}"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", uri.path(), query)
}

fn is_redacted(key: &str) -> bool {
    REDACTED_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}
