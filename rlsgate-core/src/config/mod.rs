//! Configuration management for the RLS gate
//!
//! Feature flags are not part of [`Config`]; the flag store reads its own
//! variables through [`crate::flags::FlagSource`].

use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Backend-as-a-service endpoint holding identities and tenant data
    pub baas: BaasConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Logging and metrics
    pub telemetry: TelemetryConfig,
}

#[derive(Clone)]
pub struct BaasConfig {
    /// Base URL, e.g. `https://project.example.co`
    pub url: String,
    /// Public key sent as `apikey` on every request
    pub anon_key: String,
    /// Privileged key used for audit writes when present
    pub service_role_key: Option<String>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for BaasConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaasConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field(
                "service_role_key",
                &self.service_role_key.as_ref().map(|_| "<redacted>"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Requests allowed per window
    pub requests: u64,
    /// Window size in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests: 100,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub metrics_enabled: bool,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_format: LogFormat::Json,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            http_host: var("HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            http_port: var("HTTP_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            baas: BaasConfig {
                url: var("BAAS_URL")
                    .context("BAAS_URL is required")?
                    .trim_end_matches('/')
                    .to_string(),
                anon_key: var("BAAS_ANON_KEY").context("BAAS_ANON_KEY is required")?,
                service_role_key: var("BAAS_SERVICE_ROLE_KEY").filter(|k| !k.is_empty()),
                timeout_secs: var("BAAS_TIMEOUT_SECS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            rate_limit: RateLimitConfig {
                enabled: var("RATE_LIMIT_ENABLED")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(false),
                requests: var("RATE_LIMIT_REQUESTS")
                    .unwrap_or_else(|| "100".to_string())
                    .parse()
                    .unwrap_or(100),
                window_secs: var("RATE_LIMIT_WINDOW_SECS")
                    .unwrap_or_else(|| "60".to_string())
                    .parse()
                    .unwrap_or(60),
            },
            telemetry: TelemetryConfig {
                metrics_enabled: var("METRICS_ENABLED")
                    .map(|s| s.to_lowercase() != "false")
                    .unwrap_or(true),
                log_format: match var("LOG_FORMAT").as_deref() {
                    Some("pretty") => LogFormat::Pretty,
                    _ => LogFormat::Json,
                },
            },
        })
    }

    /// Defaults for everything except the backend endpoint
    pub fn with_baas(baas: BaasConfig) -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            baas,
            rate_limit: RateLimitConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
