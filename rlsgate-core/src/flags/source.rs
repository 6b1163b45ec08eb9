//! Where flag values come from: environment lookup and the typed boolean parser

use std::collections::HashMap;

use super::Environment;

/// Variable selecting the deployment environment
pub const ENVIRONMENT_KEY: &str = "NEXT_PUBLIC_ENVIRONMENT";
/// Secondary environment selector consulted when the primary one is unset or unknown
pub const FALLBACK_ENVIRONMENT_KEY: &str = "NODE_ENV";
/// Prefix of per-table RLS variables, followed by the upper-cased table name
pub const TABLE_RLS_PREFIX: &str = "NEXT_PUBLIC_RLS_TABLE_";
/// Variable initializing the kill switch
pub const KILL_SWITCH_KEY: &str = "NEXT_PUBLIC_RLS_KILL_SWITCH";

/// Key/value lookup the flag store is initialized from
pub trait FlagSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl FlagSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed in-memory variables, used by tests and tooling
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    vars: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.vars.remove(key);
        self
    }
}

impl FlagSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Parse a boolean variable.
///
/// Recognizes `true/false`, `1/0` and `yes/no` case-insensitively. Absent,
/// empty and unrecognized values yield `default`.
pub fn parse_bool_env(value: Option<&str>, default: bool) -> bool {
    let Some(raw) = value else {
        return default;
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => default,
    }
}

/// Resolve the deployment environment, defaulting to development
pub fn resolve_environment(source: &dyn FlagSource) -> Environment {
    if let Some(value) = source.get(ENVIRONMENT_KEY) {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => return Environment::Development,
            "staging" | "stage" => return Environment::Staging,
            "production" | "prod" => return Environment::Production,
            "test" => return Environment::Test,
            _ => {}
        }
    }

    match source
        .get(FALLBACK_ENVIRONMENT_KEY)
        .map(|v| v.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("production") => Environment::Production,
        Some("test") => Environment::Test,
        _ => Environment::Development,
    }
}
