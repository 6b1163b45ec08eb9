//! Feature flag store
//!
//! Decides whether organization-scoped filtering is active, globally and per
//! table. Values are derived once from a [`FlagSource`] with per-environment
//! defaults, can be overridden at runtime in development and test, and are
//! forced off by the kill switch.
//!
//! The store is constructed explicitly at startup and shared as
//! `Arc<FeatureFlagStore>`. Every mutation bumps a generation counter that
//! subscribers observe through a `tokio::sync::watch` channel.

pub mod source;
pub mod usage;

pub use source::{parse_bool_env, resolve_environment, EnvSource, FlagSource, MapSource};
pub use usage::{FeatureFlagUsageLog, UsageLog, UsageSource, UsageStats};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

/// Closed set of flags the store knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureFlag {
    RlsEnabled,
    UseMockAuth,
    GradualRlsRollout,
    RlsKillSwitch,
    EnableLogging,
    MockAuthBypass,
    RlsStrictMode,
    #[serde(rename = "FEATURE_FLAG_OVERRIDE_MODE")]
    OverrideMode,
}

impl FeatureFlag {
    pub const ALL: [FeatureFlag; 8] = [
        FeatureFlag::RlsEnabled,
        FeatureFlag::UseMockAuth,
        FeatureFlag::GradualRlsRollout,
        FeatureFlag::RlsKillSwitch,
        FeatureFlag::EnableLogging,
        FeatureFlag::MockAuthBypass,
        FeatureFlag::RlsStrictMode,
        FeatureFlag::OverrideMode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureFlag::RlsEnabled => "RLS_ENABLED",
            FeatureFlag::UseMockAuth => "USE_MOCK_AUTH",
            FeatureFlag::GradualRlsRollout => "GRADUAL_RLS_ROLLOUT",
            FeatureFlag::RlsKillSwitch => "RLS_KILL_SWITCH",
            FeatureFlag::EnableLogging => "ENABLE_LOGGING",
            FeatureFlag::MockAuthBypass => "MOCK_AUTH_BYPASS",
            FeatureFlag::RlsStrictMode => "RLS_STRICT_MODE",
            FeatureFlag::OverrideMode => "FEATURE_FLAG_OVERRIDE_MODE",
        }
    }

    /// Environment variable the flag is read from
    pub fn env_key(&self) -> &'static str {
        match self {
            FeatureFlag::RlsEnabled => "NEXT_PUBLIC_FEATURE_RLS_ENABLED",
            FeatureFlag::UseMockAuth => "NEXT_PUBLIC_FEATURE_USE_MOCK_AUTH",
            FeatureFlag::GradualRlsRollout => "NEXT_PUBLIC_FEATURE_GRADUAL_RLS_ROLLOUT",
            FeatureFlag::RlsKillSwitch => source::KILL_SWITCH_KEY,
            FeatureFlag::EnableLogging => "NEXT_PUBLIC_FEATURE_FLAG_LOGGING",
            FeatureFlag::MockAuthBypass => "NEXT_PUBLIC_MOCK_AUTH_BYPASS",
            FeatureFlag::RlsStrictMode => "NEXT_PUBLIC_RLS_STRICT_MODE",
            FeatureFlag::OverrideMode => "NEXT_PUBLIC_FEATURE_OVERRIDE_MODE",
        }
    }
}

impl std::fmt::Display for FeatureFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FeatureFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        FeatureFlag::ALL
            .into_iter()
            .find(|flag| flag.as_str() == wanted)
            .ok_or_else(|| format!("unknown feature flag: {}", s))
    }
}

/// Deployment environment, fixed once the store is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    /// Value a flag takes when its variable is absent or unparseable
    pub fn flag_default(&self, flag: FeatureFlag) -> bool {
        use Environment::*;
        use FeatureFlag::*;

        match (self, flag) {
            (Production | Staging, RlsEnabled) => true,
            (Development | Test, RlsEnabled) => false,
            (Production | Staging, UseMockAuth) => false,
            (Development | Test, UseMockAuth) => true,
            (Test, GradualRlsRollout) => false,
            (_, GradualRlsRollout) => true,
            (_, RlsKillSwitch) => false,
            (Test, EnableLogging) => false,
            (_, EnableLogging) => true,
            (Production | Staging, MockAuthBypass) => false,
            (Development | Test, MockAuthBypass) => true,
            (Production, RlsStrictMode) => true,
            (_, RlsStrictMode) => false,
            (Production, OverrideMode) => false,
            (_, OverrideMode) => true,
        }
    }

    /// Per-table RLS default: on wherever RLS itself defaults on
    pub fn table_default(&self) -> bool {
        matches!(self, Environment::Production | Environment::Staging)
    }

    /// Whether runtime overrides may ever be written or applied
    pub fn allows_overrides(&self) -> bool {
        matches!(self, Environment::Development | Environment::Test)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tables with per-table RLS configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RlsTable {
    Users,
    UserSessions,
    UserPerformance,
    AiModelConfigs,
    ApiRateLimits,
    AuthSessionMonitoring,
    ContactEmbeddings,
    RealTimePresence,
    SystemLogs,
    /// Any table outside the known set; resolves to the environment table default
    Unknown(String),
}

impl RlsTable {
    pub const KNOWN: [RlsTable; 9] = [
        RlsTable::Users,
        RlsTable::UserSessions,
        RlsTable::UserPerformance,
        RlsTable::AiModelConfigs,
        RlsTable::ApiRateLimits,
        RlsTable::AuthSessionMonitoring,
        RlsTable::ContactEmbeddings,
        RlsTable::RealTimePresence,
        RlsTable::SystemLogs,
    ];

    pub fn from_name(name: &str) -> Self {
        match name {
            "users" => RlsTable::Users,
            "user_sessions" => RlsTable::UserSessions,
            "user_performance" => RlsTable::UserPerformance,
            "ai_model_configs" => RlsTable::AiModelConfigs,
            "api_rate_limits" => RlsTable::ApiRateLimits,
            "auth_session_monitoring" => RlsTable::AuthSessionMonitoring,
            "contact_embeddings" => RlsTable::ContactEmbeddings,
            "real_time_presence" => RlsTable::RealTimePresence,
            "system_logs" => RlsTable::SystemLogs,
            other => RlsTable::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RlsTable::Users => "users",
            RlsTable::UserSessions => "user_sessions",
            RlsTable::UserPerformance => "user_performance",
            RlsTable::AiModelConfigs => "ai_model_configs",
            RlsTable::ApiRateLimits => "api_rate_limits",
            RlsTable::AuthSessionMonitoring => "auth_session_monitoring",
            RlsTable::ContactEmbeddings => "contact_embeddings",
            RlsTable::RealTimePresence => "real_time_presence",
            RlsTable::SystemLogs => "system_logs",
            RlsTable::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, RlsTable::Unknown(_))
    }

    /// `NEXT_PUBLIC_RLS_TABLE_<NAME>`
    pub fn env_key(&self) -> String {
        format!("{}{}", source::TABLE_RLS_PREFIX, self.name().to_ascii_uppercase())
    }
}

impl std::fmt::Display for RlsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of the resolved flag state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureConfig {
    pub flags: BTreeMap<FeatureFlag, bool>,
    pub table_rls: BTreeMap<String, bool>,
    pub environment: Environment,
    pub kill_switch_active: bool,
    pub overrides: BTreeMap<FeatureFlag, bool>,
    /// Generation, bumped on every mutation
    pub last_update: u64,
    pub updated_at: DateTime<Utc>,
}

impl FeatureConfig {
    /// Derive flags, table settings and the kill switch from `source`
    pub fn load(source: &dyn FlagSource) -> Self {
        let environment = resolve_environment(source);

        let flags = FeatureFlag::ALL
            .into_iter()
            .map(|flag| {
                let raw = source.get(flag.env_key());
                (
                    flag,
                    parse_bool_env(raw.as_deref(), environment.flag_default(flag)),
                )
            })
            .collect();

        let table_rls = RlsTable::KNOWN
            .iter()
            .map(|table| {
                let raw = source.get(&table.env_key());
                (
                    table.name().to_string(),
                    parse_bool_env(raw.as_deref(), environment.table_default()),
                )
            })
            .collect();

        let kill_switch_active =
            parse_bool_env(source.get(source::KILL_SWITCH_KEY).as_deref(), false);

        Self {
            flags,
            table_rls,
            environment,
            kill_switch_active,
            overrides: BTreeMap::new(),
            last_update: 0,
            updated_at: Utc::now(),
        }
    }

    fn configured(&self, flag: FeatureFlag) -> bool {
        self.flags.get(&flag).copied().unwrap_or(false)
    }

    fn overrides_active(&self) -> bool {
        self.environment.allows_overrides() && self.configured(FeatureFlag::OverrideMode)
    }

    /// Effective value of `flag` and where it came from
    pub fn resolve(&self, flag: FeatureFlag) -> (bool, UsageSource) {
        if flag == FeatureFlag::RlsEnabled && self.kill_switch_active {
            return (false, UsageSource::KillSwitch);
        }

        if self.overrides_active() {
            if let Some(value) = self.overrides.get(&flag) {
                return (*value, UsageSource::Override);
            }
        }

        match self.flags.get(&flag) {
            Some(value) => (*value, UsageSource::Environment),
            None => (false, UsageSource::Default),
        }
    }

    /// Effective RLS decision for one table
    pub fn resolve_table(&self, table: &RlsTable) -> (bool, UsageSource) {
        if self.kill_switch_active {
            return (false, UsageSource::KillSwitch);
        }

        let (global, _) = self.resolve(FeatureFlag::RlsEnabled);
        if !global {
            return (false, UsageSource::GlobalDisabled);
        }

        let (gradual, _) = self.resolve(FeatureFlag::GradualRlsRollout);
        if !gradual {
            return (global, UsageSource::GlobalRollout);
        }

        match self.table_rls.get(table.name()) {
            Some(enabled) => (*enabled, UsageSource::TableSpecific),
            None => (self.environment.table_default(), UsageSource::Default),
        }
    }

    /// Human-readable warnings about risky or inconsistent settings
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let production = self.environment == Environment::Production;
        let rls = self.configured(FeatureFlag::RlsEnabled);

        if rls && self.configured(FeatureFlag::UseMockAuth) && production {
            issues.push("RLS enabled with mock auth in production - security risk".to_string());
        }

        if !rls && production {
            issues.push("RLS disabled in production environment - security risk".to_string());
        }

        if self.kill_switch_active {
            issues.push("Kill switch is active - all RLS disabled".to_string());
        }

        let disabled: Vec<&str> = self
            .table_rls
            .iter()
            .filter(|(_, enabled)| !**enabled)
            .map(|(table, _)| table.as_str())
            .collect();
        if rls && !disabled.is_empty() {
            issues.push(format!(
                "RLS enabled but {} tables have RLS disabled: {}",
                disabled.len(),
                disabled.join(", ")
            ));
        }

        if production && !self.overrides.is_empty() {
            issues.push("Feature flag overrides active in production".to_string());
        }

        issues
    }

    fn touch(&mut self) -> u64 {
        self.last_update += 1;
        self.updated_at = Utc::now();
        self.last_update
    }
}

/// Shared, explicitly constructed flag store
pub struct FeatureFlagStore {
    config: RwLock<FeatureConfig>,
    usage: UsageLog,
    updates: watch::Sender<u64>,
}

impl std::fmt::Debug for FeatureFlagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureFlagStore")
            .field("config", &*self.read())
            .field("usage_entries", &self.usage.len())
            .finish()
    }
}

impl FeatureFlagStore {
    pub fn from_source(source: &dyn FlagSource) -> Self {
        let config = FeatureConfig::load(source);

        tracing::info!(
            environment = %config.environment,
            kill_switch_active = config.kill_switch_active,
            "Feature flags initialized"
        );
        if config.environment == Environment::Development {
            tracing::debug!(flags = ?config.flags, table_rls = ?config.table_rls, "Resolved feature flags");
        }
        metrics::gauge!("rlsgate_kill_switch_active").set(if config.kill_switch_active { 1.0 } else { 0.0 });

        let (updates, _) = watch::channel(config.last_update);
        Self {
            config: RwLock::new(config),
            usage: UsageLog::new(),
            updates,
        }
    }

    pub fn from_env() -> Self {
        Self::from_source(&EnvSource)
    }

    // Mutations are a single assignment plus `touch`, so a poisoned config is still consistent
    fn read(&self) -> RwLockReadGuard<'_, FeatureConfig> {
        self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, FeatureConfig> {
        self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clone of the current configuration
    pub fn get_config(&self) -> FeatureConfig {
        self.read().clone()
    }

    pub fn environment(&self) -> Environment {
        self.read().environment
    }

    pub fn generation(&self) -> u64 {
        self.read().last_update
    }

    /// Receiver that observes every generation bump
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    pub fn is_enabled(&self, flag: FeatureFlag, context: Option<&serde_json::Value>) -> bool {
        let (value, source, logging, environment) = {
            let config = self.read();
            let (value, source) = config.resolve(flag);
            (
                value,
                source,
                config.configured(FeatureFlag::EnableLogging),
                config.environment,
            )
        };

        metrics::counter!(
            "rlsgate_flag_evaluations_total",
            "flag" => flag.as_str(),
            "source" => source.as_str()
        )
        .increment(1);
        self.record(flag.as_str(), value, context, source, logging, environment);

        value
    }

    pub fn is_table_enabled(&self, table: &RlsTable, context: Option<&serde_json::Value>) -> bool {
        let (enabled, source, logging, environment) = {
            let config = self.read();
            let (enabled, source) = config.resolve_table(table);
            (
                enabled,
                source,
                config.configured(FeatureFlag::EnableLogging),
                config.environment,
            )
        };

        metrics::counter!(
            "rlsgate_table_decisions_total",
            "table" => table.name().to_string(),
            "decision" => if enabled { "filter" } else { "bypass" }
        )
        .increment(1);
        self.record(
            &format!("RLS_TABLE_{}", table.name()),
            enabled,
            context,
            source,
            logging,
            environment,
        );

        enabled
    }

    pub fn is_rls_enabled_for_table(&self, table: &str) -> bool {
        self.is_table_enabled(&RlsTable::from_name(table), None)
    }

    /// Set a runtime override. Refused outside development/test or when override mode is off.
    pub fn override_flag(&self, flag: FeatureFlag, value: bool) -> bool {
        let generation = {
            let mut config = self.write();

            if !config.environment.allows_overrides() {
                tracing::warn!(environment = %config.environment, "Feature flag overrides not allowed");
                return false;
            }
            if !config.configured(FeatureFlag::OverrideMode) {
                tracing::warn!("Feature flag override mode is disabled");
                return false;
            }

            config.overrides.insert(flag, value);
            config.touch()
        };

        tracing::info!(flag = %flag, value, "Feature flag overridden");
        self.updates.send_replace(generation);
        true
    }

    /// Clear every override. Refused outside development/test.
    pub fn reset(&self) -> bool {
        let generation = {
            let mut config = self.write();

            if !config.environment.allows_overrides() {
                tracing::warn!(environment = %config.environment, "Feature flag reset not allowed");
                return false;
            }

            config.overrides.clear();
            config.touch()
        };

        tracing::info!("All feature flag overrides cleared");
        self.updates.send_replace(generation);
        true
    }

    /// Emergency switch: disables RLS on every table. Permitted in every environment.
    pub fn activate_kill_switch(&self) {
        self.set_kill_switch(true);
        tracing::error!("EMERGENCY: RLS kill switch activated - all RLS disabled");
    }

    pub fn deactivate_kill_switch(&self) {
        self.set_kill_switch(false);
        tracing::warn!("RLS kill switch deactivated - RLS restored to normal configuration");
    }

    fn set_kill_switch(&self, active: bool) {
        let (generation, logging, environment) = {
            let mut config = self.write();
            config.kill_switch_active = active;
            (
                config.touch(),
                config.configured(FeatureFlag::EnableLogging),
                config.environment,
            )
        };

        metrics::gauge!("rlsgate_kill_switch_active").set(if active { 1.0 } else { 0.0 });
        let context = if active {
            serde_json::json!({ "emergency": true })
        } else {
            serde_json::json!({ "restored": true })
        };
        self.record(
            "KILL_SWITCH",
            active,
            Some(&context),
            UsageSource::Override,
            logging,
            environment,
        );
        self.updates.send_replace(generation);
    }

    pub fn validate(&self) -> Vec<String> {
        self.read().issues()
    }

    /// Re-derive everything from `source`, dropping overrides. Development and test tooling.
    pub fn reinitialize(&self, source: &dyn FlagSource) {
        let mut fresh = FeatureConfig::load(source);
        let (generation, active) = {
            let mut config = self.write();
            fresh.last_update = config.last_update;
            *config = fresh;
            (config.touch(), config.kill_switch_active)
        };

        metrics::gauge!("rlsgate_kill_switch_active").set(if active { 1.0 } else { 0.0 });
        tracing::info!("Feature flags reinitialized");
        self.updates.send_replace(generation);
    }

    pub fn is_dev_environment(&self) -> bool {
        self.environment().allows_overrides()
    }

    pub fn is_strict_mode_enabled(&self) -> bool {
        self.is_enabled(FeatureFlag::RlsStrictMode, None)
    }

    pub fn is_mock_auth_enabled(&self) -> bool {
        self.is_enabled(FeatureFlag::UseMockAuth, None)
            || self.is_enabled(FeatureFlag::MockAuthBypass, None)
    }

    pub fn usage_logs(&self, flag: Option<&str>) -> Vec<FeatureFlagUsageLog> {
        self.usage.entries(flag)
    }

    pub fn clear_usage_logs(&self) {
        self.usage.clear();
    }

    pub fn usage_stats(&self) -> BTreeMap<String, UsageStats> {
        self.usage.stats()
    }

    fn record(
        &self,
        flag: &str,
        value: bool,
        context: Option<&serde_json::Value>,
        source: UsageSource,
        logging: bool,
        environment: Environment,
    ) {
        if !logging {
            return;
        }

        if environment == Environment::Development {
            tracing::debug!(flag, value, source = source.as_str(), "Feature flag evaluated");
        }

        self.usage.push(FeatureFlagUsageLog {
            flag: flag.to_string(),
            value,
            timestamp: Utc::now(),
            context: context.cloned(),
            source,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn store(pairs: &[(&str, &str)]) -> FeatureFlagStore {
        FeatureFlagStore::from_source(&MapSource::from_pairs(pairs.iter().copied()))
    }

    fn env(name: &str) -> (&'static str, String) {
        (source::ENVIRONMENT_KEY, name.to_string())
    }

    fn store_in(environment: &str, extra: &[(&str, &str)]) -> FeatureFlagStore {
        let mut source = MapSource::from_pairs([env(environment)]);
        for (k, v) in extra {
            source.set(*k, *v);
        }
        FeatureFlagStore::from_source(&source)
    }

    #[rstest]
    #[case(Environment::Production, true, false, true, false, true)]
    #[case(Environment::Staging, true, false, false, true, true)]
    #[case(Environment::Development, false, true, false, true, false)]
    #[case(Environment::Test, false, true, false, true, false)]
    fn test_environment_defaults(
        #[case] environment: Environment,
        #[case] rls: bool,
        #[case] mock_auth: bool,
        #[case] strict: bool,
        #[case] override_mode: bool,
        #[case] table: bool,
    ) {
        assert_eq!(environment.flag_default(FeatureFlag::RlsEnabled), rls);
        assert_eq!(environment.flag_default(FeatureFlag::UseMockAuth), mock_auth);
        assert_eq!(environment.flag_default(FeatureFlag::RlsStrictMode), strict);
        assert_eq!(environment.flag_default(FeatureFlag::OverrideMode), override_mode);
        assert_eq!(environment.table_default(), table);
        assert!(!environment.flag_default(FeatureFlag::RlsKillSwitch));
    }

    #[test]
    fn test_production_scenario() {
        let store = store_in("production", &[]);
        assert!(store.is_enabled(FeatureFlag::RlsEnabled, None));
        assert!(!store.is_enabled(FeatureFlag::UseMockAuth, None));
        assert!(store.is_enabled(FeatureFlag::RlsStrictMode, None));
        assert!(store.is_strict_mode_enabled());
        assert!(!store.is_mock_auth_enabled());
    }

    #[test]
    fn test_env_variable_beats_default() {
        let store = store_in(
            "production",
            &[("NEXT_PUBLIC_FEATURE_RLS_ENABLED", "no"), ("NEXT_PUBLIC_RLS_STRICT_MODE", "bogus")],
        );
        assert!(!store.is_enabled(FeatureFlag::RlsEnabled, None));
        // unparseable falls back to the environment default
        assert!(store.is_enabled(FeatureFlag::RlsStrictMode, None));
    }

    #[test]
    fn test_development_unconfigured_table_is_off() {
        let store = store_in(
            "development",
            &[("NEXT_PUBLIC_FEATURE_RLS_ENABLED", "true")],
        );
        assert!(!store.is_rls_enabled_for_table("contact_embeddings"));
    }

    #[test]
    fn test_global_gate_wins_over_tables() {
        let store = store_in(
            "development",
            &[
                ("NEXT_PUBLIC_FEATURE_RLS_ENABLED", "false"),
                ("NEXT_PUBLIC_FEATURE_GRADUAL_RLS_ROLLOUT", "true"),
                ("NEXT_PUBLIC_RLS_TABLE_USERS", "false"),
                ("NEXT_PUBLIC_RLS_TABLE_USER_SESSIONS", "true"),
            ],
        );
        assert!(!store.is_rls_enabled_for_table("users"));
        assert!(!store.is_rls_enabled_for_table("user_sessions"));
    }

    #[test]
    fn test_staging_tables_default_on() {
        let store = store_in("staging", &[]);
        assert!(store.is_enabled(FeatureFlag::RlsEnabled, None));
        assert!(store.is_enabled(FeatureFlag::GradualRlsRollout, None));
        assert!(store.is_rls_enabled_for_table("users"));
        assert!(store.is_rls_enabled_for_table("contacts"));
    }

    #[test]
    fn test_gradual_rollout_off_uses_global_value() {
        let store = store_in(
            "staging",
            &[
                ("NEXT_PUBLIC_FEATURE_GRADUAL_RLS_ROLLOUT", "0"),
                ("NEXT_PUBLIC_RLS_TABLE_USERS", "false"),
            ],
        );
        let global = store.is_enabled(FeatureFlag::RlsEnabled, None);
        for table in RlsTable::KNOWN.iter() {
            assert_eq!(store.is_table_enabled(table, None), global);
        }
        assert!(store.is_rls_enabled_for_table("anything_else"));
    }

    #[test]
    fn test_gradual_rollout_uses_table_setting() {
        let store = store_in(
            "production",
            &[("NEXT_PUBLIC_RLS_TABLE_SYSTEM_LOGS", "false")],
        );
        assert!(!store.is_rls_enabled_for_table("system_logs"));
        assert!(store.is_rls_enabled_for_table("users"));
        // unknown tables take the production table default
        assert!(store.is_rls_enabled_for_table("deals"));
    }

    #[rstest]
    #[case("production")]
    #[case("staging")]
    #[case("development")]
    #[case("test")]
    fn test_kill_switch_disables_every_table(#[case] environment: &str) {
        let store = store_in(
            environment,
            &[
                ("NEXT_PUBLIC_FEATURE_RLS_ENABLED", "true"),
                ("NEXT_PUBLIC_RLS_TABLE_USERS", "true"),
            ],
        );
        store.override_flag(FeatureFlag::RlsEnabled, true);
        store.activate_kill_switch();

        for table in RlsTable::KNOWN.iter() {
            assert!(!store.is_table_enabled(table, None));
        }
        assert!(!store.is_rls_enabled_for_table("unlisted"));
        assert!(!store.is_enabled(FeatureFlag::RlsEnabled, None));
    }

    #[test]
    fn test_kill_switch_reverts_to_override() {
        let store = store_in("test", &[]);
        assert!(store.override_flag(FeatureFlag::RlsEnabled, true));
        assert!(store.is_rls_enabled_for_table("users"));

        store.activate_kill_switch();
        assert!(!store.is_rls_enabled_for_table("users"));

        store.deactivate_kill_switch();
        assert!(store.is_rls_enabled_for_table("users"));
    }

    #[test]
    fn test_kill_switch_initialized_from_source() {
        let store = store_in("production", &[(source::KILL_SWITCH_KEY, "yes")]);
        assert!(store.get_config().kill_switch_active);
        assert!(!store.is_rls_enabled_for_table("users"));
    }

    #[rstest]
    #[case("production")]
    #[case("staging")]
    fn test_override_refused_outside_dev(#[case] environment: &str) {
        let store = store_in(environment, &[("NEXT_PUBLIC_FEATURE_OVERRIDE_MODE", "true")]);
        let before = store.get_config();

        assert!(!store.override_flag(FeatureFlag::RlsEnabled, false));
        assert!(!store.reset());

        let after = store.get_config();
        assert_eq!(before.overrides, after.overrides);
        assert_eq!(before.last_update, after.last_update);
        assert!(store.is_enabled(FeatureFlag::RlsEnabled, None));
    }

    #[test]
    fn test_override_refused_when_mode_off() {
        let store = store_in("development", &[("NEXT_PUBLIC_FEATURE_OVERRIDE_MODE", "false")]);
        assert!(!store.override_flag(FeatureFlag::RlsEnabled, true));
        assert!(store.get_config().overrides.is_empty());
    }

    #[rstest]
    #[case("development")]
    #[case("test")]
    fn test_override_applies_immediately(#[case] environment: &str) {
        let store = store_in(environment, &[]);
        assert!(store.override_flag(FeatureFlag::UseMockAuth, false));
        assert!(!store.is_enabled(FeatureFlag::UseMockAuth, None));
        assert!(store.override_flag(FeatureFlag::UseMockAuth, true));
        assert!(store.is_enabled(FeatureFlag::UseMockAuth, None));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let store = store_in("development", &[]);
        store.override_flag(FeatureFlag::RlsEnabled, true);
        store.override_flag(FeatureFlag::UseMockAuth, false);

        assert!(store.reset());
        assert!(store.get_config().overrides.is_empty());
        for flag in FeatureFlag::ALL {
            assert_eq!(
                store.is_enabled(flag, None),
                Environment::Development.flag_default(flag),
                "{flag}"
            );
        }
    }

    #[test]
    fn test_generation_bumps_and_notifies() {
        let store = store_in("development", &[]);
        let mut rx = store.subscribe();
        let start = store.generation();

        store.override_flag(FeatureFlag::RlsEnabled, true);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), start + 1);

        store.activate_kill_switch();
        store.deactivate_kill_switch();
        assert_eq!(*rx.borrow_and_update(), start + 3);
        assert_eq!(store.generation(), start + 3);
    }

    #[test]
    fn test_validate_reports_rls_disabled_in_production() {
        let store = store_in("production", &[("NEXT_PUBLIC_FEATURE_RLS_ENABLED", "false")]);
        let issues = store.validate();
        assert!(issues.iter().any(|i| i.contains("production")));
    }

    #[test]
    fn test_validate_reports_partial_tables_and_kill_switch() {
        let store = store_in(
            "production",
            &[
                ("NEXT_PUBLIC_RLS_TABLE_USERS", "false"),
                ("NEXT_PUBLIC_FEATURE_USE_MOCK_AUTH", "true"),
            ],
        );
        store.activate_kill_switch();
        let issues = store.validate();

        assert!(issues.iter().any(|i| i.contains("mock auth")));
        assert!(issues.iter().any(|i| i.contains("Kill switch")));
        assert!(issues
            .iter()
            .any(|i| i.contains("1 tables have RLS disabled: users")));
    }

    #[test]
    fn test_validate_clean_production() {
        assert!(store_in("production", &[]).validate().is_empty());
    }

    #[test]
    fn test_usage_logging_respects_flag() {
        let quiet = store_in("test", &[]);
        quiet.is_enabled(FeatureFlag::RlsEnabled, None);
        assert!(quiet.usage_logs(None).is_empty());

        let store = store_in("development", &[]);
        let ctx = serde_json::json!({ "route": "/contacts" });
        store.is_enabled(FeatureFlag::RlsEnabled, Some(&ctx));
        store.is_rls_enabled_for_table("users");

        let logs = store.usage_logs(Some("RLS_ENABLED"));
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].source, UsageSource::Environment);
        assert_eq!(logs[0].context.as_ref(), Some(&ctx));

        let table = store.usage_logs(Some("RLS_TABLE_users"));
        assert_eq!(table[0].source, UsageSource::GlobalDisabled);

        assert_eq!(store.usage_stats()["RLS_ENABLED"].disabled, 1);
        store.clear_usage_logs();
        assert!(store.usage_logs(None).is_empty());
    }

    #[test]
    fn test_reinitialize_drops_overrides() {
        let store = store_in("development", &[]);
        store.override_flag(FeatureFlag::RlsEnabled, true);
        let generation = store.generation();

        store.reinitialize(&MapSource::from_pairs([env("production")]));
        let config = store.get_config();
        assert_eq!(config.environment, Environment::Production);
        assert!(config.overrides.is_empty());
        assert!(config.last_update > generation);
        assert!(!store.is_dev_environment());
    }

    #[test]
    fn test_default_environment_is_development() {
        let store = store(&[]);
        assert_eq!(store.environment(), Environment::Development);
        assert!(store.is_dev_environment());
        assert!(store.is_mock_auth_enabled());
    }

    #[test]
    fn test_flag_names() {
        assert_eq!("rls_enabled".parse::<FeatureFlag>().unwrap(), FeatureFlag::RlsEnabled);
        assert_eq!(
            "FEATURE_FLAG_OVERRIDE_MODE".parse::<FeatureFlag>().unwrap(),
            FeatureFlag::OverrideMode
        );
        assert!("NOPE".parse::<FeatureFlag>().is_err());
        assert_eq!(
            serde_json::to_string(&FeatureFlag::OverrideMode).unwrap(),
            "\"FEATURE_FLAG_OVERRIDE_MODE\""
        );
        assert_eq!(
            serde_json::to_string(&FeatureFlag::GradualRlsRollout).unwrap(),
            "\"GRADUAL_RLS_ROLLOUT\""
        );
    }

    #[test]
    fn test_table_names() {
        assert_eq!(RlsTable::from_name("users"), RlsTable::Users);
        assert_eq!(RlsTable::Users.env_key(), "NEXT_PUBLIC_RLS_TABLE_USERS");
        let unknown = RlsTable::from_name("deals");
        assert!(!unknown.is_known());
        assert_eq!(unknown.name(), "deals");
    }

    #[test]
    fn test_config_serializes_camel_case() {
        let value = serde_json::to_value(store_in("production", &[]).get_config()).unwrap();
        assert_eq!(value["environment"], "production");
        assert_eq!(value["killSwitchActive"], false);
        assert_eq!(value["flags"]["RLS_ENABLED"], true);
        assert_eq!(value["tableRls"]["users"], true);
    }
}
