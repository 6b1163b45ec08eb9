//! Bounded diagnostic log of flag evaluations

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// Once the log grows past this many entries it is truncated
const MAX_ENTRIES: usize = 1000;
/// Entries kept after truncation (the most recent ones)
const RETAINED_ENTRIES: usize = 500;

/// Where an evaluated value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsageSource {
    Environment,
    Override,
    Default,
    KillSwitch,
    GlobalDisabled,
    GlobalRollout,
    TableSpecific,
}

impl UsageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageSource::Environment => "environment",
            UsageSource::Override => "override",
            UsageSource::Default => "default",
            UsageSource::KillSwitch => "kill-switch",
            UsageSource::GlobalDisabled => "global-disabled",
            UsageSource::GlobalRollout => "global-rollout",
            UsageSource::TableSpecific => "table-specific",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureFlagUsageLog {
    pub flag: String,
    pub value: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    pub source: UsageSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub enabled: u64,
    pub disabled: u64,
    pub total: u64,
}

/// Append-only ring of evaluations. Never consulted for decisions.
#[derive(Debug, Default)]
pub struct UsageLog {
    entries: Mutex<VecDeque<FeatureFlagUsageLog>>,
}

impl UsageLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<FeatureFlagUsageLog>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, entry: FeatureFlagUsageLog) {
        let mut entries = self.lock();
        entries.push_back(entry);

        if entries.len() > MAX_ENTRIES {
            let excess = entries.len() - RETAINED_ENTRIES;
            entries.drain(..excess);
        }
    }

    /// Snapshot of the log, optionally restricted to one flag name
    pub fn entries(&self, flag: Option<&str>) -> Vec<FeatureFlagUsageLog> {
        self.lock()
            .iter()
            .filter(|e| flag.map_or(true, |f| e.flag == f))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Per-flag counts of enabled and disabled evaluations
    pub fn stats(&self) -> BTreeMap<String, UsageStats> {
        let mut stats: BTreeMap<String, UsageStats> = BTreeMap::new();
        for entry in self.lock().iter() {
            let s = stats.entry(entry.flag.clone()).or_default();
            if entry.value {
                s.enabled += 1;
            } else {
                s.disabled += 1;
            }
            s.total += 1;
        }
        stats
    }
}
