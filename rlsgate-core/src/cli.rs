//! Command line interface

use crate::domain::OrganizationId;
use crate::flags::FeatureFlagStore;
use crate::policy::{build_policy, render_policy_sql, PolicyCondition, PolicyOperation};
use clap::{Args, Parser, Subcommand};

/// Organization-scoped row level security gate
#[derive(Parser, Debug)]
#[command(name = "rlsgate-core", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print the CREATE POLICY statement for one table and operation
    RenderPolicy(RenderPolicyArgs),
    /// Print the resolved feature flags and exit non-zero on configuration issues
    ValidateFlags,
}

#[derive(Args, Debug)]
pub struct RenderPolicyArgs {
    #[arg(long)]
    pub table: String,

    /// select, insert, update or delete
    #[arg(long)]
    pub operation: PolicyOperation,

    #[arg(long, value_parser = OrganizationId::parse_str)]
    pub organization_id: OrganizationId,

    /// Extra condition as `column:operator:value`, e.g. `status:in:open,won`
    #[arg(long = "condition", value_parser = PolicyCondition::parse)]
    pub conditions: Vec<PolicyCondition>,

    /// Policy name, defaults to `<table>_<operation>_policy`
    #[arg(long)]
    pub name: Option<String>,
}

impl RenderPolicyArgs {
    pub fn render(&self) -> String {
        let mut policy = build_policy(
            &self.table,
            self.operation,
            self.organization_id,
            self.conditions.clone(),
        );
        if let Some(name) = &self.name {
            policy = policy.with_name(name);
        }
        render_policy_sql(&policy)
    }
}

/// Report of `validate-flags`; `Err` carries the report when issues were found
pub fn validate_flags(store: &FeatureFlagStore) -> Result<String, String> {
    let config = store.get_config();
    let issues = store.validate();

    let mut report = format!("environment: {}\n", config.environment.as_str());
    report.push_str(&format!("kill switch: {}\n", config.kill_switch_active));
    for (flag, value) in &config.flags {
        report.push_str(&format!("{}: {}\n", flag, value));
    }
    for (table, value) in &config.table_rls {
        report.push_str(&format!("table {}: {}\n", table, value));
    }

    if issues.is_empty() {
        report.push_str("no issues\n");
        Ok(report)
    } else {
        for issue in &issues {
            report.push_str(&format!("issue: {}\n", issue));
        }
        Err(report)
    }
}
