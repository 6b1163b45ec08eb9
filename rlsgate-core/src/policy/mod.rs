//! Policy gate: decides per table whether a query gets the organization filter

pub mod model;

pub use model::{
    build_policy, render_policy_sql, PolicyCondition, PolicyOperation, PolicyOperator,
    PolicyValue, RlsPolicy,
};

use crate::client::QueryFilter;
use crate::context::RlsContext;
use crate::domain::AccessDecision;
use crate::flags::{FeatureFlag, FeatureFlagStore, RlsTable};
use std::sync::Arc;

/// Column every organization-scoped table carries
pub const ORGANIZATION_COLUMN: &str = "organization_id";

#[derive(Debug, Clone)]
pub struct PolicyGate {
    flags: Arc<FeatureFlagStore>,
}

impl PolicyGate {
    pub fn new(flags: Arc<FeatureFlagStore>) -> Self {
        Self { flags }
    }

    /// Single decision point for filtering. Evaluated fresh on every call.
    ///
    /// `operation` is accepted for future per-operation policy and does not
    /// affect the result yet.
    pub fn should_bypass(&self, table: Option<&str>, operation: Option<PolicyOperation>) -> bool {
        let _ = operation;

        if !self.flags.is_enabled(FeatureFlag::RlsEnabled, None) {
            return true;
        }

        match table {
            Some(name) => !self.flags.is_table_enabled(&RlsTable::from_name(name), None),
            None => false,
        }
    }

    /// Append `organization_id = <ctx org>` unless filtering is bypassed.
    ///
    /// No deduplication: call exactly once per query.
    pub fn apply_context<Q: QueryFilter>(&self, query: Q, ctx: &RlsContext, table: Option<&str>) -> Q {
        self.create_rls_query(query, ctx, table, None)
    }

    /// [`Self::apply_context`] with the operation forwarded to [`Self::should_bypass`]
    pub fn create_rls_query<Q: QueryFilter>(
        &self,
        query: Q,
        ctx: &RlsContext,
        table: Option<&str>,
        operation: Option<PolicyOperation>,
    ) -> Q {
        if self.should_bypass(table, operation) {
            tracing::debug!(table = table.unwrap_or("-"), "RLS bypassed");
            return query;
        }

        tracing::debug!(
            table = table.unwrap_or("-"),
            organization_id = %ctx.organization_id,
            is_mock = ctx.is_mock_context,
            "Applying organization filter"
        );
        query.eq(ORGANIZATION_COLUMN, &ctx.organization_id.to_string())
    }

    /// Whether `resource_id` in `table` belongs to the context's organization.
    ///
    /// Lookup failures and missing rows are `Denied`, never an error.
    pub async fn validate_resource_ownership(
        &self,
        ctx: &RlsContext,
        table: &str,
        resource_id: &str,
    ) -> AccessDecision {
        match ctx.client.find_resource_organization(table, resource_id).await {
            Ok(Some(owner)) => AccessDecision::from(owner == ctx.organization_id),
            Ok(None) => AccessDecision::Denied,
            Err(e) => {
                tracing::warn!(table, resource_id, error = %e, "Ownership lookup failed");
                AccessDecision::Denied
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockDataClient, RestQuery};
    use crate::context::ContextResolver;
    use crate::domain::{OrganizationId, UserId, UserRole};
    use crate::error::AppError;
    use crate::flags::{source::ENVIRONMENT_KEY, MapSource};

    fn gate(pairs: &[(&str, &str)]) -> (PolicyGate, Arc<FeatureFlagStore>) {
        let flags = Arc::new(FeatureFlagStore::from_source(&MapSource::from_pairs(
            pairs.iter().copied(),
        )));
        (PolicyGate::new(flags.clone()), flags)
    }

    fn ctx_with(client: MockDataClient, org: OrganizationId) -> RlsContext {
        ContextResolver::mock_context(Arc::new(client), UserId::new_v4(), org, UserRole::Rep)
    }

    #[test]
    fn test_apply_context_passthrough_when_table_disabled() {
        let (gate, _) = gate(&[
            (ENVIRONMENT_KEY, "production"),
            ("NEXT_PUBLIC_RLS_TABLE_USERS", "false"),
        ]);
        let ctx = ctx_with(MockDataClient::new(), OrganizationId::new_v4());

        let query = RestQuery::new("users");
        assert_eq!(gate.apply_context(query.clone(), &ctx, Some("users")), query);
    }

    #[test]
    fn test_apply_context_adds_filter_when_enabled() {
        let (gate, _) = gate(&[(ENVIRONMENT_KEY, "production")]);
        let org = OrganizationId::new_v4();
        let ctx = ctx_with(MockDataClient::new(), org);

        let query = gate.apply_context(RestQuery::new("users"), &ctx, Some("users"));
        assert_eq!(
            query.filters(),
            &[("organization_id".to_string(), format!("eq.{}", org))]
        );
    }

    #[test]
    fn test_bypass_follows_flag_changes_immediately() {
        let (gate, flags) = gate(&[(ENVIRONMENT_KEY, "production")]);
        assert!(!gate.should_bypass(Some("users"), Some(PolicyOperation::Select)));
        assert!(!gate.should_bypass(None, None));

        flags.activate_kill_switch();
        assert!(gate.should_bypass(Some("users"), Some(PolicyOperation::Delete)));
        assert!(gate.should_bypass(None, None));

        flags.deactivate_kill_switch();
        assert!(!gate.should_bypass(Some("users"), None));
    }

    #[test]
    fn test_staging_filters_unconfigured_tables() {
        let (gate, _) = gate(&[(ENVIRONMENT_KEY, "staging")]);
        assert!(!gate.should_bypass(Some("contacts"), None));
        assert!(!gate.should_bypass(Some("users"), Some(PolicyOperation::Select)));

        let org = OrganizationId::new_v4();
        let ctx = ctx_with(MockDataClient::new(), org);
        let query = gate.apply_context(RestQuery::new("contacts"), &ctx, Some("contacts"));
        assert!(query.has_filter(ORGANIZATION_COLUMN));
    }

    #[test]
    fn test_operation_does_not_change_decision() {
        let (gate, _) = gate(&[
            (ENVIRONMENT_KEY, "production"),
            ("NEXT_PUBLIC_RLS_TABLE_SYSTEM_LOGS", "false"),
        ]);
        for op in [
            PolicyOperation::Select,
            PolicyOperation::Insert,
            PolicyOperation::Update,
            PolicyOperation::Delete,
        ] {
            assert!(gate.should_bypass(Some("system_logs"), Some(op)));
            assert!(!gate.should_bypass(Some("users"), Some(op)));
        }
    }

    #[test]
    fn test_global_off_bypasses_everything() {
        let (gate, _) = gate(&[(ENVIRONMENT_KEY, "development")]);
        let ctx = ctx_with(MockDataClient::new(), OrganizationId::new_v4());

        let query = gate.create_rls_query(
            RestQuery::new("contacts"),
            &ctx,
            Some("contacts"),
            Some(PolicyOperation::Select),
        );
        assert!(!query.has_filter(ORGANIZATION_COLUMN));
    }

    #[tokio::test]
    async fn test_resource_ownership() {
        let (gate, _) = gate(&[(ENVIRONMENT_KEY, "production")]);
        let org = OrganizationId::new_v4();

        let mut client = MockDataClient::new();
        client
            .expect_find_resource_organization()
            .returning(move |_, id| match id {
                "mine" => Ok(Some(org)),
                "theirs" => Ok(Some(OrganizationId::new_v4())),
                "gone" => Ok(None),
                _ => Err(AppError::database("timeout")),
            });
        let ctx = ctx_with(client, org);

        assert_eq!(
            gate.validate_resource_ownership(&ctx, "contacts", "mine").await,
            AccessDecision::Allowed
        );
        for id in ["theirs", "gone", "broken"] {
            assert_eq!(
                gate.validate_resource_ownership(&ctx, "contacts", id).await,
                AccessDecision::Denied
            );
        }
    }
}
