//! RLS context resolution
//!
//! Maps an authenticated user to the organization and role every
//! authorization decision is scoped to. Organization lookups are cached for
//! five minutes; role lookups always hit the backend.

pub mod cache;

pub use cache::{OrganizationCache, ORGANIZATION_CACHE_TTL};

use crate::client::DataClient;
use crate::domain::{
    AccessDecision, Organization, OrganizationId, UserId, UserRole, MOCK_ORGANIZATION_ID,
};
use crate::error::{AppError, Result};
use crate::flags::{FeatureFlag, FeatureFlagStore};
use serde::Serialize;
use std::sync::Arc;

/// Per-request authorization context. Never shared across requests.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RlsContext {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub user_role: UserRole,
    /// Client acting as the authenticated caller
    #[serde(skip)]
    pub client: Arc<dyn DataClient>,
    pub is_mock_context: bool,
}

impl std::fmt::Debug for RlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RlsContext")
            .field("user_id", &self.user_id)
            .field("organization_id", &self.organization_id)
            .field("user_role", &self.user_role)
            .field("is_mock_context", &self.is_mock_context)
            .finish()
    }
}

impl RlsContext {
    pub fn is_admin(&self) -> bool {
        self.user_role == UserRole::Admin
    }

    pub fn is_manager(&self) -> bool {
        matches!(self.user_role, UserRole::Admin | UserRole::Manager)
    }
}

pub struct ContextResolver {
    flags: Arc<FeatureFlagStore>,
    cache: OrganizationCache,
}

impl ContextResolver {
    pub fn new(flags: Arc<FeatureFlagStore>) -> Self {
        Self::with_cache(flags, OrganizationCache::new())
    }

    pub fn with_cache(flags: Arc<FeatureFlagStore>, cache: OrganizationCache) -> Self {
        Self { flags, cache }
    }

    pub fn flags(&self) -> &Arc<FeatureFlagStore> {
        &self.flags
    }

    pub fn cache(&self) -> &OrganizationCache {
        &self.cache
    }

    /// Organization of `user_id`. Mock auth returns the fixed mock organization without a lookup.
    pub async fn get_user_organization_id(
        &self,
        client: &dyn DataClient,
        user_id: UserId,
    ) -> Result<OrganizationId> {
        if self.flags.is_mock_auth_enabled() {
            tracing::debug!(%user_id, "Mock auth enabled, using mock organization");
            return Ok(MOCK_ORGANIZATION_ID);
        }

        if let Some(organization_id) = self.cache.get(&user_id) {
            return Ok(organization_id);
        }
        metrics::counter!("rlsgate_org_cache_total", "result" => "miss").increment(1);

        let profile = client
            .find_user_profile(user_id)
            .await
            .map_err(|e| {
                AppError::UserNotFound(format!("Failed to fetch user organization: {}", e))
            })?
            .ok_or_else(|| AppError::UserNotFound(format!("User {} not found", user_id)))?;

        let organization_id = profile.organization_id.ok_or_else(|| {
            AppError::OrganizationNotFound("User does not belong to any organization".to_string())
        })?;

        self.cache.insert(user_id, organization_id);
        Ok(organization_id)
    }

    pub async fn get_user_role(&self, client: &dyn DataClient, user_id: UserId) -> Result<UserRole> {
        let profile = client
            .find_user_profile(user_id)
            .await
            .map_err(|e| AppError::UserNotFound(format!("Failed to fetch user role: {}", e)))?
            .ok_or_else(|| AppError::UserNotFound(format!("User {} not found", user_id)))?;

        let raw = profile.role.unwrap_or_default();
        raw.parse().map_err(|_| AppError::Rls {
            code: "INVALID_ROLE",
            message: format!("User {} has unrecognized role '{}'", user_id, raw),
        })
    }

    /// Build the context for one request.
    ///
    /// With RLS globally off this never fails: the caller gets a mock context
    /// bound to the fixed mock organization.
    pub async fn get_rls_context(
        &self,
        client: Arc<dyn DataClient>,
        user_id: UserId,
    ) -> Result<RlsContext> {
        if !self.flags.is_enabled(FeatureFlag::RlsEnabled, None) {
            tracing::debug!(%user_id, "RLS disabled, returning mock context");
            return Ok(Self::mock_context(
                client,
                user_id,
                MOCK_ORGANIZATION_ID,
                UserRole::Rep,
            ));
        }

        self.resolve_context(client, user_id).await
    }

    /// Look up organization and role regardless of the global RLS flag.
    ///
    /// Used by routes that stay enforced while RLS is off, such as the kill
    /// switch itself.
    pub async fn resolve_context(
        &self,
        client: Arc<dyn DataClient>,
        user_id: UserId,
    ) -> Result<RlsContext> {
        let (organization_id, user_role) = tokio::try_join!(
            self.get_user_organization_id(client.as_ref(), user_id),
            self.get_user_role(client.as_ref(), user_id),
        )?;

        Ok(RlsContext {
            user_id,
            organization_id,
            user_role,
            client,
            is_mock_context: self.flags.is_mock_auth_enabled(),
        })
    }

    /// Whether `user_id` belongs to `organization_id`. Any failure is `Denied`.
    pub async fn validate_user_organization(
        &self,
        client: &dyn DataClient,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessDecision {
        match self.get_user_organization_id(client, user_id).await {
            Ok(actual) => AccessDecision::from(actual == organization_id),
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "Organization membership check failed");
                AccessDecision::Denied
            }
        }
    }

    pub async fn get_organization_details(
        &self,
        client: &dyn DataClient,
        organization_id: OrganizationId,
    ) -> Result<Organization> {
        client
            .find_organization(organization_id)
            .await
            .map_err(|e| AppError::OrganizationNotFound(format!("Organization not found: {}", e)))?
            .ok_or_else(|| {
                AppError::OrganizationNotFound(format!(
                    "Organization {} not found",
                    organization_id
                ))
            })
    }

    /// Drop the cached organization of one user after their assignment changed
    pub fn clear_user_cache(&self, user_id: &UserId) {
        self.cache.clear_user(user_id);
    }

    pub fn clear_all_cache(&self) {
        self.cache.clear_all();
    }

    pub fn mock_context(
        client: Arc<dyn DataClient>,
        user_id: UserId,
        organization_id: OrganizationId,
        user_role: UserRole,
    ) -> RlsContext {
        RlsContext {
            user_id,
            organization_id,
            user_role,
            client,
            is_mock_context: true,
        }
    }
}
