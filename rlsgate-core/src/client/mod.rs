//! Collaborator seam towards the identity and data backend

pub mod baas;
pub mod query;

pub use baas::BaasClient;
pub use query::{QueryFilter, RestQuery};

use crate::domain::{AuthSession, Organization, OrganizationId, UserId, UserProfile};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Lookups the gate needs from the backend.
///
/// `Ok(None)` means the backend answered and found nothing; `Err` means the
/// lookup itself failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataClient: Send + Sync {
    /// Exchange a bearer token for a session
    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>>;

    /// Organization and role of a user
    async fn find_user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>>;

    async fn find_organization(&self, id: OrganizationId) -> Result<Option<Organization>>;

    /// `organization_id` column of one row of `table`
    async fn find_resource_organization(
        &self,
        table: &str,
        resource_id: &str,
    ) -> Result<Option<OrganizationId>>;

    /// Append a row, used by the audit sinks
    async fn insert_row(&self, table: &str, row: serde_json::Value) -> Result<()>;
}

/// Hands out clients bound to one caller's credentials
pub trait ClientFactory: Send + Sync {
    /// Client acting as the bearer of `access_token`
    fn for_token(&self, access_token: &str) -> Arc<dyn DataClient>;

    /// Client acting with the public key only, no caller identity
    fn anonymous(&self) -> Arc<dyn DataClient>;

    /// Client acting with the gate's own credentials
    fn service(&self) -> Arc<dyn DataClient>;
}

impl ClientFactory for BaasClient {
    fn for_token(&self, access_token: &str) -> Arc<dyn DataClient> {
        Arc::new(self.with_token(access_token))
    }

    fn anonymous(&self) -> Arc<dyn DataClient> {
        Arc::new(BaasClient::anonymous(self))
    }

    fn service(&self) -> Arc<dyn DataClient> {
        Arc::new(self.clone())
    }
}
