//! Session models returned by the identity provider

use super::common::{OrganizationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated user as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Session obtained by exchanging a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: SessionUser,
    /// Expiry as unix seconds, when the provider reports one
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl AuthSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|exp| exp < now.timestamp())
            .unwrap_or(false)
    }
}

/// Outcome of a successful session validation
#[derive(Debug, Clone, Serialize)]
pub struct AuthValidation {
    pub user: SessionUser,
    pub expires_at: Option<i64>,
    /// Best-effort enrichment, absent when the profile lookup failed
    pub organization_id: Option<OrganizationId>,
    pub user_role: Option<String>,
}
