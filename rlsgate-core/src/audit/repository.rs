//! Audit storage

use super::{AuthEvent, SecurityEvent};
use crate::client::DataClient;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub const AUDIT_LOG_TABLE: &str = "audit_logs";
pub const SECURITY_EVENT_TABLE: &str = "security_events";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn create_auth_event(&self, event: &AuthEvent) -> Result<()>;
    async fn create_security_event(&self, event: &SecurityEvent) -> Result<()>;
}

/// Writes audit rows through the backend's REST interface
pub struct RestAuditRepository {
    client: Arc<dyn DataClient>,
}

impl RestAuditRepository {
    pub fn new(client: Arc<dyn DataClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuditRepository for RestAuditRepository {
    async fn create_auth_event(&self, event: &AuthEvent) -> Result<()> {
        let row = serde_json::to_value(event).map_err(anyhow::Error::from)?;
        self.client.insert_row(AUDIT_LOG_TABLE, row).await
    }

    async fn create_security_event(&self, event: &SecurityEvent) -> Result<()> {
        let row = serde_json::to_value(event).map_err(anyhow::Error::from)?;
        self.client.insert_row(SECURITY_EVENT_TABLE, row).await
    }
}
