//! Best-effort audit and security-event logging
//!
//! Failures here are logged and swallowed; they never change an
//! authorization outcome.

pub mod repository;

pub use repository::{AuditRepository, RestAuditRepository};

use crate::domain::{OrganizationId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventType {
    Login,
    Logout,
    TokenRefresh,
    PermissionDenied,
    InvalidToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    RlsViolation,
    UnauthorizedAccess,
    PermissionDenied,
    RateLimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl SecurityEventType {
    pub fn severity(&self) -> Severity {
        match self {
            SecurityEventType::RlsViolation | SecurityEventType::UnauthorizedAccess => {
                Severity::High
            }
            SecurityEventType::PermissionDenied => Severity::Medium,
            SecurityEventType::RateLimitExceeded => Severity::Low,
        }
    }
}

/// Row of `audit_logs`
#[derive(Debug, Clone, Serialize)]
pub struct AuthEvent {
    pub event_type: AuthEventType,
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuthEvent {
    pub fn new(
        event_type: AuthEventType,
        user_id: UserId,
        organization_id: OrganizationId,
        event_data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            user_id,
            organization_id,
            event_data,
            created_at: Utc::now(),
        }
    }
}

/// Row of `security_events`
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub event_type: SecurityEventType,
    pub event_data: serde_json::Value,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(event_type: SecurityEventType, event_data: serde_json::Value) -> Self {
        Self {
            event_type,
            event_data,
            severity: event_type.severity(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct AuditService {
    repo: Arc<dyn AuditRepository>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    pub async fn log_auth_event(
        &self,
        event_type: AuthEventType,
        user_id: UserId,
        organization_id: OrganizationId,
        details: Option<serde_json::Value>,
    ) {
        let event = AuthEvent::new(event_type, user_id, organization_id, details);
        if let Err(e) = self.repo.create_auth_event(&event).await {
            tracing::error!(error = %e, event_type = ?event_type, "Failed to log auth event");
        }
    }

    pub async fn log_security_event(&self, event_type: SecurityEventType, details: serde_json::Value) {
        let event = SecurityEvent::new(event_type, details);
        tracing::warn!(
            event_type = ?event_type,
            severity = ?event.severity,
            "Security event"
        );
        if let Err(e) = self.repo.create_security_event(&event).await {
            tracing::error!(error = %e, event_type = ?event_type, "Failed to log security event");
        }
    }
}
