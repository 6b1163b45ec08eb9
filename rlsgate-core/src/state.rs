//! Shared application state
//!
//! Everything a request needs is constructed once at startup and handed to
//! the router; there is no process-global state.

use crate::audit::{AuditService, RestAuditRepository};
use crate::client::{BaasClient, ClientFactory};
use crate::config::Config;
use crate::context::ContextResolver;
use crate::flags::FeatureFlagStore;
use crate::middleware::RateLimiter;
use crate::policy::PolicyGate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub flags: Arc<FeatureFlagStore>,
    pub resolver: Arc<ContextResolver>,
    pub gate: PolicyGate,
    pub clients: Arc<dyn ClientFactory>,
    pub audit: AuditService,
    pub rate_limiter: RateLimiter,
    /// Present when the Prometheus recorder is installed
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the state from its collaborators. Audit rows are written with
    /// the factory's service client.
    pub fn new(
        config: Config,
        flags: Arc<FeatureFlagStore>,
        clients: Arc<dyn ClientFactory>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        let audit = AuditService::new(Arc::new(RestAuditRepository::new(clients.service())));
        let rate_limiter = RateLimiter::new(config.rate_limit.clone());

        Self {
            config: Arc::new(config),
            resolver: Arc::new(ContextResolver::new(flags.clone())),
            gate: PolicyGate::new(flags.clone()),
            flags,
            clients,
            audit,
            rate_limiter,
            metrics_handle,
        }
    }

    /// Production wiring: flags from the process environment, data through the REST backend
    pub fn from_config(
        config: Config,
        metrics_handle: Option<PrometheusHandle>,
    ) -> anyhow::Result<Self> {
        let client = BaasClient::new(config.baas.clone())?;
        let flags = Arc::new(FeatureFlagStore::from_env());
        Ok(Self::new(config, flags, Arc::new(client), metrics_handle))
    }

    /// Replace the audit sink, e.g. with an in-memory one in tests
    pub fn with_audit(mut self, audit: AuditService) -> Self {
        self.audit = audit;
        self
    }
}
