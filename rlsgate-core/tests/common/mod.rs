//! Common test utilities
//!
//! In-memory stand-ins for the backend so router and middleware tests run
//! without network access.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header::AUTHORIZATION, Request, Response};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rlsgate_core::client::{ClientFactory, DataClient};
use rlsgate_core::config::{BaasConfig, Config};
use rlsgate_core::domain::{
    AuthSession, Organization, OrganizationId, SessionUser, UserId, UserProfile,
};
use rlsgate_core::error::{AppError, Result};
pub use rlsgate_core::flags::source::ENVIRONMENT_KEY;
use rlsgate_core::flags::{FeatureFlagStore, MapSource};
use rlsgate_core::server::build_router;
use rlsgate_core::state::AppState;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceExt;

// ============================================================================
// Test Configuration
// ============================================================================

pub fn test_config() -> Config {
    Config::with_baas(BaasConfig {
        url: "http://baas.test".to_string(),
        anon_key: "anon-key".to_string(),
        service_role_key: None,
        timeout_secs: 1,
    })
}

pub fn flag_store(pairs: &[(&str, &str)]) -> Arc<FeatureFlagStore> {
    Arc::new(FeatureFlagStore::from_source(&MapSource::from_pairs(
        pairs.iter().copied(),
    )))
}

/// Unsigned JWT-shaped token carrying `sub`
pub fn make_token(sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": sub }).to_string());
    format!("{}.{}.sig", header, payload)
}

// ============================================================================
// Fake backend
// ============================================================================

#[derive(Default)]
pub struct FakeDataClient {
    sessions: RwLock<HashMap<String, AuthSession>>,
    profiles: RwLock<HashMap<UserId, UserProfile>>,
    organizations: RwLock<HashMap<OrganizationId, Organization>>,
    inserted: RwLock<Vec<(String, serde_json::Value)>>,
    /// When set, every profile lookup fails
    profiles_down: RwLock<bool>,
}

impl FakeDataClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with a live session and return their bearer token
    pub async fn add_user(&self, organization_id: Option<OrganizationId>, role: &str) -> (UserId, String) {
        let user_id = UserId::new_v4();
        let token = make_token(&user_id.to_string());

        self.sessions.write().await.insert(
            token.clone(),
            AuthSession {
                user: SessionUser {
                    id: user_id,
                    email: Some(format!("{}@example.com", role)),
                },
                expires_at: None,
            },
        );
        self.profiles.write().await.insert(
            user_id,
            UserProfile {
                id: Some(user_id),
                organization_id,
                role: Some(role.to_string()),
            },
        );
        (user_id, token)
    }

    pub async fn set_profiles_down(&self, down: bool) {
        *self.profiles_down.write().await = down;
    }

    pub async fn inserted(&self, table: &str) -> Vec<serde_json::Value> {
        self.inserted
            .read()
            .await
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, row)| row.clone())
            .collect()
    }
}

#[async_trait]
impl DataClient for FakeDataClient {
    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>> {
        Ok(self.sessions.read().await.get(access_token).cloned())
    }

    async fn find_user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        if *self.profiles_down.read().await {
            return Err(AppError::database("connection refused"));
        }
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn find_organization(&self, id: OrganizationId) -> Result<Option<Organization>> {
        Ok(self.organizations.read().await.get(&id).cloned())
    }

    async fn find_resource_organization(
        &self,
        _table: &str,
        _resource_id: &str,
    ) -> Result<Option<OrganizationId>> {
        Ok(None)
    }

    async fn insert_row(&self, table: &str, row: serde_json::Value) -> Result<()> {
        self.inserted.write().await.push((table.to_string(), row));
        Ok(())
    }
}

pub struct FakeClients(pub Arc<FakeDataClient>);

impl ClientFactory for FakeClients {
    fn for_token(&self, _access_token: &str) -> Arc<dyn DataClient> {
        self.0.clone()
    }

    fn anonymous(&self) -> Arc<dyn DataClient> {
        self.0.clone()
    }

    fn service(&self) -> Arc<dyn DataClient> {
        self.0.clone()
    }
}

// ============================================================================
// Test application
// ============================================================================

pub struct TestApp {
    pub state: AppState,
    pub backend: Arc<FakeDataClient>,
}

impl TestApp {
    pub fn new(flag_pairs: &[(&str, &str)]) -> Self {
        Self::with_config(flag_pairs, test_config())
    }

    pub fn with_config(flag_pairs: &[(&str, &str)], config: Config) -> Self {
        let backend = Arc::new(FakeDataClient::new());
        let state = AppState::new(
            config,
            flag_store(flag_pairs),
            Arc::new(FakeClients(backend.clone())),
            None,
        );
        Self { state, backend }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        self.send(request("GET", uri, token, None)).await
    }
}

pub fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
