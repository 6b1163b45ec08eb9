//! REST client for the backend-as-a-service
//!
//! Identity lives under `/auth/v1`, table rows under `/rest/v1` with
//! PostgREST filter syntax.

use super::query::{QueryFilter, RestQuery};
use super::DataClient;
use crate::config::BaasConfig;
use crate::domain::token::peek_claims;
use crate::domain::{AuthSession, Organization, OrganizationId, SessionUser, UserId, UserProfile};
use crate::error::{AppError, Result};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone)]
pub struct BaasClient {
    config: BaasConfig,
    http_client: Client,
    /// Caller's access token; row queries then run under the caller's identity
    access_token: Option<String>,
}

impl BaasClient {
    pub fn new(config: BaasConfig) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
            access_token: None,
        })
    }

    /// Copy of this client acting on behalf of `access_token`
    pub fn with_token(&self, access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..self.clone()
        }
    }

    /// Copy of this client authenticated with the public key only
    pub fn anonymous(&self) -> Self {
        self.with_token(self.config.anon_key.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.config.url
    }

    fn bearer(&self) -> &str {
        self.access_token
            .as_deref()
            .or(self.config.service_role_key.as_deref())
            .unwrap_or(&self.config.anon_key)
    }

    fn service_bearer(&self) -> &str {
        self.config
            .service_role_key
            .as_deref()
            .unwrap_or_else(|| self.bearer())
    }

    async fn select<T: DeserializeOwned>(&self, query: RestQuery) -> Result<Vec<T>> {
        let url = format!("{}/rest/v1/{}", self.config.url, query.table());

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
            .query(&query.to_query_pairs())
            .send()
            .await
            .map_err(|e| AppError::database(format!("Failed to query {}: {}", query.table(), e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::database(format!(
                "Failed to query {}: {} - {}",
                query.table(),
                status,
                body
            )));
        }

        response.json().await.map_err(|e| {
            AppError::database(format!("Failed to parse {} rows: {}", query.table(), e))
        })
    }
}

#[derive(Deserialize)]
struct OrganizationRef {
    organization_id: Option<OrganizationId>,
}

#[async_trait]
impl DataClient for BaasClient {
    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>> {
        let url = format!("{}/auth/v1/user", self.config.url);

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Unauthorized(format!("Session exchange failed: {}", e)))?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Unauthorized(format!(
                "Session exchange failed: {} - {}",
                status, body
            )));
        }

        let user: SessionUser = response
            .json()
            .await
            .map_err(|e| AppError::Unauthorized(format!("Invalid session payload: {}", e)))?;

        Ok(Some(AuthSession {
            user,
            expires_at: peek_claims(access_token).and_then(|c| c.exp),
        }))
    }

    async fn find_user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        let rows: Vec<UserProfile> = self
            .select(
                RestQuery::new("users")
                    .select("id,organization_id,role")
                    .eq("id", &user_id.to_string())
                    .limit(1),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_organization(&self, id: OrganizationId) -> Result<Option<Organization>> {
        let rows: Vec<Organization> = self
            .select(
                RestQuery::new("organizations")
                    .select("id,name,created_at")
                    .eq("id", &id.to_string())
                    .limit(1),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_resource_organization(
        &self,
        table: &str,
        resource_id: &str,
    ) -> Result<Option<OrganizationId>> {
        let rows: Vec<OrganizationRef> = self
            .select(
                RestQuery::new(table)
                    .select("organization_id")
                    .eq("id", resource_id)
                    .limit(1),
            )
            .await?;
        Ok(rows.into_iter().next().and_then(|r| r.organization_id))
    }

    async fn insert_row(&self, table: &str, row: serde_json::Value) -> Result<()> {
        let url = format!("{}/rest/v1/{}", self.config.url, table);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.config.anon_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(self.service_bearer())
            .json(&row)
            .send()
            .await
            .map_err(|e| AppError::database(format!("Failed to insert into {}: {}", table, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::database(format!(
                "Failed to insert into {}: {} - {}",
                table, status, body
            )));
        }

        Ok(())
    }
}
