//! Route protection: authentication, organization context and permissions
//!
//! [`validate_rls_middleware`] runs the whole decision for one request and
//! reports it as an [`RlsMiddlewareResult`]; [`rls_middleware`] adapts it to
//! axum and hands the resolved [`RlsContext`] to the handler.

use super::rate_limit::client_identifier;
use super::token::{ensure_jwt_shape, extract_bearer_token, validate_session};
use crate::audit::{AuditService, AuthEventType, SecurityEventType};
use crate::context::{ContextResolver, RlsContext};
use crate::domain::{AuthValidation, OrganizationId, UserRole, MOCK_ORGANIZATION_ID, MOCK_USER_ID};
use crate::error::{AppError, ErrorEnvelope};
use crate::flags::FeatureFlag;
use crate::permissions::{validate_permission, PermissionLevel};
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

pub const ORGANIZATION_ID_HEADER: HeaderName = HeaderName::from_static("x-organization-id");
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
pub const USER_ROLE_HEADER: HeaderName = HeaderName::from_static("x-user-role");

/// Per-route protection settings
#[derive(Debug, Clone)]
pub struct RlsMiddlewareConfig {
    pub require_auth: bool,
    pub required_permission: Option<PermissionLevel>,
    /// Resource the permission is checked on
    pub resource: Option<String>,
    /// Keep enforcing even when RLS is globally off
    pub bypass_rls: bool,
    /// Write audit rows for grants and denials
    pub log_access: bool,
    /// Rate limit bucket prefix; no limiting when `None`
    pub rate_limit_key: Option<String>,
}

impl Default for RlsMiddlewareConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            required_permission: None,
            resource: None,
            bypass_rls: false,
            log_access: true,
            rate_limit_key: None,
        }
    }
}

impl RlsMiddlewareConfig {
    pub fn require_permission(mut self, resource: impl Into<String>, level: PermissionLevel) -> Self {
        self.resource = Some(resource.into());
        self.required_permission = Some(level);
        self
    }

    pub fn rate_limited(mut self, key: impl Into<String>) -> Self {
        self.rate_limit_key = Some(key.into());
        self
    }
}

/// What the middleware needs to know about a request
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestMeta {
    pub fn from_request<B>(request: &axum::http::Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.uri.path())
    }
}

/// Outcome of [`validate_rls_middleware`]
#[derive(Debug)]
pub struct RlsMiddlewareResult {
    pub success: bool,
    pub context: Option<RlsContext>,
    pub validation: Option<AuthValidation>,
    pub error: Option<ErrorEnvelope>,
    pub status_code: Option<StatusCode>,
}

impl RlsMiddlewareResult {
    fn allowed(context: Option<RlsContext>, validation: Option<AuthValidation>) -> Self {
        Self {
            success: true,
            context,
            validation,
            error: None,
            status_code: None,
        }
    }

    fn denied(error: &AppError) -> Self {
        let envelope = error.envelope();
        Self {
            success: false,
            context: None,
            validation: None,
            status_code: Some(error.status_code()),
            error: Some(envelope),
        }
    }
}

impl IntoResponse for RlsMiddlewareResult {
    fn into_response(self) -> Response {
        match self.error {
            Some(envelope) => envelope.into_response(),
            None => Json(json!({ "success": self.success, "context": self.context }))
                .into_response(),
        }
    }
}

fn record(result: &'static str) {
    metrics::counter!("rlsgate_authz_requests_total", "result" => result).increment(1);
}

/// Decide one request.
///
/// Order: RLS-off short-circuit, mock context, optional auth, rate limit,
/// token and session, organization context, permission, access audit.
pub async fn validate_rls_middleware(
    state: &AppState,
    request: &RequestMeta,
    config: &RlsMiddlewareConfig,
) -> RlsMiddlewareResult {
    for issue in state.flags.validate() {
        tracing::warn!(issue = %issue, "Feature flag configuration issue");
    }

    if !state.flags.is_enabled(FeatureFlag::RlsEnabled, None) && !config.bypass_rls {
        record("bypassed");
        return RlsMiddlewareResult::allowed(None, None);
    }

    if state.flags.is_mock_auth_enabled() && !config.require_auth {
        record("mock");
        let context = ContextResolver::mock_context(
            state.clients.anonymous(),
            MOCK_USER_ID,
            MOCK_ORGANIZATION_ID,
            UserRole::Admin,
        );
        return RlsMiddlewareResult::allowed(Some(context), None);
    }

    if !config.require_auth {
        record("anonymous");
        return RlsMiddlewareResult::allowed(None, None);
    }

    match authorize(state, request, config).await {
        Ok(result) => {
            record(if result.success { "allowed" } else { "denied" });
            result
        }
        Err(e) => {
            record("denied");
            tracing::warn!(
                endpoint = %request.endpoint(),
                code = e.code(),
                error = %e,
                "Request rejected"
            );
            if config.log_access && matches!(e, AppError::Unauthorized(_)) {
                state
                    .audit
                    .log_security_event(
                        SecurityEventType::UnauthorizedAccess,
                        json!({ "endpoint": request.endpoint(), "reason": e.to_string() }),
                    )
                    .await;
            }
            RlsMiddlewareResult::denied(&e)
        }
    }
}

async fn reject_rate_limited(
    state: &AppState,
    request: &RequestMeta,
    key: &str,
    identifier: &str,
) -> AppError {
    state
        .audit
        .log_security_event(
            SecurityEventType::RateLimitExceeded,
            json!({
                "endpoint": request.endpoint(),
                "key": key,
                "identifier": identifier,
            }),
        )
        .await;
    AppError::RateLimited
}

async fn authorize(
    state: &AppState,
    request: &RequestMeta,
    config: &RlsMiddlewareConfig,
) -> Result<RlsMiddlewareResult, AppError> {
    let rate_limit_key = config.rate_limit_key.as_deref();
    if let Some(key) = rate_limit_key {
        if !state.rate_limiter.check_request(key, &request.headers) {
            let identifier = client_identifier(&request.headers);
            return Err(reject_rate_limited(state, request, key, &identifier).await);
        }
    }

    let token = extract_bearer_token(&request.headers)?;
    ensure_jwt_shape(token)?;

    let client = state.clients.for_token(token);
    let validation = validate_session(client.as_ref(), token).await?;

    if let Some(key) = rate_limit_key {
        let user_id = validation.user.id;
        if !state.rate_limiter.check_user(key, user_id) {
            let identifier = format!("user:{}", user_id);
            return Err(reject_rate_limited(state, request, key, &identifier).await);
        }
    }
    let context = if config.bypass_rls {
        state.resolver.resolve_context(client, validation.user.id).await?
    } else {
        state
            .resolver
            .get_rls_context(client, validation.user.id)
            .await?
    };

    if let (Some(level), Some(resource)) =
        (config.required_permission, config.resource.as_deref())
    {
        if !validate_permission(context.user_role.as_str(), resource, level) {
            if config.log_access {
                state
                    .audit
                    .log_auth_event(
                        AuthEventType::PermissionDenied,
                        context.user_id,
                        context.organization_id,
                        Some(json!({
                            "resource": resource,
                            "required_permission": level,
                            "user_role": context.user_role,
                            "endpoint": request.endpoint(),
                        })),
                    )
                    .await;
            }
            tracing::warn!(
                user_id = %context.user_id,
                role = %context.user_role.as_str(),
                resource,
                level = %level,
                "Permission denied"
            );
            return Ok(RlsMiddlewareResult::denied(&AppError::PermissionDenied(
                format!("Insufficient permissions for {}", resource),
            )));
        }
    }

    if config.log_access {
        state
            .audit
            .log_auth_event(
                AuthEventType::Login,
                context.user_id,
                context.organization_id,
                Some(json!({
                    "endpoint": request.endpoint(),
                    "method": request.method.as_str(),
                })),
            )
            .await;
    }

    Ok(RlsMiddlewareResult::allowed(Some(context), Some(validation)))
}

/// Translate a context or policy failure into the client-facing envelope.
///
/// Records an `rls_violation` security event when the organization is known.
pub async fn handle_rls_violation(
    audit: &AuditService,
    error: &AppError,
    endpoint: &str,
    organization_id: Option<OrganizationId>,
) -> ErrorEnvelope {
    if let Some(organization_id) = organization_id {
        audit
            .log_security_event(
                SecurityEventType::RlsViolation,
                json!({
                    "endpoint": endpoint,
                    "organization_id": organization_id,
                    "code": error.code(),
                    "error": error.to_string(),
                }),
            )
            .await;
    }

    match error {
        AppError::Unauthorized(_) => {
            ErrorEnvelope::new("Unauthorized access", "UNAUTHORIZED", StatusCode::UNAUTHORIZED)
                .with_details(json!("Authentication required"))
        }
        AppError::OrganizationNotFound(_) => ErrorEnvelope::new(
            "Organization access denied",
            "ORGANIZATION_NOT_FOUND",
            StatusCode::NOT_FOUND,
        )
        .with_details(json!("User does not belong to the requested organization")),
        AppError::Rls { .. } | AppError::UserNotFound(_) | AppError::PermissionDenied(_) => {
            ErrorEnvelope::new("Access forbidden", error.code(), StatusCode::FORBIDDEN)
                .with_details(json!("Insufficient permissions for this resource"))
        }
        AppError::RateLimited | AppError::Internal(_) => {
            ErrorEnvelope::new("Access denied", "ACCESS_DENIED", StatusCode::FORBIDDEN)
                .with_details(json!("Unable to process request"))
        }
    }
}

/// State of one protected route group
#[derive(Clone)]
pub struct RlsLayerState {
    app: AppState,
    config: Arc<RlsMiddlewareConfig>,
}

/// Bind `config` to the application state for [`rls_middleware`].
///
/// ```ignore
/// router.route_layer(axum::middleware::from_fn_with_state(
///     rls_layer(state.clone(), RlsMiddlewareConfig::default()),
///     rls_middleware,
/// ))
/// ```
pub fn rls_layer(app: AppState, config: RlsMiddlewareConfig) -> RlsLayerState {
    RlsLayerState {
        app,
        config: Arc::new(config),
    }
}

pub async fn rls_middleware(
    State(layer): State<RlsLayerState>,
    mut request: Request,
    next: Next,
) -> Response {
    let meta = RequestMeta::from_request(&request);
    let result = validate_rls_middleware(&layer.app, &meta, &layer.config).await;

    if !result.success {
        return result.into_response();
    }

    if let Some(context) = result.context {
        let headers = request.headers_mut();
        let values = [
            (ORGANIZATION_ID_HEADER, context.organization_id.to_string()),
            (USER_ID_HEADER, context.user_id.to_string()),
            (USER_ROLE_HEADER, context.user_role.as_str().to_string()),
        ];
        for (name, value) in values {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(name, value);
            }
        }
        request.extensions_mut().insert(context);
    }
    if let Some(validation) = result.validation {
        request.extensions_mut().insert(validation);
    }

    next.run(request).await
}

/// Handler extractor for the context attached by [`rls_middleware`]
#[derive(Debug, Clone)]
pub struct RlsContextExt(pub RlsContext);

impl<S> FromRequestParts<S> for RlsContextExt
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RlsContext>()
            .cloned()
            .map(RlsContextExt)
            .ok_or_else(|| AppError::Unauthorized("No RLS context available".to_string()))
    }
}
