//! Bearer extraction and session validation

use crate::client::DataClient;
use crate::domain::token::has_jwt_shape;
use crate::domain::AuthValidation;
use crate::error::{AppError, Result};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::Utc;

const BEARER_PREFIX: &str = "Bearer ";

/// Token after the `Bearer ` prefix of the `Authorization` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("No authorization header found".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header format".to_string()))?;

    let token = header
        .strip_prefix(BEARER_PREFIX)
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AppError::Unauthorized(
            "No token found in authorization header".to_string(),
        ));
    }

    Ok(token)
}

/// Reject anything that is not three non-empty dot-separated segments
pub fn ensure_jwt_shape(token: &str) -> Result<()> {
    if has_jwt_shape(token) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Invalid JWT token structure".to_string()))
    }
}

/// Exchange `token` for a session and enrich it with the user's organization and role.
///
/// Enrichment is best-effort: a failed profile lookup is logged and leaves
/// both fields empty.
pub async fn validate_session(client: &dyn DataClient, token: &str) -> Result<AuthValidation> {
    let session = client
        .get_session(token)
        .await
        .map_err(|e| AppError::Unauthorized(format!("Session validation failed: {}", e)))?
        .ok_or_else(|| AppError::Unauthorized("No active session found".to_string()))?;

    if session.is_expired_at(Utc::now()) {
        return Err(AppError::Unauthorized("Session has expired".to_string()));
    }

    let mut validation = AuthValidation {
        user: session.user,
        expires_at: session.expires_at,
        organization_id: None,
        user_role: None,
    };

    match client.find_user_profile(validation.user.id).await {
        Ok(Some(profile)) => {
            validation.organization_id = profile.organization_id;
            validation.user_role = profile.role;
        }
        Ok(None) => {
            tracing::warn!(user_id = %validation.user.id, "No profile found for session user");
        }
        Err(e) => {
            tracing::warn!(user_id = %validation.user.id, error = %e, "Failed to enrich session");
        }
    }

    Ok(validation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockDataClient;
    use crate::domain::{AuthSession, OrganizationId, SessionUser, UserId, UserProfile};
    use rstest::rstest;

    fn headers(value: Option<&'static str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(v) = value {
            map.insert(AUTHORIZATION, v.parse().unwrap());
        }
        map
    }

    fn session(user_id: UserId, expires_at: Option<i64>) -> AuthSession {
        AuthSession {
            user: SessionUser {
                id: user_id,
                email: Some("rep@example.com".to_string()),
            },
            expires_at,
        }
    }

    #[rstest]
    #[case(None, "No authorization header found")]
    #[case(Some("Basic abc"), "Invalid authorization header format")]
    #[case(Some("bearer a.b.c"), "Invalid authorization header format")]
    #[case(Some("Bearer    "), "No token found in authorization header")]
    fn test_extract_failures(#[case] value: Option<&'static str>, #[case] message: &str) {
        match extract_bearer_token(&headers(value)) {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, message),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(
            extract_bearer_token(&headers(Some("Bearer a.b.c"))).unwrap(),
            "a.b.c"
        );
    }

    #[test]
    fn test_jwt_shape_rejects_opaque_tokens() {
        assert!(ensure_jwt_shape("a.b.c").is_ok());
        assert!(matches!(
            ensure_jwt_shape("opaque"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_session_enriches() {
        let user_id = UserId::new_v4();
        let org = OrganizationId::new_v4();
        let mut client = MockDataClient::new();
        client
            .expect_get_session()
            .returning(move |_| Ok(Some(session(user_id, None))));
        client.expect_find_user_profile().returning(move |_| {
            Ok(Some(UserProfile {
                id: Some(user_id),
                organization_id: Some(org),
                role: Some("manager".to_string()),
            }))
        });

        let validation = validate_session(&client, "a.b.c").await.unwrap();
        assert_eq!(validation.user.id, user_id);
        assert_eq!(validation.organization_id, Some(org));
        assert_eq!(validation.user_role.as_deref(), Some("manager"));
    }

    #[tokio::test]
    async fn test_enrichment_failure_is_not_fatal() {
        let user_id = UserId::new_v4();
        let mut client = MockDataClient::new();
        client
            .expect_get_session()
            .returning(move |_| Ok(Some(session(user_id, None))));
        client
            .expect_find_user_profile()
            .returning(|_| Err(AppError::database("connection reset")));

        let validation = validate_session(&client, "a.b.c").await.unwrap();
        assert!(validation.organization_id.is_none());
        assert!(validation.user_role.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let user_id = UserId::new_v4();
        let past = Utc::now().timestamp() - 60;
        let mut client = MockDataClient::new();
        client
            .expect_get_session()
            .returning(move |_| Ok(Some(session(user_id, Some(past)))));

        let err = validate_session(&client, "a.b.c").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Session has expired"));
    }

    #[tokio::test]
    async fn test_missing_session_and_exchange_error() {
        let mut client = MockDataClient::new();
        client.expect_get_session().returning(|_| Ok(None));
        let err = validate_session(&client, "a.b.c").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "No active session found"));

        let mut client = MockDataClient::new();
        client
            .expect_get_session()
            .returning(|_| Err(AppError::Unauthorized("bad gateway".to_string())));
        let err = validate_session(&client, "a.b.c").await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }
}
