// ViewerContext Middleware - bearer token authentication
// Resolves the caller once per request and injects the ViewerContext into request extensions

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    infrastructure::viewer::viewer::ViewerContext,
    services::identity::IdentityService,
};

/// Application state that can authenticate bearer tokens.
pub trait HasIdentity {
    fn identity(&self) -> &IdentityService;
}

fn unauthenticated() -> AppError {
    AppError::Unauthorized("Unauthenticated.".to_string())
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Validate a bearer token and build the viewer it belongs to.
pub async fn authenticate_token(identity: &IdentityService, token: &str) -> AppResult<ViewerContext> {
    let claims = identity.security().decode_token(token)?;
    if identity.is_token_revoked(&claims.jti).await? {
        debug!(jti = %claims.jti, "Rejected revoked token");
        return Err(unauthenticated());
    }

    let user_id = claims.user_id()?;
    identity.get(user_id).await.map_err(|e| match e {
        AppError::NotFound(_) => unauthenticated(),
        other => other,
    })?;

    Ok(ViewerContext::new(
        user_id,
        claims.jti,
        claims.exp as i64 * 1000,
    ))
}

/// Rejects the request with 401 unless it carries a live bearer token.
pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    T: HasIdentity + Clone + Send + Sync + 'static,
{
    let token = bearer_token(request.headers())
        .map(str::to_owned)
        .ok_or_else(unauthenticated)?;
    let viewer = authenticate_token(app_state.identity(), &token).await?;

    request.extensions_mut().insert(Arc::new(viewer));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   xyz"));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_authenticate_token_checks_revocation() {
        let identity = crate::services::identity::tests::identity().await;
        let user = identity
            .register(crate::services::identity::tests::new_user("ada"))
            .await
            .unwrap();
        let (_, issued) = identity.login("ada@example.com", "password123").await.unwrap();

        let viewer = authenticate_token(&identity, &issued.token).await.unwrap();
        assert_eq!(viewer.user_id, user.id);
        assert!(viewer.request_id.starts_with("req-"));

        identity.logout(&viewer).await.unwrap();
        assert!(matches!(
            authenticate_token(&identity, &issued.token).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate_token(&identity, "not-a-token").await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
