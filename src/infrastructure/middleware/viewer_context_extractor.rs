// ViewerContext Extractor - handler-side access to the authenticated caller

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::{error::AppError, infrastructure::viewer::viewer::ViewerContext};

/// Cheaply clonable handle to the request's [`ViewerContext`].
///
/// ```ignore
/// async fn handler(vc: Vc) -> AppResult<Json<Value>> {
///     let user = state.identity.get(vc.user_id).await?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl Vc {
    pub fn new(vc: Arc<ViewerContext>) -> Self {
        Self(vc)
    }

    pub fn arc(self) -> Arc<ViewerContext> {
        self.0
    }
}

impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<ViewerContext> for Vc {
    fn as_ref(&self) -> &ViewerContext {
        &self.0
    }
}

// Rejects with 401 when the auth middleware did not run or did not succeed.
impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let vc = parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(vc.clone()))
            .ok_or_else(|| AppError::Unauthorized("Unauthenticated.".to_string()));

        async move { vc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_extracts_injected_viewer() {
        let mut request = Request::builder().uri("/").body(()).unwrap();
        request
            .extensions_mut()
            .insert(Arc::new(ViewerContext::new(5, "jti-1".into(), 0)));
        let (mut parts, _) = request.into_parts();

        let vc = Vc::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(vc.user_id, 5);
        assert_eq!(vc.token_id, "jti-1");
    }

    #[tokio::test]
    async fn test_missing_viewer_is_unauthorized() {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        assert!(matches!(
            Vc::from_request_parts(&mut parts, &()).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
