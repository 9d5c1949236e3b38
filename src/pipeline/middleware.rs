use crate::error::AuthError;
use crate::security::{Principal, RequestPrincipal};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AuthenticationPipeline, RequestHead};

/// Axum middleware running the authentication pipeline around a request.
///
/// Install with
/// `axum::middleware::from_fn_with_state(pipeline, authentication_middleware)`.
pub async fn authentication_middleware(
    State(pipeline): State<Arc<AuthenticationPipeline>>,
    mut req: Request,
    next: Next,
) -> Response {
    let seeded = req
        .extensions()
        .get::<RequestPrincipal>()
        .map(|p| p.0.clone())
        .unwrap_or_else(Principal::anonymous);

    let head = RequestHead::new(req.uri().clone(), req.headers().clone());

    let mut user = Some(seeded);
    let added = pipeline.authenticate(&head.headers, &mut user).await;

    if let Some(principal) = user {
        debug!(
            identities = principal.identities().len(),
            added,
            authenticated = principal.is_authenticated(),
            "Request principal composed"
        );
        req.extensions_mut().insert(RequestPrincipal(principal));
    }

    let mut response = next.run(req).await;

    if let Err(e) = pipeline.process_response(&head, &mut response).await {
        warn!(error = %e, "Failed to apply authentication response events");
        return e.into_response();
    }

    response
}

/// Extractor for the authenticated principal of the current request.
///
/// Rejects with 401 when no handler authenticated the request, which in turn
/// triggers the default challenge.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        match parts.extensions.get::<RequestPrincipal>() {
            Some(RequestPrincipal(principal)) if principal.is_authenticated() => {
                Ok(CurrentUser(principal.clone()))
            }
            _ => Err(AuthError::MissingCredentials),
        }
    }
}
